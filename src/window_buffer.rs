//! Fixed-capacity arena holding one window of payload.
//!
//! Slot `i` occupies bytes `i * MAX_PAYLOAD .. (i + 1) * MAX_PAYLOAD`. The
//! arena is allocated once per session and never resized; every write is
//! bounds-checked against the slot it targets. Each slot records how many of
//! its bytes are valid, so a short final packet never exposes stale bytes
//! from an earlier window.
//!
//! The sender loads a contiguous chunk read from the file and slices it per
//! slot; the receiver stores packets into their slots in arrival order and
//! reads them back in slot order.

use thiserror::Error;

use crate::packet::MAX_PAYLOAD;
use crate::seq_space::WINDOW_SIZE;

/// Bytes in a full window.
pub const WINDOW_CAPACITY: usize = MAX_PAYLOAD * WINDOW_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowBufferError {
    #[error("slot {slot} is outside the window")]
    SlotOutOfRange { slot: usize },
    #[error("{len} bytes do not fit a single slot")]
    PayloadTooLarge { len: usize },
    #[error("{len} bytes do not fit a single window")]
    ChunkTooLarge { len: usize },
}

pub struct WindowBuffer {
    bytes: Box<[u8]>,
    lens: [usize; WINDOW_SIZE],
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WindowBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowBuffer")
            .field("lens", &self.lens)
            .finish_non_exhaustive()
    }
}

impl WindowBuffer {
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; WINDOW_CAPACITY].into_boxed_slice(),
            lens: [0; WINDOW_SIZE],
        }
    }

    /// Mark every slot empty. Bytes are left in place; lengths gate reads.
    pub fn clear(&mut self) {
        self.lens = [0; WINDOW_SIZE];
    }

    /// Copy `payload` into `slot`.
    pub fn put(&mut self, slot: usize, payload: &[u8]) -> Result<(), WindowBufferError> {
        if slot >= WINDOW_SIZE {
            return Err(WindowBufferError::SlotOutOfRange { slot });
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(WindowBufferError::PayloadTooLarge { len: payload.len() });
        }
        let start = slot * MAX_PAYLOAD;
        self.bytes[start..start + payload.len()].copy_from_slice(payload);
        self.lens[slot] = payload.len();
        Ok(())
    }

    /// Valid bytes of `slot`; empty for an unfilled or out-of-range slot.
    pub fn get(&self, slot: usize) -> &[u8] {
        match self.lens.get(slot) {
            Some(&len) => {
                let start = slot * MAX_PAYLOAD;
                &self.bytes[start..start + len]
            }
            None => &[],
        }
    }

    /// Whole arena for a contiguous fill; pair with [`Self::commit_contiguous`].
    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Split the first `len` arena bytes into full slots plus one remainder.
    pub fn commit_contiguous(&mut self, len: usize) -> Result<(), WindowBufferError> {
        if len > WINDOW_CAPACITY {
            return Err(WindowBufferError::ChunkTooLarge { len });
        }
        for (slot, slot_len) in self.lens.iter_mut().enumerate() {
            *slot_len = len.saturating_sub(slot * MAX_PAYLOAD).min(MAX_PAYLOAD);
        }
        Ok(())
    }

    /// Number of leading non-empty slots, i.e. `ceil(len / MAX_PAYLOAD)` after
    /// a contiguous fill.
    pub fn packet_count(&self) -> usize {
        self.lens.iter().take_while(|&&len| len > 0).count()
    }

    /// Total valid bytes across all slots.
    pub fn len(&self) -> usize {
        self.lens.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payloads of slots `0..count` in slot order.
    pub fn slots(&self, count: usize) -> impl Iterator<Item = &[u8]> + '_ {
        (0..count.min(WINDOW_SIZE)).map(move |slot| self.get(slot))
    }
}
