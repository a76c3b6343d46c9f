//! Send-side state for one window.
//!
//! [`WindowSender`] tracks which members of the window in flight have been
//! acknowledged. It builds the data packets for every member still missing
//! an ack and folds arriving acks into its per-slot flags.
//!
//! # Protocol contract
//!
//! - A window holds `packet_count` members, `1..=WINDOW_SIZE`.
//! - Every transmit sweep re-sends **each** un-acked member; acked members are
//!   never sent again (selective repeat within the window).
//! - Acks are **individual**: an ack names exactly one sequence number.
//! - Acks outside the current window belong to the window just completed and
//!   are ignored, as are repeated acks for an already-acked slot.
//!
//! This module only manages state; transmission, the timed ack phase and the
//! retry budget belong to [`crate::session`].

use crate::packet::{AckPacket, DataPacket};
use crate::seq_space::{slot, SequenceBase, WINDOW_SIZE};
use crate::window_buffer::WindowBuffer;

/// How an incoming ack affected the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ack for this slot.
    Accepted { slot: usize },
    /// Slot was already acked.
    Duplicate { slot: usize },
    /// Sequence number outside the current window.
    Stale,
}

/// Send-side state for one window exchange.
///
/// ```text
///  slot:   0   1   2   3   4   5
///  acked: [x] [ ] [x] [x] [ ] [ ]     packet_count = 6
///               ^           ^   ^---- re-sent on the next sweep
/// ```
#[derive(Debug)]
pub struct WindowSender {
    base: SequenceBase,
    packet_count: usize,
    /// Whether this window ends the stream.
    last_window: bool,
    acked: [bool; WINDOW_SIZE],
    acked_count: usize,
    /// Completed transmit sweeps, for logging.
    sweeps: u32,
}

impl WindowSender {
    /// Start a window of `packet_count` members at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `packet_count` is zero or larger than the window.
    pub fn new(base: SequenceBase, packet_count: usize, last_window: bool) -> Self {
        assert!(
            (1..=WINDOW_SIZE).contains(&packet_count),
            "packet_count {packet_count} outside 1..={WINDOW_SIZE}"
        );
        Self {
            base,
            packet_count,
            last_window,
            acked: [false; WINDOW_SIZE],
            acked_count: 0,
            sweeps: 0,
        }
    }

    pub fn base(&self) -> SequenceBase {
        self.base
    }

    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    pub fn acked_count(&self) -> usize {
        self.acked_count
    }

    pub fn sweeps(&self) -> u32 {
        self.sweeps
    }

    /// `true` once every member has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.acked_count == self.packet_count
    }

    /// Slots still waiting for an ack, in slot order.
    pub fn pending_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.packet_count).filter(move |&slot| !self.acked[slot])
    }

    /// Build the data packet for `slot` from `buffer`.
    ///
    /// The end-of-stream flag is set only on the last member of the last
    /// window.
    pub fn build_packet(&self, slot: usize, buffer: &WindowBuffer) -> DataPacket {
        DataPacket {
            seq: self.base.seq_for(slot),
            eof: self.last_window && slot + 1 == self.packet_count,
            payload: buffer.get(slot).to_vec(),
        }
    }

    /// Build packets for every pending slot and count the sweep.
    pub fn sweep(&mut self, buffer: &WindowBuffer) -> Vec<DataPacket> {
        self.sweeps += 1;
        self.pending_slots()
            .map(|slot| self.build_packet(slot, buffer))
            .collect()
    }

    /// Fold one ack into the window.
    pub fn on_ack(&mut self, ack: AckPacket) -> AckOutcome {
        if !self.base.contains(ack.seq) {
            return AckOutcome::Stale;
        }
        let slot = slot(ack.seq);
        // An in-window ack beyond packet_count was never sent; treat it like
        // a previous-window leftover.
        if slot >= self.packet_count {
            return AckOutcome::Stale;
        }
        if self.acked[slot] {
            return AckOutcome::Duplicate { slot };
        }
        self.acked[slot] = true;
        self.acked_count += 1;
        AckOutcome::Accepted { slot }
    }
}
