//! Sequence-number space shared by both endpoints.
//!
//! A transfer is a series of windows. Each window owns [`WINDOW_SIZE`]
//! consecutive sequence numbers starting at a [`SequenceBase`]:
//!
//! ```text
//!  base:   0        10       20   ...   100       0        10
//!        ──┼────────┼────────┼── ... ───┼─────────┼────────┼──▶
//!          │ 0..=9  │10..=19 │          │100..=109│ 0..=9  │
//! ```
//!
//! The base advances by one window after every completed exchange and wraps
//! from [`MAX_BASE`] back to zero. Because [`MAX_BASE`] is a multiple of the
//! window size no window straddles the wrap point, so membership is a plain
//! integer range test and `seq % WINDOW_SIZE` is always the window-relative
//! slot.
//!
//! Only one window is ever outstanding, so a sequence number outside the
//! current window can only belong to the window just completed.

use std::fmt;

/// Packets per window.
pub const WINDOW_SIZE: usize = 10;

/// Highest base before wrapping to zero.
pub const MAX_BASE: u8 = 100;

/// Largest sequence number ever placed on the wire.
pub const MAX_SEQ: u8 = MAX_BASE + (WINDOW_SIZE as u8 - 1);

/// Whether a window geometry is usable with single-byte sequence numbers.
///
/// - the wrap point must fall on a window boundary,
/// - every sequence number of the last window must fit in a byte, so no two
///   in-flight numbers collide modulo 256,
/// - the cycle must hold at least two windows, otherwise the previous window
///   and the current one share their numbers.
pub const fn geometry_is_valid(window_size: usize, max_base: usize) -> bool {
    window_size > 0
        && max_base % window_size == 0
        && max_base + window_size - 1 <= u8::MAX as usize
        && max_base / window_size + 1 >= 2
}

const _: () = assert!(geometry_is_valid(WINDOW_SIZE, MAX_BASE as usize));

/// First sequence number of the window currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SequenceBase(u8);

impl SequenceBase {
    pub const ZERO: Self = Self(0);

    /// Returns `None` unless `value` is a window boundary in `0..=MAX_BASE`.
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_BASE && value as usize % WINDOW_SIZE == 0).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Base of the next window.
    pub fn advance(self) -> Self {
        if self.0 == MAX_BASE {
            Self::ZERO
        } else {
            Self(self.0 + WINDOW_SIZE as u8)
        }
    }

    /// `true` when `seq` belongs to the window starting at this base.
    pub fn contains(self, seq: u8) -> bool {
        self.0 <= seq && seq as usize <= self.0 as usize + WINDOW_SIZE - 1
    }

    /// Sequence number carried by window member `slot`.
    pub fn seq_for(self, slot: usize) -> u8 {
        debug_assert!(slot < WINDOW_SIZE, "slot {slot} outside window");
        self.0 + slot as u8
    }
}

impl fmt::Display for SequenceBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.0, self.0 as usize + WINDOW_SIZE - 1)
    }
}

/// Window-relative position of `seq`.
#[inline]
pub fn slot(seq: u8) -> usize {
    seq as usize % WINDOW_SIZE
}

/// Free-function form of [`SequenceBase::contains`].
#[inline]
pub fn in_window(seq: u8, base: SequenceBase) -> bool {
    base.contains(seq)
}
