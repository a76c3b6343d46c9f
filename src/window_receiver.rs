//! Receive-side state for one window.
//!
//! [`WindowReceiver`] assembles the current window from data packets arriving
//! in any order:
//!
//! - A packet inside the current window whose slot is still empty is
//!   **accepted**: its payload is copied into the slot of the
//!   [`WindowBuffer`] and counted.
//! - A packet whose slot is already filled is a **duplicate** and dropped.
//! - A packet outside the current window belongs to the window just
//!   completed (its ack was lost) and is dropped as **stale**.
//!
//! Whatever the classification, the caller must answer every packet with an
//! [`AckPacket`] echoing its sequence number; a sender still retransmitting
//! into the previous window only stops once those acks get through.
//!
//! An accepted packet carrying the end-of-stream flag shrinks the number of
//! slots expected to `slot + 1`, so a short final window completes without
//! waiting for members that will never be sent.
//!
//! This module only manages state; socket I/O is the caller's responsibility
//! (see [`crate::session`]).

use crate::packet::DataPacket;
use crate::seq_space::{slot, SequenceBase, WINDOW_SIZE};
use crate::window_buffer::{WindowBuffer, WindowBufferError};

/// Classification of one arriving data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// New member stored in `slot`.
    Accepted { slot: usize, len: usize, eof: bool },
    /// Slot was already filled.
    Duplicate { slot: usize },
    /// Previous-window packet.
    Stale,
}

#[derive(Debug)]
pub struct WindowReceiver {
    base: SequenceBase,
    expected: usize,
    received: [bool; WINDOW_SIZE],
    received_count: usize,
    bytes: usize,
    eof: bool,
}

impl WindowReceiver {
    pub fn new(base: SequenceBase) -> Self {
        Self {
            base,
            expected: WINDOW_SIZE,
            received: [false; WINDOW_SIZE],
            received_count: 0,
            bytes: 0,
            eof: false,
        }
    }

    pub fn base(&self) -> SequenceBase {
        self.base
    }

    /// Members this window must collect before it completes.
    pub fn expected_count(&self) -> usize {
        self.expected
    }

    pub fn received_count(&self) -> usize {
        self.received_count
    }

    /// Payload bytes accepted so far in this window.
    pub fn bytes_received(&self) -> usize {
        self.bytes
    }

    /// `true` once the end-of-stream packet has been accepted.
    pub fn eof_seen(&self) -> bool {
        self.eof
    }

    /// `true` when every slot in `0..expected_count` has been filled.
    pub fn is_complete(&self) -> bool {
        self.received[..self.expected].iter().all(|&r| r)
    }

    /// Classify `packet` and, if it is new, store it in `buffer`.
    pub fn on_packet(
        &mut self,
        packet: &DataPacket,
        buffer: &mut WindowBuffer,
    ) -> Result<Arrival, WindowBufferError> {
        if !self.base.contains(packet.seq) {
            return Ok(Arrival::Stale);
        }

        let slot = slot(packet.seq);
        if self.received[slot] {
            return Ok(Arrival::Duplicate { slot });
        }

        buffer.put(slot, &packet.payload)?;
        self.received[slot] = true;
        self.received_count += 1;
        self.bytes += packet.payload.len();

        if packet.eof {
            self.eof = true;
            self.expected = slot + 1;
        }

        Ok(Arrival::Accepted {
            slot,
            len: packet.payload.len(),
            eof: packet.eof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::MAX_PAYLOAD;

    fn pkt(seq: u8, eof: bool, fill: u8, len: usize) -> DataPacket {
        DataPacket {
            seq,
            eof,
            payload: vec![fill; len],
        }
    }

    #[test]
    fn initial_state() {
        let r = WindowReceiver::new(SequenceBase::ZERO);
        assert_eq!(r.expected_count(), WINDOW_SIZE);
        assert_eq!(r.received_count(), 0);
        assert!(!r.is_complete());
        assert!(!r.eof_seen());
    }

    #[test]
    fn full_window_in_reverse_order() {
        let base = SequenceBase::new(30).unwrap();
        let mut r = WindowReceiver::new(base);
        let mut buf = WindowBuffer::new();

        for slot in (0..WINDOW_SIZE).rev() {
            assert!(!r.is_complete());
            let arrival = r
                .on_packet(&pkt(base.seq_for(slot), false, slot as u8, MAX_PAYLOAD), &mut buf)
                .unwrap();
            assert_eq!(
                arrival,
                Arrival::Accepted {
                    slot,
                    len: MAX_PAYLOAD,
                    eof: false
                }
            );
        }

        assert!(r.is_complete());
        assert_eq!(r.bytes_received(), MAX_PAYLOAD * WINDOW_SIZE);
        for slot in 0..WINDOW_SIZE {
            assert!(buf.get(slot).iter().all(|&b| b == slot as u8));
        }
    }

    #[test]
    fn duplicate_does_not_corrupt_buffer() {
        let mut r = WindowReceiver::new(SequenceBase::ZERO);
        let mut buf = WindowBuffer::new();

        r.on_packet(&pkt(4, false, 0x11, 500), &mut buf).unwrap();
        let dup = r.on_packet(&pkt(4, false, 0x99, 500), &mut buf).unwrap();

        assert_eq!(dup, Arrival::Duplicate { slot: 4 });
        assert!(buf.get(4).iter().all(|&b| b == 0x11));
        assert_eq!(r.received_count(), 1);
        assert_eq!(r.bytes_received(), 500);
    }

    #[test]
    fn previous_window_packet_is_stale() {
        let mut r = WindowReceiver::new(SequenceBase::new(10).unwrap());
        let mut buf = WindowBuffer::new();
        assert_eq!(
            r.on_packet(&pkt(9, false, 1, 500), &mut buf).unwrap(),
            Arrival::Stale
        );
        assert_eq!(r.received_count(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn wrapped_window_treats_last_cycle_as_stale() {
        let mut r = WindowReceiver::new(SequenceBase::ZERO);
        let mut buf = WindowBuffer::new();
        assert_eq!(
            r.on_packet(&pkt(100, false, 1, 500), &mut buf).unwrap(),
            Arrival::Stale
        );
        assert!(matches!(
            r.on_packet(&pkt(0, false, 1, 500), &mut buf).unwrap(),
            Arrival::Accepted { slot: 0, .. }
        ));
    }

    #[test]
    fn eof_shrinks_expected_count() {
        let base = SequenceBase::new(50).unwrap();
        let mut r = WindowReceiver::new(base);
        let mut buf = WindowBuffer::new();

        // EOF member (slot 2) arrives first.
        r.on_packet(&pkt(52, true, 3, 120), &mut buf).unwrap();
        assert!(r.eof_seen());
        assert_eq!(r.expected_count(), 3);
        assert!(!r.is_complete());

        r.on_packet(&pkt(50, false, 1, 500), &mut buf).unwrap();
        assert!(!r.is_complete());
        r.on_packet(&pkt(51, false, 2, 500), &mut buf).unwrap();
        assert!(r.is_complete());
        assert_eq!(r.bytes_received(), 1_120);
    }

    #[test]
    fn missing_member_blocks_completion() {
        let mut r = WindowReceiver::new(SequenceBase::ZERO);
        let mut buf = WindowBuffer::new();
        for seq in (0..10u8).filter(|&s| s != 6) {
            r.on_packet(&pkt(seq, false, 0, 500), &mut buf).unwrap();
        }
        assert_eq!(r.received_count(), 9);
        assert!(!r.is_complete());
        r.on_packet(&pkt(6, false, 0, 500), &mut buf).unwrap();
        assert!(r.is_complete());
    }

    #[test]
    fn empty_eof_packet_completes_single_slot_window() {
        let mut r = WindowReceiver::new(SequenceBase::ZERO);
        let mut buf = WindowBuffer::new();
        let arrival = r.on_packet(&pkt(0, true, 0, 0), &mut buf).unwrap();
        assert_eq!(
            arrival,
            Arrival::Accepted {
                slot: 0,
                len: 0,
                eof: true
            }
        );
        assert!(r.is_complete());
        assert_eq!(r.bytes_received(), 0);
    }
}
