//! Wire-format definitions for data and acknowledgement datagrams.
//!
//! This module is responsible for:
//! - Defining the on-wire layout of a [`DataPacket`] and an [`AckPacket`].
//! - Serialising each into a byte buffer ready for transmission.
//! - Deserialising a received datagram, given the number of bytes actually
//!   received, and rejecting buffers too short to hold the fixed fields.
//!
//! No I/O happens here.
//!
//! # Wire format
//!
//! ```text
//!  Data packet                         Ack packet
//!  0       1       2 ...       2+n     0
//! +-------+-------+-------------+     +-------+
//! |  seq  |  eof  |  payload    |     |  seq  |
//! +-------+-------+-------------+     +-------+
//! ```
//!
//! `seq` is an unsigned byte, `eof` is zero or non-zero, and the payload is
//! `0..=`[`MAX_PAYLOAD`] bytes. An ack is exactly one byte echoing the data
//! packet's sequence number.

use thiserror::Error;

/// Byte length of the data packet header (seq + eof flag).
pub const HEADER_LEN: usize = 2;

/// Maximum payload carried by one data packet.
pub const MAX_PAYLOAD: usize = 500;

/// Largest datagram a conforming peer ever sends.
pub const MAX_PACKET_LEN: usize = HEADER_LEN + MAX_PAYLOAD;

/// Byte length of an acknowledgement.
pub const ACK_LEN: usize = 1;

const OFF_SEQ: usize = 0;
const OFF_EOF: usize = 1;

/// One window member on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Session sequence number, `base + slot`.
    pub seq: u8,
    /// Set only on the last packet of the last window.
    pub eof: bool,
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Serialise into a newly allocated buffer of `HEADER_LEN + payload.len()`
    /// bytes.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(PacketError::Oversized {
                len: HEADER_LEN + self.payload.len(),
                max: MAX_PACKET_LEN,
            });
        }

        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ] = self.seq;
        buf[OFF_EOF] = u8::from(self.eof);
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse the first `buf.len()` received bytes.
    ///
    /// Any non-zero flag byte is read as end-of-stream.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::Truncated {
                needed: HEADER_LEN,
                got: buf.len(),
            });
        }
        if buf.len() > MAX_PACKET_LEN {
            return Err(PacketError::Oversized {
                len: buf.len(),
                max: MAX_PACKET_LEN,
            });
        }

        Ok(Self {
            seq: buf[OFF_SEQ],
            eof: buf[OFF_EOF] != 0,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Acknowledgement of a single data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub seq: u8,
}

impl AckPacket {
    /// The ack a receiver owes for `packet`, whatever its classification.
    pub fn echo(packet: &DataPacket) -> Self {
        Self { seq: packet.seq }
    }

    pub fn encode(&self) -> [u8; ACK_LEN] {
        [self.seq]
    }

    /// Only the first byte is meaningful; trailing bytes are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        match buf.first() {
            Some(&seq) => Ok(Self { seq }),
            None => Err(PacketError::Truncated {
                needed: ACK_LEN,
                got: 0,
            }),
        }
    }
}

/// Errors that can arise when building or parsing a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Fewer bytes than the fixed fields require.
    #[error("truncated packet: needed at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    /// Datagram exceeds the largest legal packet.
    #[error("oversized packet: {len} bytes exceeds the {max}-byte limit")]
    Oversized { len: usize, max: usize },
}
