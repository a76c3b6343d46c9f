//! Errors that end a transfer.
//!
//! Every variant is fatal: the session that raises it drops its socket and
//! file handle and the transfer is abandoned. The only routine failure, an
//! ack receive timing out, never surfaces here unless it exhausts the retry
//! budget.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::packet::PacketError;
use crate::window_buffer::WindowBufferError;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Creating or binding the datagram endpoint failed.
    #[error("could not set up socket: {0}")]
    SocketSetup(#[source] io::Error),

    /// Opening the input or creating the output file failed.
    #[error("could not open {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A send or receive failed for a reason other than a timeout.
    #[error("transport I/O failed: {0}")]
    TransportIo(#[source] io::Error),

    /// Reading or writing the file failed mid-transfer.
    #[error("file I/O failed: {0}")]
    FileIo(#[source] io::Error),

    /// The sender's retry budget ran out.
    #[error("peer not responding after {timeouts} consecutive ack timeouts")]
    PeerUnresponsive { timeouts: u32 },

    /// A datagram could not be parsed or built.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// A payload did not fit its slot.
    #[error(transparent)]
    Window(#[from] WindowBufferError),
}

impl TransferError {
    /// Short machine-friendly tag, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SocketSetup(_) => "socket-setup",
            Self::FileAccess { .. } => "file-access",
            Self::TransportIo(_) => "transport-io",
            Self::FileIo(_) => "file-io",
            Self::PeerUnresponsive { .. } => "peer-unresponsive",
            Self::Packet(PacketError::Truncated { .. }) => "truncated-packet",
            Self::Packet(PacketError::Oversized { .. }) => "oversized-packet",
            Self::Window(_) => "window-bounds",
        }
    }
}
