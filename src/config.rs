//! Protocol constants and runtime-tunable transfer settings.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Remote host the sender targets unless told otherwise.
pub const DEFAULT_REMOTE_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Per-receive bound while collecting acks.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(100);

/// Consecutive silent ack rounds tolerated before the peer is declared dead
/// (100 × 100 ms ≈ 10 s).
pub const MAX_TIMEOUTS: u32 = 100;

/// Quiet period the receiver keeps re-acking after the final window.
pub const DEFAULT_LINGER: Duration = Duration::from_millis(500);

/// Settings for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Sender: bound on each ack receive.
    pub ack_timeout: Duration,
    /// Sender: silent rounds allowed before aborting.
    pub max_timeouts: u32,
    /// Receiver: how long to keep answering retransmissions of the final
    /// window after it completed. Zero disables lingering.
    pub linger: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            ack_timeout: ACK_TIMEOUT,
            max_timeouts: MAX_TIMEOUTS,
            linger: DEFAULT_LINGER,
        }
    }
}
