//! `window-arq`: reliable one-way file transfer over UDP with a fixed
//! 10-packet sliding window and selective retransmission.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐                 ┌────────────────┐
//!  │ WindowSender │                 │ WindowReceiver │
//!  └──────┬───────┘                 └───────┬────────┘
//!         │  per-window ack / arrival state │
//!  ┌──────▼─────────────────────────────────▼───────┐
//!  │                TransferSession                 │
//!  │ (owns transport, window buffer, retry budget)  │
//!  └──────┬─────────────────────────────────────────┘
//!         │ encoded DATA / ACK datagrams
//!  ┌──────▼──────┐
//!  │  Transport  │  (tokio UdpSocket, or the in-memory simulator)
//!  └─────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]          : wire format of data and ack datagrams
//! - [`seq_space`]       : window bases, sequence numbers, and slots
//! - [`window_buffer`]   : the 5,000-byte window arena
//! - [`window_sender`]   : outbound per-window ack tracking
//! - [`window_receiver`] : inbound per-window reassembly
//! - [`timer`]           : consecutive-timeout retry budget
//! - [`session`]         : drives one whole transfer in either direction
//! - [`chunker`]         : window-sized reads with end-of-stream look-ahead
//! - [`progress`]        : running byte counter
//! - [`config`]          : protocol constants and tunables
//! - [`error`]           : error taxonomy
//! - [`socket`]          : datagram transport abstraction over UDP
//! - [`simulator`]       : lossy in-memory link for testing

pub mod chunker;
pub mod config;
pub mod error;
pub mod packet;
pub mod progress;
pub mod seq_space;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod timer;
pub mod window_buffer;
pub mod window_receiver;
pub mod window_sender;

pub use config::TransferConfig;
pub use error::TransferError;
pub use session::{receive_file, send_file, TransferSession, TransferSummary};
pub use socket::{Transport, UdpTransport};
