//! `sender <filename> <port>`: push a file to a receiver over UDP.
//!
//! Argument parsing, logging setup, and exit status live here; the protocol
//! is in the library.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use window_arq::config::{TransferConfig, ACK_TIMEOUT, DEFAULT_REMOTE_HOST, MAX_TIMEOUTS};
use window_arq::progress::{Console, Progress};
use window_arq::{send_file, UdpTransport};

/// Send a file reliably over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// File to send.
    filename: PathBuf,
    /// Receiver's UDP port.
    port: u16,
    /// Receiver's address.
    #[arg(long, default_value_t = DEFAULT_REMOTE_HOST)]
    host: IpAddr,
    /// How long to wait for acks after each sweep, in milliseconds.
    #[arg(long, default_value_t = ACK_TIMEOUT.as_millis() as u64)]
    ack_timeout_ms: u64,
    /// Consecutive silent ack phases tolerated before giving up.
    #[arg(long, default_value_t = MAX_TIMEOUTS)]
    max_timeouts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let peer = SocketAddr::new(cli.host, cli.port);
    let config = TransferConfig {
        ack_timeout: Duration::from_millis(cli.ack_timeout_ms),
        max_timeouts: cli.max_timeouts,
        ..Default::default()
    };

    let transport = UdpTransport::ephemeral_for(peer)
        .await
        .context("could not create UDP socket")?;
    log::info!("Sending {} to {peer}", cli.filename.display());

    let mut progress = Console::new("Sent");
    let outcome = send_file(&cli.filename, transport, peer, config, &mut progress).await;
    progress.finish();

    let summary =
        outcome.with_context(|| format!("failed to send {}", cli.filename.display()))?;
    println!(
        "Success. Sent {} bytes in {} window(s).",
        summary.bytes, summary.windows
    );
    Ok(())
}
