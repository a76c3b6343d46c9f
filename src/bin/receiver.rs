//! `receiver <filename> <port>`: accept one file pushed by a sender.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use window_arq::config::{TransferConfig, DEFAULT_LINGER};
use window_arq::progress::{Console, Progress};
use window_arq::{receive_file, UdpTransport};

/// Receive a file sent reliably over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Where to write the received file (created or truncated).
    filename: PathBuf,
    /// UDP port to listen on.
    port: u16,
    /// Quiet period after the last window before exiting, in milliseconds;
    /// late retransmissions are re-acked meanwhile. 0 exits immediately.
    #[arg(long, default_value_t = DEFAULT_LINGER.as_millis() as u64)]
    linger_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = TransferConfig {
        linger: Duration::from_millis(cli.linger_ms),
        ..Default::default()
    };

    let transport = UdpTransport::listen(cli.port)
        .await
        .with_context(|| format!("could not listen on UDP port {}", cli.port))?;
    log::info!("Receiving into {} on port {}", cli.filename.display(), cli.port);

    let mut progress = Console::new("Received");
    let outcome = receive_file(&cli.filename, transport, config, &mut progress).await;
    progress.finish();

    let summary =
        outcome.with_context(|| format!("failed to receive {}", cli.filename.display()))?;
    println!(
        "Success. Received {} bytes in {} window(s).",
        summary.bytes, summary.windows
    );
    Ok(())
}
