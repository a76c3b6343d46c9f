//! Transfer session: one file, window after window.
//!
//! # Architecture
//!
//! ```text
//!   input file                                              output file
//!       │ ChunkReader                                  AsyncWrite ▲
//!       ▼                                                         │
//!  ┌─────────────┐   DATA (seq, eof, payload)   ┌─────────────┐   │
//!  │ WindowSender│─────────────────────────────▶│WindowReceiver│──┘
//!  └──────┬──────┘                              └──────┬──────┘
//!         │◀──────────────── ACK (seq) ────────────────┘
//!         │
//!   TransferSession (owns Transport + WindowBuffer + RetryBudget,
//!                    threads the SequenceBase between windows)
//! ```
//!
//! A [`TransferSession`] owns the transport endpoint for exactly one
//! transfer and is consumed by [`TransferSession::send`] or
//! [`TransferSession::receive`]; both release the endpoint and the stream
//! on every exit path.
//!
//! **Sender**: read up to one window of the file, sweep every un-acked member
//! onto the wire, then collect acks until the peer has been quiet for one
//! ack timeout. A phase that heard nothing is a silent round
//! charged to the [`RetryBudget`]; any ack refunds it. Repeat until every
//! member is acked, advance the base, read the next chunk.
//!
//! **Receiver**: block for datagrams, ack every one of them, and store new
//! in-window members until the window is complete; write it out, advance the
//! base, and stop after the window that carried end-of-stream. Then linger,
//! re-acking retransmissions of the final window until its sender goes quiet.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::Instant;

use crate::chunker::ChunkReader;
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::packet::{AckPacket, DataPacket, ACK_LEN, MAX_PACKET_LEN};
use crate::progress::Progress;
use crate::seq_space::SequenceBase;
use crate::socket::{Recv, Transport};
use crate::timer::RetryBudget;
use crate::window_buffer::WindowBuffer;
use crate::window_receiver::{Arrival, WindowReceiver};
use crate::window_sender::{AckOutcome, WindowSender};

/// What a finished transfer moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    /// Payload bytes delivered (sender: acknowledged; receiver: written).
    pub bytes: u64,
    /// Windows exchanged.
    pub windows: u64,
}

/// State of one transfer in either direction.
pub struct TransferSession<T> {
    transport: T,
    config: TransferConfig,
    base: SequenceBase,
    eof: bool,
    bytes_transferred: u64,
    windows: u64,
    /// Survives window boundaries; reset only by an arriving ack.
    retry: RetryBudget,
    buffer: WindowBuffer,
}

impl<T: Transport> TransferSession<T> {
    pub fn new(transport: T, config: TransferConfig) -> Self {
        let retry = RetryBudget::new(config.max_timeouts);
        Self {
            transport,
            config,
            base: SequenceBase::ZERO,
            eof: false,
            bytes_transferred: 0,
            windows: 0,
            retry,
            buffer: WindowBuffer::new(),
        }
    }

    /// Base of the window about to be exchanged.
    pub fn sequence_base(&self) -> SequenceBase {
        self.base
    }

    pub fn eof_reached(&self) -> bool {
        self.eof
    }

    fn summary(&self) -> TransferSummary {
        TransferSummary {
            bytes: self.bytes_transferred,
            windows: self.windows,
        }
    }

    // -----------------------------------------------------------------------
    // Sender
    // -----------------------------------------------------------------------

    /// Push all of `input` to `peer`.
    ///
    /// An empty input is sent as a single empty end-of-stream packet so the
    /// receiver terminates too.
    pub async fn send<R, P>(
        mut self,
        peer: SocketAddr,
        input: R,
        progress: &mut P,
    ) -> Result<TransferSummary, TransferError>
    where
        R: AsyncRead + Unpin,
        P: Progress + ?Sized,
    {
        let mut reader = ChunkReader::new(input);
        log::info!("[sender] {} → {peer}: starting transfer", self.transport.local_addr());

        while !self.eof {
            let chunk = reader
                .read_window(&mut self.buffer)
                .await
                .map_err(TransferError::FileIo)?;
            let packet_count = self.buffer.packet_count().max(1);

            self.send_window(peer, packet_count, chunk.last).await?;

            self.bytes_transferred += chunk.len as u64;
            self.windows += 1;
            self.eof = chunk.last;
            self.base = self.base.advance();
            progress.update(self.bytes_transferred);
        }

        log::info!(
            "[sender] transfer complete: {} bytes in {} window(s)",
            self.bytes_transferred,
            self.windows
        );
        Ok(self.summary())
    }

    /// Deliver the window currently loaded in the buffer.
    async fn send_window(
        &mut self,
        peer: SocketAddr,
        packet_count: usize,
        last: bool,
    ) -> Result<(), TransferError> {
        let mut window = WindowSender::new(self.base, packet_count, last);
        log::debug!(
            "[sender] window {} start: {} packet(s){}",
            self.base,
            packet_count,
            if last { ", final" } else { "" }
        );

        while !window.is_complete() {
            let packets = window.sweep(&self.buffer);
            if window.sweeps() > 1 {
                log::debug!(
                    "[sender] window {}: retransmitting {} packet(s), sweep {}",
                    window.base(),
                    packets.len(),
                    window.sweeps()
                );
            }
            for packet in &packets {
                self.transport
                    .send_to(&packet.encode()?, peer)
                    .await
                    .map_err(TransferError::TransportIo)?;
                log::trace!(
                    "[sender] → DATA seq={} len={} eof={}",
                    packet.seq,
                    packet.payload.len(),
                    packet.eof
                );
            }

            let heard = self.collect_acks(&mut window, peer).await?;
            if heard == 0 {
                self.retry.on_silent_round();
                log::warn!(
                    "[sender] window {}: no ack within {:?} ({}/{})",
                    window.base(),
                    self.config.ack_timeout,
                    self.retry.consecutive(),
                    self.retry.limit()
                );
                if self.retry.is_exhausted() {
                    return Err(TransferError::PeerUnresponsive {
                        timeouts: self.retry.consecutive(),
                    });
                }
            }
        }

        log::debug!(
            "[sender] window {} complete after {} sweep(s)",
            window.base(),
            window.sweeps()
        );
        Ok(())
    }

    /// Read acks until the peer has been quiet for one ack timeout. Returns
    /// how many acks arrived.
    ///
    /// Only the peer's datagrams push the deadline back; anything else is
    /// dropped without extending the phase.
    async fn collect_acks(
        &mut self,
        window: &mut WindowSender,
        peer: SocketAddr,
    ) -> Result<usize, TransferError> {
        let mut buf = [0u8; ACK_LEN];
        let mut heard = 0;
        let mut deadline = Instant::now() + self.config.ack_timeout;

        loop {
            let Some(wait) = remaining(deadline) else {
                return Ok(heard);
            };
            let received = self
                .transport
                .recv_from(&mut buf, Some(wait))
                .await
                .map_err(TransferError::TransportIo)?;
            let (len, from) = match received {
                Recv::TimedOut => return Ok(heard),
                Recv::Datagram { len, from } => (len, from),
            };
            if from != peer {
                log::debug!("[sender] ignoring datagram from {from}");
                continue;
            }

            let ack = AckPacket::decode(&buf[..len])?;
            heard += 1;
            self.retry.on_ack();
            deadline = Instant::now() + self.config.ack_timeout;

            match window.on_ack(ack) {
                AckOutcome::Accepted { slot } => log::trace!(
                    "[sender] ← ACK seq={} slot={slot} ({}/{})",
                    ack.seq,
                    window.acked_count(),
                    window.packet_count()
                ),
                AckOutcome::Duplicate { slot } => {
                    log::trace!("[sender] ← ACK seq={} slot={slot} duplicate", ack.seq)
                }
                AckOutcome::Stale => log::trace!("[sender] ← ACK seq={} stale", ack.seq),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Receiver
    // -----------------------------------------------------------------------

    /// Reassemble the incoming stream into `output`.
    pub async fn receive<W, P>(
        mut self,
        mut output: W,
        progress: &mut P,
    ) -> Result<TransferSummary, TransferError>
    where
        W: AsyncWrite + Unpin,
        P: Progress + ?Sized,
    {
        let mut datagram = [0u8; MAX_PACKET_LEN];
        log::info!("[receiver] listening on {}", self.transport.local_addr());

        let mut final_window = None;
        while !self.eof {
            let (window, sender) = self.receive_window(&mut datagram).await?;

            let mut written = 0u64;
            for payload in self.buffer.slots(window.expected_count()) {
                output
                    .write_all(payload)
                    .await
                    .map_err(TransferError::FileIo)?;
                written += payload.len() as u64;
            }

            self.bytes_transferred += written;
            self.windows += 1;
            self.eof = window.eof_seen();
            self.base = self.base.advance();
            progress.update(self.bytes_transferred);
            final_window = Some((window, sender));
        }
        output.flush().await.map_err(TransferError::FileIo)?;

        log::info!(
            "[receiver] transfer complete: {} bytes in {} window(s)",
            self.bytes_transferred,
            self.windows
        );
        if let Some((window, sender)) = final_window {
            self.linger(&window, sender, &mut datagram).await;
        }
        Ok(self.summary())
    }

    /// Collect one complete window into the buffer. Also returns the address
    /// that delivered the window's last new member.
    async fn receive_window(
        &mut self,
        datagram: &mut [u8],
    ) -> Result<(WindowReceiver, Option<SocketAddr>), TransferError> {
        self.buffer.clear();
        let mut window = WindowReceiver::new(self.base);
        let mut sender = None;

        while !window.is_complete() {
            let received = self
                .transport
                .recv_from(datagram, None)
                .await
                .map_err(TransferError::TransportIo)?;
            let Recv::Datagram { len, from } = received else {
                continue;
            };

            let packet = DataPacket::decode(&datagram[..len])?;
            let arrival = window.on_packet(&packet, &mut self.buffer)?;
            self.transport
                .send_to(&AckPacket::echo(&packet).encode(), from)
                .await
                .map_err(TransferError::TransportIo)?;

            match arrival {
                Arrival::Accepted { slot, len, eof } => {
                    sender = Some(from);
                    log::trace!(
                        "[receiver] ← DATA seq={} slot={slot} len={len} eof={eof}; → ACK ({}/{})",
                        packet.seq,
                        window.received_count(),
                        window.expected_count()
                    )
                }
                Arrival::Duplicate { slot } => log::debug!(
                    "[receiver] ← DATA seq={} slot={slot} duplicate; → ACK",
                    packet.seq
                ),
                Arrival::Stale => log::debug!(
                    "[receiver] ← DATA seq={} outside window {}; → ACK",
                    packet.seq,
                    window.base()
                ),
            }
        }

        log::debug!(
            "[receiver] window {} complete: {} packet(s), {} bytes",
            self.base,
            window.expected_count(),
            window.bytes_received()
        );
        Ok((window, sender))
    }

    /// Re-ack retransmissions of `window` until `sender` has been quiet for
    /// `config.linger`.
    ///
    /// Datagrams from other addresses, or for sequence numbers outside the
    /// final window, are dropped and do not extend the quiet period.
    async fn linger(
        &self,
        window: &WindowReceiver,
        sender: Option<SocketAddr>,
        datagram: &mut [u8],
    ) {
        let Some(sender) = sender else {
            return;
        };
        if self.config.linger.is_zero() {
            return;
        }

        let mut reacked = 0u32;
        let mut deadline = Instant::now() + self.config.linger;
        while let Some(wait) = remaining(deadline) {
            let (len, from) = match self.transport.recv_from(datagram, Some(wait)).await {
                Ok(Recv::Datagram { len, from }) => (len, from),
                Ok(Recv::TimedOut) => break,
                Err(e) => {
                    log::warn!("[receiver] linger ended by transport error: {e}");
                    break;
                }
            };
            if from != sender {
                log::debug!("[receiver] ignoring datagram from {from} while lingering");
                continue;
            }
            let packet = match DataPacket::decode(&datagram[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    log::warn!("[receiver] linger ended by malformed datagram: {e}");
                    break;
                }
            };
            if !window.base().contains(packet.seq) {
                log::debug!(
                    "[receiver] ignoring seq={} outside final window {} while lingering",
                    packet.seq,
                    window.base()
                );
                continue;
            }
            if let Err(e) = self
                .transport
                .send_to(&AckPacket::echo(&packet).encode(), from)
                .await
            {
                log::warn!("[receiver] linger ended by transport error: {e}");
                break;
            }
            reacked += 1;
            deadline = Instant::now() + self.config.linger;
        }

        log::debug!("[receiver] linger done, {reacked} straggler(s) re-acked");
    }
}

/// Time left until `deadline`, or `None` once it has passed.
fn remaining(deadline: Instant) -> Option<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    (!left.is_zero()).then_some(left)
}

/// Open `path` and send it to `peer` over `transport`.
pub async fn send_file<T, P>(
    path: &Path,
    transport: T,
    peer: SocketAddr,
    config: TransferConfig,
    progress: &mut P,
) -> Result<TransferSummary, TransferError>
where
    T: Transport,
    P: Progress + ?Sized,
{
    let file = File::open(path)
        .await
        .map_err(|source| TransferError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
    TransferSession::new(transport, config)
        .send(peer, file, progress)
        .await
}

/// Create `path` and fill it with the stream arriving on `transport`.
pub async fn receive_file<T, P>(
    path: &Path,
    transport: T,
    config: TransferConfig,
    progress: &mut P,
) -> Result<TransferSummary, TransferError>
where
    T: Transport,
    P: Progress + ?Sized,
{
    let file = File::create(path)
        .await
        .map_err(|source| TransferError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
    TransferSession::new(transport, config)
        .receive(BufWriter::new(file), progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Recorded, Silent};
    use crate::simulator::{link, SimEndpoint};

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "10.0.0.1:4000".parse().unwrap(),
            "10.0.0.2:5000".parse().unwrap(),
        )
    }

    fn clean_link() -> (SimEndpoint, SimEndpoint, SocketAddr) {
        let (s, r) = addrs();
        let (a, b) = link(s, r, Default::default(), Default::default());
        (a, b, r)
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    /// Data packets whose sequence number is in `seqs` are dropped the first
    /// `times` times they are sent.
    fn drop_first(seqs: &'static [u8], times: u32) -> crate::simulator::DropFilter {
        let mut drops = [0u32; 256];
        Box::new(move |bytes: &[u8], _: u64| {
            let seq = bytes[0];
            if seqs.contains(&seq) && drops[seq as usize] < times {
                drops[seq as usize] += 1;
                true
            } else {
                false
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn session_state_advances_per_window() {
        let (s, r, peer) = clean_link();
        let input = payload(12_000);
        let mut sent = Recorded::default();
        let mut got = Recorded::default();
        let mut out = Vec::new();

        let sender = TransferSession::new(s, TransferConfig::default());
        assert_eq!(sender.sequence_base(), SequenceBase::ZERO);
        assert!(!sender.eof_reached());

        let (tx, rx) = tokio::join!(
            sender.send(peer, &input[..], &mut sent),
            TransferSession::new(r, TransferConfig::default()).receive(&mut out, &mut got),
        );

        assert_eq!(tx.unwrap(), TransferSummary { bytes: 12_000, windows: 3 });
        assert_eq!(rx.unwrap(), TransferSummary { bytes: 12_000, windows: 3 });
        assert_eq!(sent.updates, vec![5_000, 10_000, 12_000]);
        assert_eq!(got.updates, vec![5_000, 10_000, 12_000]);
        assert_eq!(out, input);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_refunded_by_acks_across_windows() {
        // 5_500 bytes: window 1 = seq 0..=9, window 2 = seq 10.
        // Each window loses its last member 60 times in a row: 59 silent
        // rounds in the first, 60 in the second. Only a counter that resets
        // on ack stays within a budget of 100.
        let (s_addr, r_addr) = addrs();
        let (s, r) = link(s_addr, r_addr, Default::default(), Default::default());
        let s = s.with_drop_filter(drop_first(&[9, 10], 60));
        let input = payload(5_500);
        let mut out = Vec::new();
        let (mut tx_quiet, mut rx_quiet) = (Silent, Silent);

        let (tx, rx) = tokio::join!(
            TransferSession::new(s, TransferConfig::default()).send(r_addr, &input[..], &mut tx_quiet),
            TransferSession::new(r, TransferConfig::default()).receive(&mut out, &mut rx_quiet),
        );

        assert_eq!(tx.unwrap().bytes, 5_500);
        assert_eq!(rx.unwrap().bytes, 5_500);
        assert_eq!(out, input);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_exhausted_within_a_window() {
        let (s_addr, r_addr) = addrs();
        let (s, r) = link(s_addr, r_addr, Default::default(), Default::default());
        let s = s.with_drop_filter(drop_first(&[9], 60));
        let config = TransferConfig {
            max_timeouts: 50,
            ..Default::default()
        };
        let input = payload(5_500);
        let mut out = Vec::new();
        let (mut tx_quiet, mut rx_quiet) = (Silent, Silent);

        let receiver = TransferSession::new(r, TransferConfig::default()).receive(&mut out, &mut rx_quiet);
        let sender = TransferSession::new(s, config).send(r_addr, &input[..], &mut tx_quiet);

        // The receiver never completes once the sender has given up; only the
        // sender's outcome matters here.
        let result = tokio::select! {
            tx = sender => tx,
            _ = receiver => unreachable!("receiver cannot finish without seq 9"),
        };
        assert!(matches!(
            result,
            Err(TransferError::PeerUnresponsive { timeouts: 51 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn lost_final_ack_answered_while_lingering() {
        // Receiver→sender direction loses the ack for seq 2 (the final
        // packet) five times; the receiver has finished by then.
        let (s_addr, r_addr) = addrs();
        let (s, r) = link(s_addr, r_addr, Default::default(), Default::default());
        let r = r.with_drop_filter(drop_first(&[2], 5));
        let input = payload(1_100);
        let mut out = Vec::new();
        let (mut tx_quiet, mut rx_quiet) = (Silent, Silent);

        let (tx, rx) = tokio::join!(
            TransferSession::new(s, TransferConfig::default()).send(r_addr, &input[..], &mut tx_quiet),
            TransferSession::new(r, TransferConfig::default()).receive(&mut out, &mut rx_quiet),
        );

        assert_eq!(tx.unwrap().bytes, 1_100);
        assert_eq!(rx.unwrap().bytes, 1_100);
        assert_eq!(out, input);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_datagrams_do_not_count_as_acks() {
        // The sender's only peer is silent; a stranger's datagrams arrive on
        // the same endpoint but must not refund the retry budget.
        let (s_addr, r_addr) = addrs();
        let (s, stranger) = link(s_addr, r_addr, Default::default(), Default::default());
        let config = TransferConfig {
            max_timeouts: 3,
            ..Default::default()
        };
        let elsewhere: SocketAddr = "10.9.9.9:9".parse().unwrap();
        let mut tx_quiet = Silent;

        let chatter = async {
            loop {
                stranger.send_to(&[0], s_addr).await.unwrap();
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };
        let result = tokio::select! {
            r = TransferSession::new(s, config).send(elsewhere, &b"abc"[..], &mut tx_quiet) => r,
            _ = chatter => unreachable!(),
        };
        assert!(matches!(
            result,
            Err(TransferError::PeerUnresponsive { timeouts: 4 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_chatter_faster_than_ack_timeout_cannot_stall_abort() {
        let (s_addr, r_addr) = addrs();
        let (s, stranger) = link(s_addr, r_addr, Default::default(), Default::default());
        let config = TransferConfig {
            max_timeouts: 3,
            ..Default::default()
        };
        let elsewhere: SocketAddr = "10.9.9.9:9".parse().unwrap();
        let mut tx_quiet = Silent;
        let start = tokio::time::Instant::now();

        let chatter = async {
            loop {
                stranger.send_to(&[0], s_addr).await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let sender = TransferSession::new(s, config).send(elsewhere, &b"abc"[..], &mut tx_quiet);
        let result = tokio::time::timeout(Duration::from_secs(600), async {
            tokio::select! {
                r = sender => r,
                _ = chatter => unreachable!(),
            }
        })
        .await
        .expect("sender kept waiting on a silent peer");

        assert!(matches!(
            result,
            Err(TransferError::PeerUnresponsive { timeouts: 4 })
        ));
        // Four silent ack phases, each one ack timeout long.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn linger_ends_despite_out_of_window_traffic() {
        let (peer, r, _) = clean_link();
        let r_addr = r.local_addr();
        let final_packet = DataPacket {
            seq: 0,
            eof: true,
            payload: b"x".to_vec(),
        };
        peer.send_to(&final_packet.encode().unwrap(), r_addr).await.unwrap();

        let stale = DataPacket {
            seq: 55,
            eof: false,
            payload: Vec::new(),
        }
        .encode()
        .unwrap();
        let spam = async {
            loop {
                peer.send_to(&stale, r_addr).await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };

        let mut out = Vec::new();
        let mut rx_quiet = Silent;
        let receiver = TransferSession::new(r, TransferConfig::default()).receive(&mut out, &mut rx_quiet);
        let summary = tokio::time::timeout(Duration::from_secs(600), async {
            tokio::select! {
                r = receiver => r,
                _ = spam => unreachable!(),
            }
        })
        .await
        .expect("receiver kept lingering")
        .unwrap();

        assert_eq!(summary, TransferSummary { bytes: 1, windows: 1 });
        assert_eq!(out, b"x");

        // Only the real packet was acked; the spam never was.
        let mut buf = [0u8; ACK_LEN];
        assert_eq!(
            peer.recv_from(&mut buf, Some(Duration::from_millis(1))).await.unwrap(),
            Recv::Datagram { len: 1, from: r_addr }
        );
        assert_eq!(buf, [0]);
        assert_eq!(
            peer.recv_from(&mut buf, Some(Duration::from_millis(1))).await.unwrap(),
            Recv::TimedOut
        );
    }

    #[tokio::test(start_paused = true)]
    async fn receiver_rejects_truncated_datagram() {
        let (peer, r, _) = clean_link();
        let r_addr = r.local_addr();
        peer.send_to(&[7], r_addr).await.unwrap();

        let mut out = Vec::new();
        let err = TransferSession::new(r, TransferConfig::default())
            .receive(&mut out, &mut Silent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "truncated-packet");
    }

    #[tokio::test(start_paused = true)]
    async fn sender_rejects_empty_ack() {
        let (s, r, peer) = clean_link();
        let s_addr = s.local_addr();
        let mut tx_quiet = Silent;
        let bogus_acker = async {
            let mut buf = [0u8; MAX_PACKET_LEN];
            let _ = r.recv_from(&mut buf, None).await.unwrap();
            r.send_to(&[], s_addr).await.unwrap();
            std::future::pending::<()>().await;
        };
        let result = tokio::select! {
            r = TransferSession::new(s, TransferConfig::default()).send(peer, &b"x"[..], &mut tx_quiet) => r,
            _ = bogus_acker => unreachable!(),
        };
        assert!(matches!(result, Err(TransferError::Packet(_))));
    }
}
