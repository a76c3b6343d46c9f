//! In-memory lossy network for deterministic testing.
//!
//! Real networks drop, reorder, and duplicate datagrams. To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`link`] returns two connected [`SimEndpoint`]s that implement
//! [`Transport`] and apply a configurable fault model to every datagram they
//! send:
//!
//! | Fault       | Description                                               |
//! |-------------|-----------------------------------------------------------|
//! | Loss        | Drop a datagram with probability `loss_rate`.             |
//! | Duplication | Deliver a datagram twice with probability `duplicate_rate`.|
//! | Reordering  | Hold a datagram back with probability `reorder_rate` and  |
//! |             | release it right after the next one.                      |
//! | Drop filter | Drop exactly the datagrams a caller-supplied predicate    |
//! |             | selects, for targeted scenarios.                          |
//!
//! Randomness comes from a [`StdRng`] seeded from the config, so a failing
//! test replays the same fault sequence. Every datagram offered for sending
//! is also appended to a [`Tap`] so tests can inspect what went on the wire.
//!
//! Delivery is instantaneous; time only passes in receives bounded by a
//! timeout, which makes these endpoints well suited to tokio's paused clock.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::socket::{Recv, Transport};

/// Predicate selecting datagrams to drop. Receives the raw bytes and the
/// zero-based index of the datagram among all sent by this endpoint.
pub type DropFilter = Box<dyn FnMut(&[u8], u64) -> bool + Send>;

/// Fault-injection model for one direction of the link.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate_rate: f64,
    /// Probability that a datagram is held back behind the next one.
    pub reorder_rate: f64,
    /// Seed for the fault RNG.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the link is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Same faults in a lossy-network shape: `rate` loss, half as much
    /// duplication and reordering.
    pub fn lossy(rate: f64, seed: u64) -> Self {
        Self {
            loss_rate: rate,
            duplicate_rate: rate / 2.0,
            reorder_rate: rate / 2.0,
            seed,
        }
    }
}

/// Counters for one endpoint's outbound direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub sent: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub reordered: u64,
}

/// Shared record of every datagram offered to a [`SimEndpoint`], dropped or
/// not.
#[derive(Debug, Clone, Default)]
pub struct Tap(Arc<Mutex<Vec<Vec<u8>>>>);

impl Tap {
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        lock(&self.0).clone()
    }

    fn record(&self, bytes: &[u8]) {
        lock(&self.0).push(bytes.to_vec());
    }
}

struct Faults {
    config: SimulatorConfig,
    rng: StdRng,
    filter: Option<DropFilter>,
    held: Option<Vec<u8>>,
    stats: SimStats,
}

/// One end of a simulated link.
pub struct SimEndpoint {
    addr: SocketAddr,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    faults: Mutex<Faults>,
    tap: Tap,
}

/// Build a connected pair. `a_to_b` governs datagrams sent by the first
/// endpoint, `b_to_a` those sent by the second.
pub fn link(
    a_addr: SocketAddr,
    b_addr: SocketAddr,
    a_to_b: SimulatorConfig,
    b_to_a: SimulatorConfig,
) -> (SimEndpoint, SimEndpoint) {
    let (to_b, b_inbox) = mpsc::unbounded_channel();
    let (to_a, a_inbox) = mpsc::unbounded_channel();
    let a = SimEndpoint::new(a_addr, b_addr, to_b, a_inbox, a_to_b);
    let b = SimEndpoint::new(b_addr, a_addr, to_a, b_inbox, b_to_a);
    (a, b)
}

impl SimEndpoint {
    fn new(
        addr: SocketAddr,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        inbound: mpsc::UnboundedReceiver<Vec<u8>>,
        config: SimulatorConfig,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            addr,
            peer,
            outbound,
            inbound: tokio::sync::Mutex::new(inbound),
            faults: Mutex::new(Faults {
                config,
                rng,
                filter: None,
                held: None,
                stats: SimStats::default(),
            }),
            tap: Tap::default(),
        }
    }

    /// Install a targeted drop predicate, applied before random faults.
    pub fn with_drop_filter(self, filter: DropFilter) -> Self {
        lock(&self.faults).filter = Some(filter);
        self
    }

    /// Handle onto the record of datagrams this endpoint sent.
    pub fn tap(&self) -> Tap {
        self.tap.clone()
    }

    pub fn stats(&self) -> SimStats {
        lock(&self.faults).stats
    }

    /// Decide the fate of one datagram; returns what to deliver, in order.
    fn apply_faults(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut guard = lock(&self.faults);
        let faults = &mut *guard;
        let index = faults.stats.sent;
        faults.stats.sent += 1;

        let filtered = faults
            .filter
            .as_mut()
            .map_or(false, |filter| filter(bytes, index));
        if filtered || faults.rng.random_bool(faults.config.loss_rate) {
            faults.stats.dropped += 1;
            return Vec::new();
        }

        let mut deliver = vec![bytes.to_vec()];
        if faults.rng.random_bool(faults.config.duplicate_rate) {
            faults.stats.duplicated += 1;
            deliver.push(bytes.to_vec());
        }

        // A held datagram goes out behind this one; otherwise this one may
        // be held back itself.
        if let Some(held) = faults.held.take() {
            deliver.push(held);
        } else if faults.rng.random_bool(faults.config.reorder_rate) {
            faults.stats.reordered += 1;
            faults.held = deliver.pop();
        }
        deliver
    }
}

impl Transport for SimEndpoint {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> io::Result<()> {
        self.tap.record(bytes);
        if peer != self.peer {
            // Nobody listens there.
            return Ok(());
        }
        for datagram in self.apply_faults(bytes) {
            // A closed peer is indistinguishable from loss.
            let _ = self.outbound.send(datagram);
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8], wait: Option<Duration>) -> io::Result<Recv> {
        let mut inbound = self.inbound.lock().await;
        let next = match wait {
            Some(limit) => match tokio::time::timeout(limit, inbound.recv()).await {
                Ok(next) => next,
                Err(_elapsed) => return Ok(Recv::TimedOut),
            },
            None => inbound.recv().await,
        };

        match next {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(Recv::Datagram {
                    len,
                    from: self.peer,
                })
            }
            // Peer endpoint dropped: nothing will ever arrive.
            None => match wait {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    Ok(Recv::TimedOut)
                }
                None => std::future::pending().await,
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
