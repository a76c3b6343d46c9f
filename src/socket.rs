//! Datagram transport abstraction.
//!
//! [`Transport`] is the only thing the session needs from the network: send
//! one datagram to a peer, and receive one datagram with an optional time
//! bound. [`UdpTransport`] implements it over `tokio::net::UdpSocket`;
//! [`crate::simulator`] implements it in memory for tests.
//!
//! This module owns only byte I/O. Encoding and decoding happen in the
//! session.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::error::TransferError;

/// Outcome of a receive that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv {
    /// `len` bytes were written into the caller's buffer.
    Datagram { len: usize, from: SocketAddr },
    /// The time bound elapsed before anything arrived.
    TimedOut,
}

/// Connectionless, unreliable datagram endpoint.
///
/// Datagrams may be lost, duplicated, or reordered, but are never delivered
/// partially.
pub trait Transport {
    /// Address this endpoint receives on.
    fn local_addr(&self) -> SocketAddr;

    /// Send `bytes` as a single datagram to `peer`.
    fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> impl Future<Output = io::Result<()>> + Send;

    /// Receive one datagram into `buf`.
    ///
    /// `wait = None` blocks until a datagram arrives; `Some(d)` gives up with
    /// [`Recv::TimedOut`] after `d`. A datagram longer than `buf` is cut to
    /// `buf.len()`.
    fn recv_from(
        &self,
        buf: &mut [u8],
        wait: Option<Duration>,
    ) -> impl Future<Output = io::Result<Recv>> + Send;
}

/// [`Transport`] over a real UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl UdpTransport {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, TransferError> {
        let inner = UdpSocket::bind(local_addr)
            .await
            .map_err(TransferError::SocketSetup)?;
        let local_addr = inner.local_addr().map_err(TransferError::SocketSetup)?;
        log::debug!("[socket] bound {local_addr}");
        Ok(Self { local_addr, inner })
    }

    /// Receiving endpoint listening on `port` on every interface.
    pub async fn listen(port: u16) -> Result<Self, TransferError> {
        Self::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    /// Sending endpoint on an ephemeral port, in the same address family as
    /// `peer`.
    pub async fn ephemeral_for(peer: SocketAddr) -> Result<Self, TransferError> {
        Self::bind(unspecified_for(peer)).await
    }
}

/// Wildcard address with an OS-chosen port, matching `peer`'s family.
fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

impl Transport for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send_to(&self, bytes: &[u8], peer: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, peer).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8], wait: Option<Duration>) -> io::Result<Recv> {
        let received = match wait {
            Some(limit) => match tokio::time::timeout(limit, self.inner.recv_from(buf)).await {
                Ok(result) => result,
                Err(_elapsed) => return Ok(Recv::TimedOut),
            },
            None => self.inner.recv_from(buf).await,
        };
        let (len, from) = received?;
        Ok(Recv::Datagram { len, from })
    }
}
