// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP datagram link.
//!
//! - **Listen** (`udpin:`): binds locally and replies to whichever peer sent
//!   the most recent datagram. Writes before any peer is known are dropped.
//! - **Connect** (`udpout:`): sends to a fixed peer from an ephemeral port.

use super::{Link, READ_POLL_INTERVAL};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug)]
enum Peer {
    /// Learned from incoming datagrams
    Learned(Mutex<Option<SocketAddr>>),
    Fixed(SocketAddr),
}

/// UDP link (`udpin:` / `udpout:`).
#[derive(Debug)]
pub struct UdpLink {
    socket: UdpSocket,
    peer: Peer,
    closed: AtomicBool,
    /// Writes dropped because no peer was known yet
    dropped_writes: AtomicU64,
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address resolved for {}", addr),
        )
    })
}

impl UdpLink {
    /// Bind `addr` and learn the peer from incoming datagrams.
    pub fn listen(addr: &str) -> io::Result<Self> {
        let local = resolve(addr)?;
        let socket = Socket::new(
            Domain::for_address(local),
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        socket.bind(&local.into())?;
        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        log::debug!("[UdpLink] listening on {}", local);
        Ok(Self {
            socket,
            peer: Peer::Learned(Mutex::new(None)),
            closed: AtomicBool::new(false),
            dropped_writes: AtomicU64::new(0),
        })
    }

    /// Send to a fixed `addr` from an ephemeral local port.
    pub fn connect(addr: &str) -> io::Result<Self> {
        let remote = resolve(addr)?;
        let bind: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        Ok(Self {
            socket,
            peer: Peer::Fixed(remote),
            closed: AtomicBool::new(false),
            dropped_writes: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Current peer, if known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match &self.peer {
            Peer::Learned(p) => *p.lock(),
            Peer::Fixed(addr) => Some(*addr),
        }
    }

    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }
}

impl Link for UdpLink {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        let (n, from) = self.socket.recv_from(buf)?;
        match &self.peer {
            Peer::Learned(peer) => {
                let mut peer = peer.lock();
                if *peer != Some(from) {
                    log::debug!("[UdpLink] peer is now {}", from);
                    *peer = Some(from);
                }
            }
            Peer::Fixed(addr) if *addr != from => {
                log::trace!("[UdpLink] ignoring datagram from {}", from);
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "foreign peer"));
            }
            Peer::Fixed(_) => {}
        }
        if n == 0 {
            // Empty datagrams are not end-of-stream on UDP
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "empty datagram"));
        }
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        match self.peer_addr() {
            Some(addr) => {
                self.socket.send_to(bytes, addr)?;
            }
            None => {
                self.dropped_writes.fetch_add(1, Ordering::Relaxed);
                log::trace!("[UdpLink] no peer yet, dropping {} bytes", bytes.len());
            }
        }
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn describe(&self) -> String {
        let local = self
            .socket
            .local_addr()
            .map_or_else(|_| "?".to_string(), |a| a.to_string());
        match &self.peer {
            Peer::Learned(_) => format!("udpin:{}", local),
            Peer::Fixed(addr) => format!("udpout:{}", addr),
        }
    }
}
