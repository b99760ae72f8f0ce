// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP client link.

use super::{Link, READ_POLL_INTERVAL};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Connect timeout per resolved address.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP stream link (`tcp:host:port`).
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    closed: AtomicBool,
}

impl TcpLink {
    /// Connect to `addr` (`host:port`).
    pub fn connect(addr: &str) -> io::Result<Self> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&candidate, CONNECT_TIMEOUT) {
                Ok(stream) => return Self::from_stream(stream),
                Err(e) => {
                    log::debug!("[TcpLink] connect {} failed: {}", candidate, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address resolved for {}", addr),
            )
        }))
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            closed: AtomicBool::new(false),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Link for TcpLink {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        (&self.stream).read(buf)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        let mut stream = &self.stream;
        stream.write_all(bytes)?;
        stream.flush()
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_link_exchanges_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).expect("read");
            sock.write_all(&buf).expect("echo");
        });

        let link = TcpLink::connect(&addr.to_string()).expect("connect");
        link.write(b"hello").expect("write");

        let mut got = Vec::new();
        let mut buf = [0u8; 16];
        while got.len() < 5 {
            match link.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => got.extend_from_slice(&buf[..n]),
                Err(e) if super::super::is_idle(&e) => {}
                Err(e) => panic!("read failed: {}", e),
            }
        }
        assert_eq!(got, b"hello");
        server.join().expect("server");

        link.close().expect("close");
        link.close().expect("close twice");
        assert_eq!(link.read(&mut buf).expect("read after close"), 0);
        assert!(link.write(b"x").is_err());
    }
}
