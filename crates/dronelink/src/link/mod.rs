// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-stream links to the vehicle.
//!
//! A [`Link`] hides the transport (TCP, UDP, serial, in-process) behind
//! three `&self` methods so the pump thread can read while caller threads
//! write through the session's writer lock.
//!
//! # Read contract
//!
//! - `Ok(n > 0)`: `n` bytes were read.
//! - `Ok(0)`: end of stream, the pump terminates.
//! - `Err(WouldBlock | TimedOut)`: idle poll, the pump checks for stop and
//!   reads again.
//! - Any other error is fatal for the session.
//!
//! # Connection strings
//!
//! | String | Link |
//! |---|---|
//! | `tcp:host:port` | [`TcpLink`] client |
//! | `udpin:addr:port`, `udp:addr:port`, `addr:port` | [`UdpLink`] listening, replies to last peer |
//! | `udpout:host:port` | [`UdpLink`] sending to a fixed peer |
//! | `/dev/ttyUSB0[,baud]`, `COM3[,baud]` | `SerialLink` (feature `serial`) |

mod memory;
mod tcp;
mod udp;

#[cfg(feature = "serial")]
mod serial;

pub use memory::MemoryLink;
pub use tcp::TcpLink;
pub use udp::UdpLink;

#[cfg(feature = "serial")]
pub use serial::SerialLink;

use crate::error::{Error, Result};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Read poll interval; bounds how long `stop()` waits on an idle link.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default serial baud rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Byte-stream abstraction over a transport.
pub trait Link: Send + Sync {
    /// Read available bytes (see module docs for the return contract).
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one complete frame.
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Release the transport. Later reads return `Ok(0)`.
    fn close(&self) -> io::Result<()>;

    /// Human-readable description for logs.
    fn describe(&self) -> String {
        "link".to_string()
    }
}

/// Whether a read error is an idle poll rather than a failure.
pub fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Parsed connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    UdpIn(String),
    UdpOut(String),
    Serial { path: String, baud: u32 },
}

impl Endpoint {
    /// Parse a connection string.
    pub fn parse(conn: &str) -> Result<Self> {
        let conn = conn.trim();
        if conn.is_empty() {
            return Err(Error::InvalidConnection(conn.to_string()));
        }

        if let Some(addr) = conn.strip_prefix("tcp:") {
            return Ok(Self::Tcp(require_host_port(conn, addr)?));
        }
        if let Some(addr) = conn
            .strip_prefix("udpin:")
            .or_else(|| conn.strip_prefix("udp:"))
        {
            return Ok(Self::UdpIn(require_host_port(conn, addr)?));
        }
        if let Some(addr) = conn.strip_prefix("udpout:") {
            return Ok(Self::UdpOut(require_host_port(conn, addr)?));
        }

        if looks_like_serial(conn) {
            let (path, baud) = match conn.split_once(',') {
                Some((path, baud)) => (
                    path,
                    baud.trim()
                        .parse()
                        .map_err(|_| Error::InvalidConnection(conn.to_string()))?,
                ),
                None => (conn, DEFAULT_BAUD),
            };
            return Ok(Self::Serial {
                path: path.to_string(),
                baud,
            });
        }

        // Bare host:port listens on UDP
        Ok(Self::UdpIn(require_host_port(conn, conn)?))
    }
}

fn require_host_port(conn: &str, addr: &str) -> Result<String> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(addr.to_string())
        }
        _ => Err(Error::InvalidConnection(conn.to_string())),
    }
}

fn looks_like_serial(conn: &str) -> bool {
    let path = conn.split(',').next().unwrap_or(conn);
    if path.starts_with("/dev/") {
        return true;
    }
    let upper = path.to_ascii_uppercase();
    match upper.strip_prefix("COM") {
        Some(num) => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Open a link from a connection string.
pub fn connect(conn: &str) -> Result<Arc<dyn Link>> {
    let endpoint = Endpoint::parse(conn)?;
    log::debug!("[Link] connecting {:?}", endpoint);
    let link: Arc<dyn Link> = match endpoint {
        Endpoint::Tcp(addr) => Arc::new(TcpLink::connect(&addr)?),
        Endpoint::UdpIn(addr) => Arc::new(UdpLink::listen(&addr)?),
        Endpoint::UdpOut(addr) => Arc::new(UdpLink::connect(&addr)?),
        #[cfg(feature = "serial")]
        Endpoint::Serial { path, baud } => Arc::new(SerialLink::open(&path, baud)?),
        #[cfg(not(feature = "serial"))]
        Endpoint::Serial { path, .. } => {
            return Err(Error::InvalidConnection(format!(
                "{} (serial support not compiled in; enable feature `serial`)",
                path
            )))
        }
    };
    log::info!("[Link] connected {}", link.describe());
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed_endpoints() {
        assert_eq!(
            Endpoint::parse("tcp:127.0.0.1:5760").expect("tcp"),
            Endpoint::Tcp("127.0.0.1:5760".into())
        );
        assert_eq!(
            Endpoint::parse("udpin:0.0.0.0:14550").expect("udpin"),
            Endpoint::UdpIn("0.0.0.0:14550".into())
        );
        assert_eq!(
            Endpoint::parse("udp:0.0.0.0:14550").expect("udp"),
            Endpoint::UdpIn("0.0.0.0:14550".into())
        );
        assert_eq!(
            Endpoint::parse("udpout:10.0.0.2:14550").expect("udpout"),
            Endpoint::UdpOut("10.0.0.2:14550".into())
        );
    }

    #[test]
    fn test_parse_bare_address_listens() {
        assert_eq!(
            Endpoint::parse("127.0.0.1:14551").expect("bare"),
            Endpoint::UdpIn("127.0.0.1:14551".into())
        );
    }

    #[test]
    fn test_parse_serial_with_and_without_baud() {
        assert_eq!(
            Endpoint::parse("/dev/ttyUSB0").expect("serial"),
            Endpoint::Serial {
                path: "/dev/ttyUSB0".into(),
                baud: DEFAULT_BAUD
            }
        );
        assert_eq!(
            Endpoint::parse("COM3,57600").expect("com"),
            Endpoint::Serial {
                path: "COM3".into(),
                baud: 57_600
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("tcp:nohost").is_err());
        assert!(Endpoint::parse("udpin:host:notaport").is_err());
        assert!(Endpoint::parse("/dev/ttyS0,fast").is_err());
        assert!(Endpoint::parse("COMPASS").is_err());
    }
}
