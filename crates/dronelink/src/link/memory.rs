// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process loopback link.
//!
//! [`MemoryLink::pair`] returns two connected ends; bytes written on one are
//! read on the other. Closing either end makes the peer observe end of
//! stream once queued chunks are drained. Used by tests and simulators.

use super::{Link, READ_POLL_INTERVAL};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One end of an in-process link.
pub struct MemoryLink {
    name: &'static str,
    tx: Mutex<Option<Sender<Vec<u8>>>>,
    rx: Receiver<Vec<u8>>,
    /// Unread tail of the last received chunk
    leftover: Mutex<Vec<u8>>,
    closed: AtomicBool,
    poll: Duration,
}

impl MemoryLink {
    /// Create a connected pair `(a, b)`.
    pub fn pair() -> (Arc<MemoryLink>, Arc<MemoryLink>) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();
        (
            Arc::new(Self::new("memory:a", a_tx, a_rx)),
            Arc::new(Self::new("memory:b", b_tx, b_rx)),
        )
    }

    fn new(name: &'static str, tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            name,
            tx: Mutex::new(Some(tx)),
            rx,
            leftover: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            poll: READ_POLL_INTERVAL,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Link for MemoryLink {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }

        let mut leftover = self.leftover.lock();
        if leftover.is_empty() {
            match self.rx.recv_timeout(self.poll) {
                Ok(chunk) => *leftover = chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "idle"))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = leftover.len().min(buf.len());
        buf[..n].copy_from_slice(&leftover[..n]);
        leftover.drain(..n);
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        };
        tx.send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"))
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender lets the peer see Disconnected
        self.tx.lock().take();
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}
