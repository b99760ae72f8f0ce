// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command/Ack engine.
//!
//! Correlates outgoing requests with the messages that answer them.
//!
//! A caller opens an [`Exchange`] under a [`CorrelationKey`]; while the
//! exchange lives, no other caller may use the same key
//! ([`Error::DuplicateRequest`]). Each step of an exchange arms a match
//! predicate, writes its message and blocks on a single-slot channel. The
//! pump thread calls [`CommandEngine::on_packet`] for every decoded packet;
//! the first packet that satisfies an armed predicate disarms it and is
//! handed to the waiting caller. On timeout the message is re-sent with
//! the predicate still armed, up to `max_retries` times.
//!
//! ```text
//! caller                         pump
//!   |-- open(key) ---------------->|   (pending table insert)
//!   |-- arm(pred); write(msg)      |
//!   |   ... recv_timeout ...       |<-- packet: pred(packet)? -> slot
//!   |<-- Matched(packet) ----------|
//!   |-- drop(exchange) ----------->|   (pending table remove)
//! ```

use crate::error::{Error, Result};
use crate::message::{Message, MessageKind, Packet};
use crate::sink::{SessionEvent, SessionSink};
use crate::writer::LinkWriter;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identifies one in-flight exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// `COMMAND_LONG` by command id.
    Command(u16),
    /// Request that may run concurrently with identical ones.
    Sequenced { kind: MessageKind, seq: u64 },
    /// Flight-mode change.
    Mode,
    /// Arm / disarm.
    Arming,
    /// `PARAM_SET` by canonical (uppercase) name.
    Parameter(String),
    /// Any mission transfer or mission command.
    Mission,
}

/// Match predicate evaluated on the pump thread.
pub type Predicate = Box<dyn Fn(&Packet) -> bool + Send + Sync>;

/// Single-step request description for [`CommandEngine::send`].
pub struct Request {
    pub message: Message,
    pub key: CorrelationKey,
    pub predicate: Predicate,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Request {
    pub fn new(
        message: Message,
        key: CorrelationKey,
        predicate: impl Fn(&Packet) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            message,
            key,
            predicate: Box::new(predicate),
            timeout: Duration::from_secs(1),
            max_retries: 3,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Result slot contents.
#[derive(Debug)]
enum Outcome {
    Matched(Packet),
    Closed,
}

struct Pending {
    /// Armed predicate of the current step, `None` between steps
    armed: Mutex<Option<Predicate>>,
    slot_tx: Sender<Outcome>,
}

/// Correlated request engine.
pub struct CommandEngine {
    writer: Arc<LinkWriter>,
    pending: DashMap<CorrelationKey, Arc<Pending>>,
    sequence: AtomicU64,
    closed: AtomicBool,
    sink: Arc<dyn SessionSink>,
}

impl CommandEngine {
    pub fn new(writer: Arc<LinkWriter>, sink: Arc<dyn SessionSink>) -> Self {
        Self {
            writer,
            pending: DashMap::new(),
            sequence: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            sink,
        }
    }

    /// Fresh sequence number for [`CorrelationKey::Sequenced`].
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Register `key` for a multi-step exchange.
    pub fn open(&self, key: CorrelationKey) -> Result<Exchange<'_>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::LinkClosed);
        }
        let (slot_tx, slot_rx) = channel::bounded(1);
        let pending = Arc::new(Pending {
            armed: Mutex::new(None),
            slot_tx,
        });
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => return Err(Error::DuplicateRequest(key)),
            Entry::Vacant(v) => {
                v.insert(Arc::clone(&pending));
            }
        }
        // close() may have swept the table just before the insert
        if self.closed.load(Ordering::Acquire) {
            self.pending.remove(&key);
            return Err(Error::LinkClosed);
        }
        log::trace!("[Engine] opened {:?}", key);
        Ok(Exchange {
            engine: self,
            key,
            pending,
            slot_rx,
        })
    }

    /// One-shot request: open, send with retries, close.
    pub fn send(&self, request: Request) -> Result<Packet> {
        let exchange = self.open(request.key)?;
        exchange.request(
            request.message,
            request.predicate,
            request.timeout,
            request.max_retries,
        )
    }

    /// Offer a decoded packet to every armed predicate. Pump thread only.
    pub fn on_packet(&self, packet: &Packet) {
        for entry in self.pending.iter() {
            let pending = entry.value();
            let mut armed = pending.armed.lock();
            let hit = armed.as_ref().is_some_and(|predicate| predicate(packet));
            if hit {
                armed.take();
                // Capacity 1 and disarmed: the slot is empty here
                let _ = pending.slot_tx.try_send(Outcome::Matched(packet.clone()));
                log::trace!("[Engine] {} matched {:?}", packet.kind(), entry.key());
            }
        }
    }

    /// Fail every pending exchange with `LinkClosed` and refuse new ones.
    pub fn fail_all(&self) {
        self.closed.store(true, Ordering::Release);
        let mut failed = 0usize;
        for entry in self.pending.iter() {
            let pending = entry.value();
            pending.armed.lock().take();
            if pending.slot_tx.try_send(Outcome::Closed).is_ok() {
                failed += 1;
            }
        }
        if failed > 0 {
            log::debug!("[Engine] failed {} pending request(s) with LinkClosed", failed);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of open exchanges.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn writer(&self) -> &Arc<LinkWriter> {
        &self.writer
    }
}

/// An open exchange; the key is released on drop.
pub struct Exchange<'a> {
    engine: &'a CommandEngine,
    key: CorrelationKey,
    pending: Arc<Pending>,
    slot_rx: Receiver<Outcome>,
}

impl Exchange<'_> {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Arm `predicate`, write `message`, wait; re-send on each timeout.
    ///
    /// Fails with `Timeout` after `max_retries + 1` writes without a match.
    pub fn request(
        &self,
        message: Message,
        predicate: Predicate,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Packet> {
        let operation = format!("{} ({:?})", message.kind(), self.key);
        self.arm(predicate)?;

        let attempts = max_retries + 1;
        for attempt in 0..attempts {
            if attempt > 0 {
                self.engine.sink.event(&SessionEvent::RequestRetry {
                    operation: operation.clone(),
                    attempt,
                });
            }
            if let Err(e) = self.engine.writer.send(message.clone()) {
                self.disarm();
                return Err(e);
            }
            match self.slot_rx.recv_timeout(timeout) {
                Ok(outcome) => return Self::resolve(outcome),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(Error::LinkClosed),
            }
        }

        self.disarm();
        // A match may have landed between the last timeout and disarm
        if let Ok(outcome) = self.slot_rx.try_recv() {
            return Self::resolve(outcome);
        }
        self.engine.sink.event(&SessionEvent::RequestTimeout {
            operation: operation.clone(),
            attempts,
        });
        Err(Error::timeout(operation, attempts, timeout))
    }

    /// Wait for a message matching `predicate` without writing anything.
    pub fn wait(&self, predicate: Predicate, timeout: Duration) -> Result<Packet> {
        self.arm(predicate)?;
        match self.slot_rx.recv_timeout(timeout) {
            Ok(outcome) => Self::resolve(outcome),
            Err(RecvTimeoutError::Disconnected) => Err(Error::LinkClosed),
            Err(RecvTimeoutError::Timeout) => {
                self.disarm();
                if let Ok(outcome) = self.slot_rx.try_recv() {
                    return Self::resolve(outcome);
                }
                Err(Error::timeout(format!("{:?}", self.key), 1, timeout))
            }
        }
    }

    fn arm(&self, predicate: Predicate) -> Result<()> {
        *self.pending.armed.lock() = Some(predicate);
        if self.engine.is_closed() {
            self.disarm();
            return Err(Error::LinkClosed);
        }
        Ok(())
    }

    fn disarm(&self) {
        self.pending.armed.lock().take();
    }

    fn resolve(outcome: Outcome) -> Result<Packet> {
        match outcome {
            Outcome::Matched(packet) => Ok(packet),
            Outcome::Closed => Err(Error::LinkClosed),
        }
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        self.engine.pending.remove(&self.key);
        log::trace!("[Engine] closed {:?}", self.key);
    }
}
