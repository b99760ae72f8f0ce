// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serialized outbound path.
//!
//! Every frame leaving the session goes through [`LinkWriter::send`]:
//! target fields are filled from the detected vehicle, the header gets the
//! next sequence number, and encode + write happen under one mutex so
//! frames from concurrent callers never interleave.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::message::{Header, Message, Packet};
use crate::metrics::PumpMetrics;
use crate::sink::{SessionEvent, SessionSink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

/// Shared writer for one session.
pub struct LinkWriter {
    link: Arc<dyn Link>,
    codec: Arc<dyn Codec>,
    source_system: u8,
    source_component: u8,
    /// Header sequence; guarded together with the write
    sequence: Mutex<u8>,
    /// `system << 8 | component` of the vehicle, 0 until detected
    target: AtomicU16,
    closed: AtomicBool,
    metrics: Arc<PumpMetrics>,
    sink: Arc<dyn SessionSink>,
}

impl LinkWriter {
    pub fn new(
        link: Arc<dyn Link>,
        codec: Arc<dyn Codec>,
        source_system: u8,
        source_component: u8,
        metrics: Arc<PumpMetrics>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            link,
            codec,
            source_system,
            source_component,
            sequence: Mutex::new(0),
            target: AtomicU16::new(0),
            closed: AtomicBool::new(false),
            metrics,
            sink,
        }
    }

    /// Fix the vehicle target. Only the first call wins.
    pub fn set_target_once(&self, system: u8, component: u8) -> bool {
        let packed = (u16::from(system) << 8) | u16::from(component);
        self.target
            .compare_exchange(0, packed, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `(system, component)` of the vehicle, if detected.
    pub fn target(&self) -> Option<(u8, u8)> {
        match self.target.load(Ordering::Acquire) {
            0 => None,
            packed => Some(((packed >> 8) as u8, (packed & 0xFF) as u8)),
        }
    }

    /// Encode and write one message.
    pub fn send(&self, mut message: Message) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::LinkClosed);
        }
        if let Some((system, component)) = self.target() {
            message.fill_targets(system, component);
        }
        let kind = message.kind();

        let mut sequence = self.sequence.lock();
        let packet = Packet::new(
            Header {
                system_id: self.source_system,
                component_id: self.source_component,
                sequence: *sequence,
            },
            message,
        );
        let frame = self.codec.encode(&packet)?;
        if let Err(e) = self.link.write(&frame) {
            self.sink.event(&SessionEvent::WriteFailed {
                kind,
                reason: e.to_string(),
            });
            return Err(e.into());
        }
        *sequence = sequence.wrapping_add(1);
        self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
        log::trace!("[Writer] sent {}", kind);
        Ok(())
    }

    /// Refuse further writes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }
}
