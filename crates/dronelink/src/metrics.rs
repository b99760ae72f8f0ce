// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pump counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters updated by the pump thread.
#[derive(Debug)]
pub struct PumpMetrics {
    /// Packets decoded and dispatched.
    pub messages_decoded: AtomicU64,

    /// Raw bytes read from the link.
    pub bytes_read: AtomicU64,

    /// Frames skipped by the codec.
    pub decode_errors: AtomicU64,

    /// Listener callbacks that panicked.
    pub listener_panics: AtomicU64,

    /// Frames written by the session.
    pub messages_sent: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl Default for PumpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpMetrics {
    pub fn new() -> Self {
        Self {
            messages_decoded: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            listener_panics: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Get snapshot of current counters.
    pub fn snapshot(&self) -> PumpMetricsSnapshot {
        PumpMetricsSnapshot {
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

/// Snapshot of pump counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpMetricsSnapshot {
    pub messages_decoded: u64,
    pub bytes_read: u64,
    pub decode_errors: u64,
    pub listener_panics: u64,
    pub messages_sent: u64,
    pub uptime_secs: u64,
}

impl PumpMetricsSnapshot {
    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.messages_decoded as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}
