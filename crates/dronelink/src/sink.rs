// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session event sink.
//!
//! Noteworthy runtime events (link loss, dropped frames, listener panics,
//! timeouts) go to a [`SessionSink`] injected at session construction.
//! [`LogSink`] forwards them to the `log` facade and is the default.

use crate::message::MessageKind;
use std::time::Duration;

/// Structured session event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Pump started reading from the link.
    PumpStarted { link: String },
    /// Link reached end of stream or failed; the session is now closed.
    LinkLost { reason: String },
    /// `close()` completed.
    Closed,
    /// A frame was skipped.
    DecodeError { reason: String, skipped: usize },
    /// A listener callback panicked.
    ListenerPanic { selector: String, message: String },
    /// A correlated request was re-sent after a timeout.
    RequestRetry { operation: String, attempt: u32 },
    /// A correlated request exhausted its retries.
    RequestTimeout { operation: String, attempts: u32 },
    /// First heartbeat from a vehicle fixed the target.
    VehicleDetected { system_id: u8, component_id: u8, mav_type: u8 },
    /// Parameter sync ran out of sweeps.
    ParameterSyncStalled { received: usize, total: usize },
    /// Parameter sync finished.
    ParameterSyncComplete { total: usize, elapsed: Duration },
    /// A write failed (the request that issued it sees the error too).
    WriteFailed { kind: MessageKind, reason: String },
}

/// Receiver for [`SessionEvent`]s.
///
/// Called from the pump thread and from caller threads; implementations
/// must be cheap and must not block.
pub trait SessionSink: Send + Sync {
    fn event(&self, event: &SessionEvent);
}

/// Default sink: forwards to `log` at a level matching severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SessionSink for LogSink {
    fn event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::PumpStarted { link } => log::debug!("[Session] pump started on {}", link),
            SessionEvent::LinkLost { reason } => log::warn!("[Session] link lost: {}", reason),
            SessionEvent::Closed => log::debug!("[Session] closed"),
            SessionEvent::DecodeError { reason, skipped } => {
                log::debug!("[Pump] skipped {} byte(s): {}", skipped, reason);
            }
            SessionEvent::ListenerPanic { selector, message } => {
                log::error!("[Observer] listener for {} panicked: {}", selector, message);
            }
            SessionEvent::RequestRetry { operation, attempt } => {
                log::debug!("[Engine] retry {} for {}", attempt, operation);
            }
            SessionEvent::RequestTimeout {
                operation,
                attempts,
            } => {
                log::warn!(
                    "[Engine] {} timed out after {} attempt(s)",
                    operation,
                    attempts
                );
            }
            SessionEvent::VehicleDetected {
                system_id,
                component_id,
                mav_type,
            } => log::info!(
                "[Session] vehicle {}/{} detected (type {})",
                system_id,
                component_id,
                mav_type
            ),
            SessionEvent::ParameterSyncStalled { received, total } => {
                log::warn!("[Params] sync stalled at {}/{}", received, total);
            }
            SessionEvent::ParameterSyncComplete { total, elapsed } => {
                log::info!("[Params] {} parameters loaded in {:?}", total, elapsed);
            }
            SessionEvent::WriteFailed { kind, reason } => {
                log::warn!("[Session] write of {} failed: {}", kind, reason);
            }
        }
    }
}
