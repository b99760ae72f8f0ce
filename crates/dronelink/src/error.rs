// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for session operations.
//!
//! Errors local to one correlated exchange (`Timeout`, `Protocol`,
//! `Transfer`, parameter errors) never affect other in-flight exchanges.
//! Only `Link` / `LinkClosed` are session-wide.

use crate::config::ConfigError;
use crate::engine::CorrelationKey;
use std::time::Duration;
use thiserror::Error;

/// Convenient alias for session results.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned by session, engine and sub-protocol operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Link Errors (session-wide)
    // ========================================================================
    /// Transport I/O failure.
    #[error("Link error: {0}")]
    Link(#[from] std::io::Error),

    /// The session is closed (or the link dropped) while the call was pending.
    #[error("Link closed")]
    LinkClosed,

    /// Connection string could not be parsed.
    #[error("Invalid connection string '{0}'")]
    InvalidConnection(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// A single frame could not be decoded (non-fatal, reported via metrics).
    #[error("Decode error: {0}")]
    Decode(String),

    /// Encoding an outgoing message failed.
    #[error("Encode error: {0}")]
    Encode(String),

    // ========================================================================
    // Request Errors (local to one exchange)
    // ========================================================================
    /// A correlated request exhausted its retries.
    #[error("Timed out waiting for {operation} after {attempts} attempt(s) of {timeout:?}")]
    Timeout {
        operation: String,
        attempts: u32,
        timeout: Duration,
    },

    /// The same correlation key is already pending.
    #[error("Request already in flight for {0:?}")]
    DuplicateRequest(CorrelationKey),

    /// Out-of-sequence or inconsistent response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A mission transfer was aborted.
    #[error("Mission {direction} aborted at item {item:?}: {source}")]
    Transfer {
        direction: &'static str,
        item: Option<u16>,
        #[source]
        source: Box<Error>,
    },

    /// The vehicle answered a command with a non-accepted result.
    #[error("Command {command} rejected with result {result}")]
    CommandRejected { command: u16, result: u8 },

    // ========================================================================
    // Parameter Errors
    // ========================================================================
    /// Parameter sync exhausted its sweeps with gaps remaining.
    #[error("Parameter sync stalled: {received}/{total} received, {} missing", missing.len())]
    ParameterSyncStalled {
        received: usize,
        total: usize,
        missing: Vec<u16>,
    },

    /// The vehicle echoed a different value than the one requested.
    #[error("Parameter {name} rejected: requested {requested}, vehicle reports {actual}")]
    ParameterRejected {
        name: String,
        requested: f32,
        actual: f32,
    },

    /// Parameter name is empty or longer than 16 bytes.
    #[error("Invalid parameter name '{0}'")]
    InvalidParameterName(String),

    // ========================================================================
    // Vehicle Errors
    // ========================================================================
    /// Mode name is not known for the connected vehicle type.
    #[error("Unknown mode '{0}' for this vehicle")]
    UnknownMode(String),

    /// No vehicle heartbeat has been seen yet (target system unknown).
    #[error("No vehicle heartbeat received yet")]
    NoVehicle,

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Build a timeout error for `operation`.
    pub fn timeout(operation: impl Into<String>, attempts: u32, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            attempts,
            timeout,
        }
    }

    /// Whether this error is terminal for the whole session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Link(_) | Self::LinkClosed)
    }

    /// Whether this error (or the cause of a transfer abort) is `LinkClosed`.
    pub fn is_link_closed(&self) -> bool {
        match self {
            Self::LinkClosed => true,
            Self::Transfer { source, .. } => source.is_link_closed(),
            _ => false,
        }
    }
}
