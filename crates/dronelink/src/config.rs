// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration. Every
//! field has a default, so a file only needs the values it overrides:
//!
//! ```toml
//! command_timeout_ms = 500
//! command_retries = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// System id stamped on outgoing frames.
    pub source_system: u8,

    /// Component id stamped on outgoing frames.
    pub source_component: u8,

    /// Per-attempt timeout for commands, mode and arm changes (ms).
    pub command_timeout_ms: u64,

    /// Re-sends after the first attempt.
    pub command_retries: u32,

    /// Interval between parameter gap sweeps (ms).
    pub param_sweep_interval_ms: u64,

    /// Sweeps before parameter sync is declared stalled.
    pub param_max_sweeps: u32,

    /// Per-attempt timeout for `PARAM_SET` echoes (ms).
    pub param_set_timeout_ms: u64,

    pub param_set_retries: u32,

    /// Per-attempt timeout for each mission transfer step (ms).
    pub mission_item_timeout_ms: u64,

    pub mission_retries: u32,

    /// Silence after which the link is reported as lost (ms).
    pub link_lost_threshold_ms: u64,

    /// How long `Session::connect` waits for the first vehicle heartbeat (ms).
    pub heartbeat_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_system: 255,
            source_component: 0,
            command_timeout_ms: 1_000,
            command_retries: 3,
            param_sweep_interval_ms: 1_000,
            param_max_sweeps: 10,
            param_set_timeout_ms: 1_000,
            param_set_retries: 3,
            mission_item_timeout_ms: 1_000,
            mission_retries: 3,
            link_lost_threshold_ms: 5_000,
            heartbeat_timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to a TOML file.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("command_timeout_ms", self.command_timeout_ms),
            ("param_sweep_interval_ms", self.param_sweep_interval_ms),
            ("param_set_timeout_ms", self.param_set_timeout_ms),
            ("mission_item_timeout_ms", self.mission_item_timeout_ms),
            ("link_lost_threshold_ms", self.link_lost_threshold_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
            }
        }

        if self.param_max_sweeps == 0 {
            return Err(ConfigError::Invalid("param_max_sweeps must be > 0".into()));
        }

        if self.source_system == 0 {
            return Err(ConfigError::Invalid(
                "source_system 0 is reserved for broadcast".into(),
            ));
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn param_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.param_sweep_interval_ms)
    }

    pub fn param_set_timeout(&self) -> Duration {
        Duration::from_millis(self.param_set_timeout_ms)
    }

    pub fn mission_item_timeout(&self) -> Duration {
        Duration::from_millis(self.mission_item_timeout_ms)
    }

    pub fn link_lost_threshold(&self) -> Duration {
        Duration::from_millis(self.link_lost_threshold_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}
