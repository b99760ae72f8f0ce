// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dronelink: MAVLink-style client session runtime
//!
//! Connects to a vehicle over a byte link, keeps a live view of its state
//! and runs the request/response protocols a ground station needs.
//!
//! # Features
//!
//! - **Message Pump**: one thread decodes frames and dispatches them in order
//! - **Attribute Cache**: last-known vehicle state with per-name versions
//! - **Observers**: attribute, message, parameter and disconnect listeners
//! - **Command/Ack Engine**: correlated requests with timeouts and retries
//! - **Parameter Sync**: full table download with gap sweeps
//! - **Mission Transfer**: upload/download of ordered mission items
//!
//! # Quick Start
//!
//! ```no_run
//! use dronelink::{Session, SessionConfig};
//! use std::time::Duration;
//!
//! let session = Session::connect("tcp:127.0.0.1:5760", SessionConfig::default())?;
//! session.on_attribute("mode", |event| {
//!     println!("mode -> {:?}", event.value());
//! });
//! session.parameters().sync(Duration::from_secs(60))?;
//! let items = session.mission().download()?;
//! println!("{} mission items", items.len());
//! # Ok::<(), dronelink::Error>(())
//! ```
//!
//! # Connection Strings
//!
//! | String | Link |
//! |--------|------|
//! | `tcp:host:port` | TCP client |
//! | `udpin:addr:port`, `udp:addr:port`, `addr:port` | UDP listener (learns the peer) |
//! | `udpout:host:port` | UDP client |
//! | `/dev/ttyUSB0[,baud]`, `COM3[,baud]` | Serial (feature `serial`) |

pub mod attributes;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod message;
pub mod metrics;
pub mod mission;
pub mod params;
pub mod pump;
pub mod session;
pub mod sink;
pub mod writer;

pub use attributes::{
    Attitude, AttributeValue, Battery, Capabilities, Event, EventKind, GpsInfo, ListenerId,
    LocalLocation, Location, Rangefinder, RcChannels, Selector, Velocity, Version, Wind,
};
pub use codec::{Codec, Decoded, FrameCodec};
pub use config::{ConfigError, SessionConfig};
pub use engine::{CommandEngine, CorrelationKey, Request};
pub use error::{Error, Result};
pub use link::{connect, Endpoint, Link, MemoryLink};
pub use message::{Header, Message, MessageKind, MissionItem, Packet};
pub use metrics::{PumpMetrics, PumpMetricsSnapshot};
pub use mission::{MissionManager, MissionPlan, TransferState};
pub use params::{ParameterEntry, ParameterManager, SyncState};
pub use session::{LinkHealth, Session};
pub use sink::{LogSink, SessionEvent, SessionSink};
