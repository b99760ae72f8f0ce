// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session facade.
//!
//! A [`Session`] owns one link and composes the pump, attribute cache,
//! observer registry, command engine, parameter manager and mission
//! manager. It is the only type application code needs.
//!
//! ```no_run
//! use dronelink::{Session, SessionConfig};
//! use std::time::Duration;
//!
//! let session = Session::connect("udpin:0.0.0.0:14550", SessionConfig::default())?;
//! session.wait_ready_default(Duration::from_secs(30))?;
//! println!("mode: {:?}", session.mode());
//! session.set_mode("GUIDED")?;
//! session.arm()?;
//! # Ok::<(), dronelink::Error>(())
//! ```

use crate::attributes::mapping::{attribute_updates, is_vehicle_type, merge_update};
use crate::attributes::{
    names, Attitude, AttributeCache, AttributeRecord, AttributeValue, Battery, Capabilities, Event,
    GpsInfo, ListenerId, LocalLocation, Location, ObserverRegistry, Rangefinder, RcChannels,
    Selector, Velocity, Version, Wind,
};
use crate::codec::{Codec, FrameCodec};
use crate::config::SessionConfig;
use crate::engine::{CommandEngine, CorrelationKey, Request};
use crate::error::{Error, Result};
use crate::link::{self, Link};
use crate::message::constants::*;
use crate::message::modes::VehicleClass;
use crate::message::{Message, MessageKind, MissionItem, Packet};
use crate::metrics::{PumpMetrics, PumpMetricsSnapshot};
use crate::mission::MissionManager;
use crate::params::ParameterManager;
use crate::pump::{MessagePump, PacketHandler};
use crate::sink::{LogSink, SessionEvent, SessionSink};
use crate::writer::LinkWriter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Link liveness derived from receive times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHealth {
    /// Age of the last decoded message of any kind.
    pub last_message: Option<Duration>,
    /// Age of the last vehicle heartbeat.
    pub last_heartbeat: Option<Duration>,
    pub threshold: Duration,
}

impl LinkHealth {
    /// A message arrived within the threshold.
    pub fn is_alive(&self) -> bool {
        self.last_message.is_some_and(|age| age < self.threshold)
    }
}

// ============================================================================
// Shared state (pump side)
// ============================================================================

struct SessionInner {
    config: SessionConfig,
    cache: AttributeCache,
    registry: ObserverRegistry,
    writer: Arc<LinkWriter>,
    engine: Arc<CommandEngine>,
    params: ParameterManager,
    mission: MissionManager,
    metrics: Arc<PumpMetrics>,
    sink: Arc<dyn SessionSink>,
    last_message: Mutex<Option<Instant>>,
    last_heartbeat: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl SessionInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// First half of shutdown: refuse writes and release every blocked
    /// caller. Returns false if shutdown already began.
    fn begin_shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.writer.close();
        self.engine.fail_all();
        self.params.close();
        self.cache.wake_all();
        true
    }

    /// Second half: fire the disconnect selector, silence the registry and
    /// release the link.
    fn finish_shutdown(&self, reason: &str) {
        self.registry.notify_disconnect(reason);
        self.registry.close();
        if let Err(e) = self.writer.link().close() {
            log::debug!("[Session] link close: {}", e);
        }
    }

    /// Packets from another system than the detected vehicle do not touch
    /// vehicle state.
    fn is_from_vehicle(&self, packet: &Packet) -> bool {
        match self.writer.target() {
            Some((system, _)) => packet.header.system_id == system,
            None => true,
        }
    }
}

impl PacketHandler for SessionInner {
    fn on_packet(&self, packet: Packet) {
        if self.is_closed() {
            return;
        }
        let now = Instant::now();
        *self.last_message.lock() = Some(now);

        if let Message::Heartbeat { mav_type, .. } = packet.message {
            if is_vehicle_type(mav_type) {
                let (system_id, component_id) =
                    (packet.header.system_id, packet.header.component_id);
                if self.writer.set_target_once(system_id, component_id) {
                    self.sink.event(&SessionEvent::VehicleDetected {
                        system_id,
                        component_id,
                        mav_type,
                    });
                }
                if self.is_from_vehicle(&packet) {
                    *self.last_heartbeat.lock() = Some(now);
                }
            }
        }

        if self.is_from_vehicle(&packet) {
            for (name, value) in attribute_updates(&packet.message) {
                let value = if name == names::CHANNELS {
                    merge_update(self.cache.value(name).as_ref(), value)
                } else {
                    value
                };
                let update = self.cache.update(name, value.clone());
                self.registry
                    .notify_attribute(name, &value, update.version, update.changed);
            }
        }

        self.registry.notify_message(&packet);

        if let Some(change) = self.params.on_packet(&packet) {
            if change.changed {
                self.registry.notify_parameter(&change.name, change.value);
            }
        }

        self.engine.on_packet(&packet);
    }

    fn on_link_lost(&self, reason: &str) {
        if !self.begin_shutdown() {
            return;
        }
        self.sink.event(&SessionEvent::LinkLost {
            reason: reason.to_string(),
        });
        self.finish_shutdown(reason);
    }
}

// ============================================================================
// Session
// ============================================================================

/// Client session to one vehicle.
pub struct Session {
    inner: Arc<SessionInner>,
    pump: MessagePump,
}

impl Session {
    /// Parse `conn`, open the link and wait for the first vehicle heartbeat.
    ///
    /// Requests the parameter list and the autopilot version once the
    /// vehicle is known, so `parameters`, `version` and `capabilities`
    /// become populated.
    pub fn connect(conn: &str, config: SessionConfig) -> Result<Self> {
        let link = link::connect(conn)?;
        let heartbeat_timeout = config.heartbeat_timeout();
        let session = Self::open(link, config)?;
        session.wait_heartbeat(heartbeat_timeout)?;
        session.request_parameters()?;
        session.request_autopilot_version()?;
        Ok(session)
    }

    /// Start a session on an open link with the default sink and codec.
    pub fn open(link: Arc<dyn Link>, config: SessionConfig) -> Result<Self> {
        Self::open_with(link, config, Arc::new(LogSink), Arc::new(FrameCodec::default()))
    }

    /// Start a session with an explicit event sink and codec.
    pub fn open_with(
        link: Arc<dyn Link>,
        config: SessionConfig,
        sink: Arc<dyn SessionSink>,
        codec: Arc<dyn Codec>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(PumpMetrics::new());
        let writer = Arc::new(LinkWriter::new(
            Arc::clone(&link),
            Arc::clone(&codec),
            config.source_system,
            config.source_component,
            Arc::clone(&metrics),
            Arc::clone(&sink),
        ));
        let engine = Arc::new(CommandEngine::new(Arc::clone(&writer), Arc::clone(&sink)));
        let params = ParameterManager::new(Arc::clone(&engine), Arc::clone(&sink), &config);
        let mission = MissionManager::new(
            Arc::clone(&engine),
            config.mission_item_timeout(),
            config.mission_retries,
        );

        let inner = Arc::new(SessionInner {
            cache: AttributeCache::new(),
            registry: ObserverRegistry::new(Arc::clone(&metrics), Arc::clone(&sink)),
            writer,
            engine,
            params,
            mission,
            metrics: Arc::clone(&metrics),
            sink: Arc::clone(&sink),
            last_message: Mutex::new(None),
            last_heartbeat: Mutex::new(None),
            closed: AtomicBool::new(false),
            config,
        });

        let pump = MessagePump::start(
            link,
            codec,
            Arc::clone(&inner) as Arc<dyn PacketHandler>,
            metrics,
            sink,
        )?;
        log::debug!("[Session] opened");
        Ok(Self { inner, pump })
    }

    /// Stop the pump, fail pending requests with `LinkClosed` and release
    /// the link. Idempotent; callable from any thread, listeners included.
    pub fn close(&self) {
        let first = self.inner.begin_shutdown();
        self.pump.stop();
        if first {
            self.inner.finish_shutdown("session closed");
            self.inner.sink.event(&SessionEvent::Closed);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Current value of `name`, `None` if never populated. Never blocks.
    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        self.inner.cache.value(&name.to_ascii_lowercase())
    }

    /// Value with version and update time.
    pub fn record(&self, name: &str) -> Option<AttributeRecord> {
        self.inner.cache.get(&name.to_ascii_lowercase())
    }

    /// Names of every populated attribute.
    pub fn attribute_names(&self) -> Vec<String> {
        self.inner.cache.names()
    }

    pub fn mode(&self) -> Option<String> {
        self.get(names::MODE).and_then(|v| v.as_text().map(str::to_string))
    }

    pub fn armed(&self) -> Option<bool> {
        self.get(names::ARMED).and_then(|v| v.as_bool())
    }

    pub fn system_status(&self) -> Option<String> {
        self.get(names::SYSTEM_STATUS)
            .and_then(|v| v.as_text().map(str::to_string))
    }

    pub fn vehicle_type(&self) -> Option<u8> {
        self.get(names::VEHICLE_TYPE)
            .and_then(|v| v.as_int())
            .and_then(|t| u8::try_from(t).ok())
    }

    pub fn attitude(&self) -> Option<Attitude> {
        self.get(names::ATTITUDE).and_then(|v| v.as_attitude().copied())
    }

    pub fn location(&self) -> Option<Location> {
        self.get(names::LOCATION).and_then(|v| v.as_location().copied())
    }

    pub fn home_location(&self) -> Option<Location> {
        self.get(names::HOME_LOCATION)
            .and_then(|v| v.as_location().copied())
    }

    pub fn velocity(&self) -> Option<Velocity> {
        self.get(names::VELOCITY).and_then(|v| v.as_velocity().copied())
    }

    pub fn battery(&self) -> Option<Battery> {
        self.get(names::BATTERY).and_then(|v| v.as_battery().copied())
    }

    pub fn gps(&self) -> Option<GpsInfo> {
        self.get(names::GPS).and_then(|v| v.as_gps().copied())
    }

    /// Degrees, 0..360.
    pub fn heading(&self) -> Option<i64> {
        self.get(names::HEADING).and_then(|v| v.as_int())
    }

    pub fn airspeed(&self) -> Option<f64> {
        self.get(names::AIRSPEED).and_then(|v| v.as_float())
    }

    pub fn groundspeed(&self) -> Option<f64> {
        self.get(names::GROUNDSPEED).and_then(|v| v.as_float())
    }

    pub fn ekf_ok(&self) -> Option<bool> {
        self.get(names::EKF_OK).and_then(|v| v.as_bool())
    }

    pub fn next_waypoint(&self) -> Option<u16> {
        self.get(names::NEXT_WAYPOINT)
            .and_then(|v| v.as_int())
            .and_then(|s| u16::try_from(s).ok())
    }

    /// Position relative to the EKF origin.
    pub fn local_location(&self) -> Option<LocalLocation> {
        self.get(names::LOCAL_LOCATION)
            .and_then(|v| v.as_local_location().copied())
    }

    pub fn rangefinder(&self) -> Option<Rangefinder> {
        self.get(names::RANGEFINDER)
            .and_then(|v| v.as_rangefinder().copied())
    }

    pub fn wind(&self) -> Option<Wind> {
        self.get(names::WIND).and_then(|v| v.as_wind().copied())
    }

    /// RC input, merged across `RC_CHANNELS_RAW` and `RC_CHANNELS`.
    pub fn channels(&self) -> Option<RcChannels> {
        self.get(names::CHANNELS)
            .and_then(|v| v.as_channels().cloned())
    }

    /// Flight software version, labelled with the heartbeat's autopilot and
    /// vehicle type when those are known.
    pub fn version(&self) -> Option<Version> {
        let version = self.get(names::VERSION).and_then(|v| v.as_version().copied())?;
        let autopilot = self
            .get(names::AUTOPILOT)
            .and_then(|v| v.as_int())
            .and_then(|a| u8::try_from(a).ok());
        Some(version.with_vehicle(autopilot, self.vehicle_type()))
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.get(names::CAPABILITIES)
            .and_then(|v| v.as_capabilities().copied())
    }

    /// EKF healthy and system in STANDBY or ACTIVE.
    pub fn is_armable(&self) -> bool {
        let status_ok = matches!(
            self.system_status().as_deref(),
            Some("STANDBY") | Some("ACTIVE")
        );
        status_ok && self.ekf_ok().unwrap_or(false)
    }

    /// `(system, component)` of the detected vehicle.
    pub fn target(&self) -> Option<(u8, u8)> {
        self.inner.writer.target()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    pub fn add_listener<F>(&self, selector: Selector, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.inner.registry.add_listener(selector, callback)
    }

    /// Listen to one attribute (or `"*"` for every attribute and message).
    pub fn on_attribute<F>(&self, name: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        let selector = if name == "*" {
            Selector::Wildcard
        } else {
            Selector::attribute(name)
        };
        self.add_listener(selector, callback)
    }

    pub fn on_message<F>(&self, kind: MessageKind, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.add_listener(Selector::Message(kind), callback)
    }

    /// Listen to value changes of one parameter, or `"*"` for all.
    pub fn on_parameter<F>(&self, name: &str, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.add_listener(Selector::parameter(name), callback)
    }

    pub fn on_disconnect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.add_listener(Selector::Disconnect, callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.registry.remove_listener(id)
    }

    // ========================================================================
    // Waiting
    // ========================================================================

    /// Block until every attribute in `names` is populated. Names are
    /// case-insensitive, as for [`get`](Self::get).
    pub fn wait_ready(&self, names: &[&str], timeout: Duration) -> Result<()> {
        let inner = &self.inner;
        let lowered: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        let lowered: Vec<&str> = lowered.iter().map(String::as_str).collect();
        let missing = inner
            .cache
            .wait_populated(&lowered, timeout, &|| inner.is_closed());
        if inner.is_closed() {
            return Err(Error::LinkClosed);
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::timeout(
            format!("attributes [{}]", missing.join(", ")),
            1,
            timeout,
        ))
    }

    /// [`wait_ready`](Self::wait_ready) on `parameters`, `gps`, `armed`,
    /// `mode` and `attitude`.
    pub fn wait_ready_default(&self, timeout: Duration) -> Result<()> {
        self.wait_ready(names::READY_DEFAULT, timeout)
    }

    /// Block until a vehicle heartbeat has been seen.
    pub fn wait_heartbeat(&self, timeout: Duration) -> Result<()> {
        self.wait_ready(&[names::LAST_HEARTBEAT], timeout)
    }

    // ========================================================================
    // Vehicle commands
    // ========================================================================

    fn request(
        &self,
        message: Message,
        key: CorrelationKey,
        predicate: impl Fn(&Packet) -> bool + Send + Sync + 'static,
    ) -> Result<Packet> {
        self.inner.engine.send(
            Request::new(message, key, predicate)
                .timeout(self.inner.config.command_timeout())
                .retries(self.inner.config.command_retries),
        )
    }

    /// Change flight mode and wait for a heartbeat reporting it.
    pub fn set_mode(&self, name: &str) -> Result<()> {
        let (system, _) = self.target().ok_or(Error::NoVehicle)?;
        let mav_type = self.vehicle_type().ok_or(Error::NoVehicle)?;
        let custom_mode = VehicleClass::from_mav_type(mav_type)
            .and_then(|class| class.mode_number(name))
            .ok_or_else(|| Error::UnknownMode(name.to_string()))?;

        log::debug!("[Session] set mode {} ({})", name, custom_mode);
        self.request(
            Message::SetMode {
                target_system: system,
                base_mode: MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
                custom_mode,
            },
            CorrelationKey::Mode,
            move |p| {
                p.header.system_id == system
                    && matches!(p.message, Message::Heartbeat { mav_type, custom_mode: m, .. }
                        if m == custom_mode && is_vehicle_type(mav_type))
            },
        )?;
        Ok(())
    }

    pub fn arm(&self) -> Result<()> {
        self.set_armed(true)
    }

    pub fn disarm(&self) -> Result<()> {
        self.set_armed(false)
    }

    /// Arm or disarm and wait for a heartbeat with the matching flag. A
    /// refusing `COMMAND_ACK` fails early with `CommandRejected`.
    fn set_armed(&self, armed: bool) -> Result<()> {
        let (system, _) = self.target().ok_or(Error::NoVehicle)?;
        let command = MAV_CMD_COMPONENT_ARM_DISARM;
        let param1 = if armed { 1.0 } else { 0.0 };
        let reply = self.request(
            Message::command_long(0, 0, command, [param1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            CorrelationKey::Arming,
            move |p| {
                if p.header.system_id != system {
                    return false;
                }
                match p.message {
                    Message::Heartbeat {
                        mav_type,
                        base_mode,
                        ..
                    } => {
                        is_vehicle_type(mav_type)
                            && (base_mode & MAV_MODE_FLAG_SAFETY_ARMED != 0) == armed
                    }
                    Message::CommandAck { command: c, result } => {
                        c == command
                            && result != MAV_RESULT_ACCEPTED
                            && result != MAV_RESULT_IN_PROGRESS
                    }
                    _ => false,
                }
            },
        )?;
        if let Message::CommandAck { result, .. } = reply.message {
            return Err(Error::CommandRejected { command, result });
        }
        log::debug!("[Session] {}", if armed { "armed" } else { "disarmed" });
        Ok(())
    }

    /// Send `COMMAND_LONG` and wait for its `COMMAND_ACK` from the vehicle.
    pub fn command_long(&self, command: u16, params: [f32; 7]) -> Result<()> {
        let (system, _) = self.target().ok_or(Error::NoVehicle)?;
        let reply = self.request(
            Message::command_long(0, 0, command, params),
            CorrelationKey::Command(command),
            move |p| {
                p.header.system_id == system
                    && matches!(p.message, Message::CommandAck { command: c, result }
                        if c == command && result != MAV_RESULT_IN_PROGRESS)
            },
        )?;
        match reply.message {
            Message::CommandAck { result, .. } if result == MAV_RESULT_ACCEPTED => Ok(()),
            Message::CommandAck { result, .. } => Err(Error::CommandRejected { command, result }),
            other => Err(Error::Protocol(format!("unexpected {}", other.kind()))),
        }
    }

    /// Reboot the autopilot.
    pub fn reboot(&self) -> Result<()> {
        self.command_long(
            MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    /// Take off to `altitude` metres (vehicle must be armed in GUIDED).
    pub fn simple_takeoff(&self, altitude: f32) -> Result<()> {
        self.command_long(
            MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude],
        )
    }

    /// Fly to `location` in GUIDED mode. Fire-and-forget.
    ///
    /// Uses the relative altitude when set, else `alt`.
    pub fn simple_goto(&self, location: &Location) -> Result<()> {
        self.target().ok_or(Error::NoVehicle)?;
        let mut item = MissionItem::new(MAV_CMD_NAV_WAYPOINT);
        item.current = 2; // guided-mode target
        item.x = location.lat_e7();
        item.y = location.lon_e7();
        item.z = location.relative_alt.unwrap_or(location.alt) as f32;
        self.send_message(Message::MissionItemInt {
            target_system: 0,
            target_component: 0,
            item,
        })
    }

    /// Point the nose at `heading` degrees (absolute, or relative to the
    /// current heading) at `rate` deg/s. Only honoured in GUIDED and AUTO.
    pub fn condition_yaw(
        &self,
        heading: f32,
        relative: bool,
        clockwise: bool,
        rate: f32,
    ) -> Result<()> {
        let direction = if clockwise { 1.0 } else { -1.0 };
        let relative = if relative { 1.0 } else { 0.0 };
        self.command_long(
            MAV_CMD_CONDITION_YAW,
            [heading, rate, direction, relative, 0.0, 0.0, 0.0],
        )
    }

    /// Target airspeed in m/s.
    pub fn set_airspeed(&self, speed: f32) -> Result<()> {
        self.command_long(
            MAV_CMD_DO_CHANGE_SPEED,
            [0.0, speed, -1.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    /// Target groundspeed in m/s.
    pub fn set_groundspeed(&self, speed: f32) -> Result<()> {
        self.command_long(
            MAV_CMD_DO_CHANGE_SPEED,
            [1.0, speed, -1.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    /// Command a velocity (m/s) in the local NED frame. Fire-and-forget;
    /// the vehicle stops after a few seconds without a fresh command.
    pub fn send_ned_velocity(&self, north: f32, east: f32, down: f32) -> Result<()> {
        self.target().ok_or(Error::NoVehicle)?;
        self.send_message(Message::velocity_local_ned(north, east, down))
    }

    /// Command a velocity (m/s) in the global frame. Fire-and-forget.
    pub fn send_global_velocity(&self, north: f32, east: f32, down: f32) -> Result<()> {
        self.target().ok_or(Error::NoVehicle)?;
        self.send_message(Message::velocity_global(north, east, down))
    }

    /// Ask for `AUTOPILOT_VERSION` without waiting.
    pub fn request_autopilot_version(&self) -> Result<()> {
        self.target().ok_or(Error::NoVehicle)?;
        self.send_message(Message::command_long(
            0,
            0,
            MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        ))
    }

    /// Write a raw message. Zero target fields are filled in.
    pub fn send_message(&self, message: Message) -> Result<()> {
        self.inner.writer.send(message)
    }

    /// Ask the vehicle to stream its parameter table without waiting.
    pub fn request_parameters(&self) -> Result<()> {
        self.send_message(Message::ParamRequestList {
            target_system: 0,
            target_component: 0,
        })
    }

    // ========================================================================
    // Sub-protocols and health
    // ========================================================================

    pub fn parameters(&self) -> &ParameterManager {
        &self.inner.params
    }

    pub fn mission(&self) -> &MissionManager {
        &self.inner.mission
    }

    pub fn link_health(&self) -> LinkHealth {
        let age = |at: &Mutex<Option<Instant>>| at.lock().map(|t| t.elapsed());
        LinkHealth {
            last_message: age(&self.inner.last_message),
            last_heartbeat: age(&self.inner.last_heartbeat),
            threshold: self.inner.config.link_lost_threshold(),
        }
    }

    pub fn metrics(&self) -> PumpMetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
