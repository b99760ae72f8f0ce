// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Attribute value objects.

use crate::message::constants::{MAV_AUTOPILOT_ARDUPILOTMEGA, MAV_AUTOPILOT_PX4};
use crate::message::modes::VehicleClass;
use std::fmt;
use std::time::Instant;

/// Global position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Degrees.
    pub lat: f64,
    /// Degrees.
    pub lon: f64,
    /// Metres above mean sea level.
    pub alt: f64,
    /// Metres above home, when known.
    pub relative_alt: Option<f64>,
}

impl Location {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self {
            lat,
            lon,
            alt,
            relative_alt: None,
        }
    }

    /// Latitude in degE7.
    pub fn lat_e7(&self) -> i32 {
        (self.lat * 1e7).round() as i32
    }

    /// Longitude in degE7.
    pub fn lon_e7(&self) -> i32 {
        (self.lon * 1e7).round() as i32
    }
}

/// Vehicle attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Battery state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    /// Volts.
    pub voltage: f32,
    /// Amperes.
    pub current: Option<f32>,
    /// Percent remaining.
    pub level: Option<u8>,
}

/// GPS fix information.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsInfo {
    pub fix_type: u8,
    pub satellites_visible: u8,
    /// Horizontal dilution (cm), when known.
    pub eph: Option<u16>,
    /// Vertical dilution (cm), when known.
    pub epv: Option<u16>,
}

/// Ground velocity in m/s (north, east, down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub north: f32,
    pub east: f32,
    pub down: f32,
}

/// Position relative to the EKF origin, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalLocation {
    pub north: f32,
    pub east: f32,
    pub down: f32,
}

impl LocalLocation {
    /// Straight-line distance from the origin.
    pub fn distance_home(&self) -> f32 {
        (self.north * self.north + self.east * self.east + self.down * self.down).sqrt()
    }
}

/// Downward rangefinder reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rangefinder {
    /// Metres.
    pub distance: f32,
    /// Volts.
    pub voltage: f32,
}

/// Wind estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wind {
    /// Degrees the wind blows from.
    pub direction: f32,
    /// m/s.
    pub speed: f32,
    /// Vertical speed, m/s.
    pub speed_z: f32,
}

/// RC input channels, 1-based.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RcChannels {
    /// Pulse widths in microseconds, `None` when the channel is unused.
    pub values: Vec<Option<u16>>,
    /// Receiver signal strength, when reported.
    pub rssi: Option<u8>,
}

impl RcChannels {
    /// Pulse width of channel `channel` (1-based).
    pub fn get(&self, channel: usize) -> Option<u16> {
        channel
            .checked_sub(1)
            .and_then(|i| self.values.get(i))
            .copied()
            .flatten()
    }

    /// Number of channel slots reported.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `self` on `previous`: slots this report leaves unused or does
    /// not cover keep their previous value.
    pub fn merged_onto(&self, previous: &RcChannels) -> RcChannels {
        let len = self.values.len().max(previous.values.len());
        let values = (0..len)
            .map(|i| {
                self.values
                    .get(i)
                    .copied()
                    .flatten()
                    .or_else(|| previous.values.get(i).copied().flatten())
            })
            .collect();
        RcChannels {
            values,
            rssi: self.rssi.or(previous.rssi),
        }
    }
}

/// Flight software version as packed in `AUTOPILOT_VERSION`.
///
/// Layout: major << 24 | minor << 16 | patch << 8 | release, where a
/// release byte of 255 marks a stable build and otherwise encodes the
/// release type in its top two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub raw: u32,
    /// `MAV_AUTOPILOT` from the heartbeat, when known.
    pub autopilot: Option<u8>,
    /// `MAV_TYPE` from the heartbeat, when known.
    pub vehicle_type: Option<u8>,
}

const RELEASE_STABLE: u8 = 255;
const RELEASE_TYPES: [&str; 4] = ["dev", "alpha", "beta", "rc"];

impl Version {
    pub fn new(raw: u32) -> Self {
        Self {
            raw,
            autopilot: None,
            vehicle_type: None,
        }
    }

    /// Attach the heartbeat identity used for display.
    pub fn with_vehicle(self, autopilot: Option<u8>, vehicle_type: Option<u8>) -> Self {
        Self {
            autopilot: self.autopilot.or(autopilot),
            vehicle_type: self.vehicle_type.or(vehicle_type),
            ..self
        }
    }

    pub fn major(&self) -> u8 {
        (self.raw >> 24) as u8
    }

    pub fn minor(&self) -> u8 {
        (self.raw >> 16) as u8
    }

    pub fn patch(&self) -> u8 {
        (self.raw >> 8) as u8
    }

    fn release(&self) -> u8 {
        self.raw as u8
    }

    pub fn is_stable(&self) -> bool {
        self.release() == RELEASE_STABLE
    }

    /// `"dev"`, `"alpha"`, `"beta"`, `"rc"` or `"stable"`.
    pub fn release_type(&self) -> &'static str {
        if self.is_stable() {
            "stable"
        } else {
            RELEASE_TYPES[usize::from(self.release() >> 6)]
        }
    }

    /// Pre-release number, 0 for stable builds.
    pub fn release_version(&self) -> u8 {
        if self.is_stable() {
            0
        } else {
            self.release() % 64
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.autopilot {
            Some(MAV_AUTOPILOT_ARDUPILOTMEGA) => f.write_str("APM:")?,
            Some(MAV_AUTOPILOT_PX4) => f.write_str("PX4:")?,
            Some(_) => f.write_str("Unknown:")?,
            None => {}
        }
        if let Some(mav_type) = self.vehicle_type {
            match VehicleClass::from_mav_type(mav_type) {
                Some(VehicleClass::Copter) => f.write_str("Copter-")?,
                Some(VehicleClass::Plane) => f.write_str("Plane-")?,
                Some(VehicleClass::Rover) => f.write_str("Rover-")?,
                None => write!(f, "Type{}-", mav_type)?,
            }
        }
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if !self.is_stable() {
            write!(f, "-{}{}", self.release_type(), self.release_version())?;
        }
        Ok(())
    }
}

macro_rules! capability_flags {
    ($($name:ident = $bit:literal),* $(,)?) => {
        impl Capabilities {
            $(
                pub fn $name(&self) -> bool {
                    self.bits & (1 << $bit) != 0
                }
            )*
        }
    };
}

/// `MAV_PROTOCOL_CAPABILITY` bits the autopilot reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub bits: u64,
}

capability_flags! {
    mission_float = 0,
    param_float = 1,
    mission_int = 2,
    command_int = 3,
    param_union = 4,
    ftp = 5,
    set_attitude_target = 6,
    set_position_target_local_ned = 7,
    set_position_target_global_int = 8,
    terrain = 9,
    set_actuator_target = 10,
    flight_termination = 11,
    compass_calibration = 12,
}

/// Current value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(Instant),
    Location(Location),
    Attitude(Attitude),
    Battery(Battery),
    Gps(GpsInfo),
    Velocity(Velocity),
    LocalLocation(LocalLocation),
    Rangefinder(Rangefinder),
    Wind(Wind),
    Channels(RcChannels),
    Version(Version),
    Capabilities(Capabilities),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&Location> {
        match self {
            Self::Location(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_attitude(&self) -> Option<&Attitude> {
        match self {
            Self::Attitude(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_battery(&self) -> Option<&Battery> {
        match self {
            Self::Battery(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_gps(&self) -> Option<&GpsInfo> {
        match self {
            Self::Gps(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_velocity(&self) -> Option<&Velocity> {
        match self {
            Self::Velocity(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_local_location(&self) -> Option<&LocalLocation> {
        match self {
            Self::LocalLocation(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_rangefinder(&self) -> Option<&Rangefinder> {
        match self {
            Self::Rangefinder(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_wind(&self) -> Option<&Wind> {
        match self {
            Self::Wind(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_channels(&self) -> Option<&RcChannels> {
        match self {
            Self::Channels(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            Self::Version(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_capabilities(&self) -> Option<&Capabilities> {
        match self {
            Self::Capabilities(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<Instant> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{:.2}", v),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(t) => write!(f, "{:.1}s ago", t.elapsed().as_secs_f32()),
            Self::Location(l) => {
                write!(f, "lat={:.7} lon={:.7} alt={:.1}", l.lat, l.lon, l.alt)?;
                if let Some(rel) = l.relative_alt {
                    write!(f, " rel={:.1}", rel)?;
                }
                Ok(())
            }
            Self::Attitude(a) => write!(
                f,
                "roll={:.3} pitch={:.3} yaw={:.3}",
                a.roll, a.pitch, a.yaw
            ),
            Self::Battery(b) => {
                write!(f, "voltage={:.2}", b.voltage)?;
                match b.current {
                    Some(c) => write!(f, " current={:.2}", c)?,
                    None => f.write_str(" current=None")?,
                }
                match b.level {
                    Some(l) => write!(f, " level={}", l),
                    None => f.write_str(" level=None"),
                }
            }
            Self::Gps(g) => write!(
                f,
                "fix_type={} satellites={} eph={:?} epv={:?}",
                g.fix_type, g.satellites_visible, g.eph, g.epv
            ),
            Self::Velocity(v) => write!(f, "[{:.2}, {:.2}, {:.2}]", v.north, v.east, v.down),
            Self::LocalLocation(l) => {
                write!(f, "north={:.2} east={:.2} down={:.2}", l.north, l.east, l.down)
            }
            Self::Rangefinder(r) => {
                write!(f, "distance={:.2} voltage={:.2}", r.distance, r.voltage)
            }
            Self::Wind(w) => write!(
                f,
                "direction={:.1} speed={:.2} speed_z={:.2}",
                w.direction, w.speed, w.speed_z
            ),
            Self::Channels(c) => {
                f.write_str("[")?;
                for (i, v) in c.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match v {
                        Some(v) => write!(f, "{}", v)?,
                        None => f.write_str("-")?,
                    }
                }
                f.write_str("]")
            }
            Self::Version(v) => write!(f, "{}", v),
            Self::Capabilities(c) => write!(f, "{:#x}", c.bits),
        }
    }
}
