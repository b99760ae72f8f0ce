// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Vehicle state: attribute cache, observer registry and the fixed table
//! that maps decoded messages to attribute updates.

pub mod cache;
pub mod mapping;
pub mod observer;
pub mod value;

pub use cache::{AttributeCache, AttributeRecord};
pub use observer::{Callback, Event, EventKind, ListenerId, ObserverRegistry, Selector};
pub use value::{
    Attitude, AttributeValue, Battery, Capabilities, GpsInfo, LocalLocation, Location, Rangefinder,
    RcChannels, Velocity, Version, Wind,
};

/// Attribute names.
pub mod names {
    pub const MODE: &str = "mode";
    pub const ARMED: &str = "armed";
    pub const SYSTEM_STATUS: &str = "system_status";
    pub const LAST_HEARTBEAT: &str = "last_heartbeat";
    pub const VEHICLE_TYPE: &str = "vehicle_type";
    pub const AUTOPILOT: &str = "autopilot";
    pub const BATTERY: &str = "battery";
    pub const GPS: &str = "gps";
    pub const ATTITUDE: &str = "attitude";
    pub const LOCATION: &str = "location";
    pub const VELOCITY: &str = "velocity";
    pub const HEADING: &str = "heading";
    pub const AIRSPEED: &str = "airspeed";
    pub const GROUNDSPEED: &str = "groundspeed";
    pub const EKF_OK: &str = "ekf_ok";
    pub const HOME_LOCATION: &str = "home_location";
    pub const NEXT_WAYPOINT: &str = "next_waypoint";
    pub const PARAMETERS: &str = "parameters";
    pub const STATUS_TEXT: &str = "status_text";
    pub const LOCAL_LOCATION: &str = "local_location";
    pub const RANGEFINDER: &str = "rangefinder";
    pub const WIND: &str = "wind";
    pub const CHANNELS: &str = "channels";
    pub const VERSION: &str = "version";
    pub const CAPABILITIES: &str = "capabilities";

    /// Every attribute the cache can hold.
    pub const ALL: &[&str] = &[
        MODE,
        ARMED,
        SYSTEM_STATUS,
        LAST_HEARTBEAT,
        VEHICLE_TYPE,
        AUTOPILOT,
        BATTERY,
        GPS,
        ATTITUDE,
        LOCATION,
        VELOCITY,
        HEADING,
        AIRSPEED,
        GROUNDSPEED,
        EKF_OK,
        HOME_LOCATION,
        NEXT_WAYPOINT,
        PARAMETERS,
        STATUS_TEXT,
        LOCAL_LOCATION,
        RANGEFINDER,
        WIND,
        CHANNELS,
        VERSION,
        CAPABILITIES,
    ];

    /// Attributes `wait_ready` waits for by default.
    pub const READY_DEFAULT: &[&str] = &[PARAMETERS, GPS, ARMED, MODE, ATTITUDE];
}
