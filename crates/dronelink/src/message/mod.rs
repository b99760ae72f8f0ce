// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed message model.
//!
//! [`Message`] is the decoded value of one frame; [`MessageKind`] is its
//! type tag (numeric id + canonical uppercase name). A [`Packet`] pairs a
//! message with the routing [`Header`] it arrived with.

pub mod constants;
pub mod modes;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter ids are at most 16 bytes on the wire.
pub const PARAM_ID_MAX_LEN: usize = 16;

/// `PARAM_VALUE.param_index` used by vehicles to echo a `PARAM_SET`.
pub const PARAM_INDEX_UNSOLICITED: u16 = u16::MAX;

/// Routing header carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub system_id: u8,
    pub component_id: u8,
    pub sequence: u8,
}

/// A decoded frame: header + message.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub message: Message,
}

impl Packet {
    pub fn new(header: Header, message: Message) -> Self {
        Self { header, message }
    }

    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }
}

// ============================================================================
// Message kinds
// ============================================================================

macro_rules! message_kinds {
    ($($variant:ident = $id:literal => $name:literal),* $(,)?) => {
        /// Message type tag.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MessageKind {
            $($variant),*
        }

        impl MessageKind {
            /// Every known kind, in id order.
            pub const ALL: &'static [MessageKind] = &[$(MessageKind::$variant),*];

            /// Numeric message id.
            pub const fn id(self) -> u16 {
                match self {
                    $(MessageKind::$variant => $id),*
                }
            }

            /// Canonical uppercase name (`"HEARTBEAT"`).
            pub const fn name(self) -> &'static str {
                match self {
                    $(MessageKind::$variant => $name),*
                }
            }

            pub fn from_id(id: u16) -> Option<Self> {
                match id {
                    $($id => Some(MessageKind::$variant),)*
                    _ => None,
                }
            }

            /// Case-insensitive lookup by canonical name.
            pub fn from_name(name: &str) -> Option<Self> {
                let upper = name.to_ascii_uppercase();
                match upper.as_str() {
                    $($name => Some(MessageKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

message_kinds! {
    Heartbeat = 0 => "HEARTBEAT",
    SysStatus = 1 => "SYS_STATUS",
    SetMode = 11 => "SET_MODE",
    ParamRequestRead = 20 => "PARAM_REQUEST_READ",
    ParamRequestList = 21 => "PARAM_REQUEST_LIST",
    ParamValue = 22 => "PARAM_VALUE",
    ParamSet = 23 => "PARAM_SET",
    GpsRawInt = 24 => "GPS_RAW_INT",
    Attitude = 30 => "ATTITUDE",
    LocalPositionNed = 32 => "LOCAL_POSITION_NED",
    GlobalPositionInt = 33 => "GLOBAL_POSITION_INT",
    RcChannelsRaw = 35 => "RC_CHANNELS_RAW",
    MissionSetCurrent = 41 => "MISSION_SET_CURRENT",
    MissionCurrent = 42 => "MISSION_CURRENT",
    MissionRequestList = 43 => "MISSION_REQUEST_LIST",
    MissionCount = 44 => "MISSION_COUNT",
    MissionClearAll = 45 => "MISSION_CLEAR_ALL",
    MissionAck = 47 => "MISSION_ACK",
    MissionRequestInt = 51 => "MISSION_REQUEST_INT",
    RcChannels = 65 => "RC_CHANNELS",
    MissionItemInt = 73 => "MISSION_ITEM_INT",
    VfrHud = 74 => "VFR_HUD",
    CommandLong = 76 => "COMMAND_LONG",
    CommandAck = 77 => "COMMAND_ACK",
    SetPositionTargetLocalNed = 84 => "SET_POSITION_TARGET_LOCAL_NED",
    SetPositionTargetGlobalInt = 86 => "SET_POSITION_TARGET_GLOBAL_INT",
    AutopilotVersion = 148 => "AUTOPILOT_VERSION",
    Wind = 168 => "WIND",
    Rangefinder = 173 => "RANGEFINDER",
    EkfStatusReport = 193 => "EKF_STATUS_REPORT",
    HomePosition = 242 => "HOME_POSITION",
    StatusText = 253 => "STATUSTEXT",
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// One mission item (`MISSION_ITEM_INT` payload minus routing fields).
///
/// `x`/`y` are latitude/longitude in degE7 for global frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub frame: u8,
    pub command: u16,
    pub current: u8,
    pub autocontinue: u8,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: i32,
    pub y: i32,
    pub z: f32,
}

impl MissionItem {
    /// Item with all params zeroed, relative-altitude frame, autocontinue set.
    pub fn new(command: u16) -> Self {
        Self {
            seq: 0,
            frame: constants::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            command,
            current: 0,
            autocontinue: 1,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: 0,
            y: 0,
            z: 0.0,
        }
    }

    pub fn latitude(&self) -> f64 {
        f64::from(self.x) / 1e7
    }

    pub fn longitude(&self) -> f64 {
        f64::from(self.y) / 1e7
    }
}

/// Typed message value.
///
/// Field units follow the wire conventions: degE7 for lat/lon, millimetres
/// for integer altitudes, cm/s for integer velocities, centidegrees for
/// integer headings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Heartbeat {
        mav_type: u8,
        autopilot: u8,
        base_mode: u8,
        custom_mode: u32,
        system_status: u8,
    },
    SysStatus {
        /// Millivolts.
        voltage_battery: u16,
        /// Centiamperes, -1 when unknown.
        current_battery: i16,
        /// Percent, -1 when unknown.
        battery_remaining: i8,
    },
    SetMode {
        target_system: u8,
        base_mode: u8,
        custom_mode: u32,
    },
    ParamRequestRead {
        target_system: u8,
        target_component: u8,
        param_id: String,
        /// -1 requests by name.
        param_index: i16,
    },
    ParamRequestList {
        target_system: u8,
        target_component: u8,
    },
    ParamValue {
        param_id: String,
        param_value: f32,
        param_type: u8,
        param_count: u16,
        param_index: u16,
    },
    ParamSet {
        target_system: u8,
        target_component: u8,
        param_id: String,
        param_value: f32,
        param_type: u8,
    },
    GpsRawInt {
        fix_type: u8,
        lat: i32,
        lon: i32,
        alt: i32,
        eph: u16,
        epv: u16,
        satellites_visible: u8,
    },
    Attitude {
        roll: f32,
        pitch: f32,
        yaw: f32,
        rollspeed: f32,
        pitchspeed: f32,
        yawspeed: f32,
    },
    /// Metres and m/s in the local NED frame.
    LocalPositionNed {
        x: f32,
        y: f32,
        z: f32,
        vx: f32,
        vy: f32,
        vz: f32,
    },
    GlobalPositionInt {
        lat: i32,
        lon: i32,
        alt: i32,
        relative_alt: i32,
        vx: i16,
        vy: i16,
        vz: i16,
        /// `u16::MAX` when unknown.
        hdg: u16,
    },
    /// Channels 1-8 in microseconds, `u16::MAX` when unused.
    RcChannelsRaw {
        port: u8,
        channels: [u16; 8],
        /// `u8::MAX` when unknown.
        rssi: u8,
    },
    MissionSetCurrent {
        target_system: u8,
        target_component: u8,
        seq: u16,
    },
    MissionCurrent {
        seq: u16,
    },
    MissionRequestList {
        target_system: u8,
        target_component: u8,
    },
    MissionCount {
        target_system: u8,
        target_component: u8,
        count: u16,
    },
    MissionClearAll {
        target_system: u8,
        target_component: u8,
    },
    MissionAck {
        target_system: u8,
        target_component: u8,
        result: u8,
    },
    MissionRequestInt {
        target_system: u8,
        target_component: u8,
        seq: u16,
    },
    MissionItemInt {
        target_system: u8,
        target_component: u8,
        item: MissionItem,
    },
    /// Only the first `chancount` entries are meaningful.
    RcChannels {
        chancount: u8,
        channels: [u16; 18],
        rssi: u8,
    },
    VfrHud {
        airspeed: f32,
        groundspeed: f32,
        heading: i16,
        throttle: u16,
        alt: f32,
        climb: f32,
    },
    CommandLong {
        target_system: u8,
        target_component: u8,
        command: u16,
        confirmation: u8,
        params: [f32; 7],
    },
    CommandAck {
        command: u16,
        result: u8,
    },
    /// Position in metres, velocity in m/s, yaw in radians.
    SetPositionTargetLocalNed {
        target_system: u8,
        target_component: u8,
        coordinate_frame: u8,
        /// Set bits mark fields to ignore.
        type_mask: u16,
        position: [f32; 3],
        velocity: [f32; 3],
        acceleration: [f32; 3],
        yaw: f32,
        yaw_rate: f32,
    },
    SetPositionTargetGlobalInt {
        target_system: u8,
        target_component: u8,
        coordinate_frame: u8,
        type_mask: u16,
        lat_int: i32,
        lon_int: i32,
        alt: f32,
        velocity: [f32; 3],
        acceleration: [f32; 3],
        yaw: f32,
        yaw_rate: f32,
    },
    AutopilotVersion {
        /// `MAV_PROTOCOL_CAPABILITY` bits.
        capabilities: u64,
        /// major << 24 | minor << 16 | patch << 8 | release type.
        flight_sw_version: u32,
        middleware_sw_version: u32,
        os_sw_version: u32,
        board_version: u32,
        vendor_id: u16,
        product_id: u16,
        uid: u64,
    },
    /// Direction the wind is coming from (degrees), speeds in m/s.
    Wind {
        direction: f32,
        speed: f32,
        speed_z: f32,
    },
    /// Distance in metres, sensor voltage in volts.
    Rangefinder {
        distance: f32,
        voltage: f32,
    },
    EkfStatusReport {
        flags: u16,
        velocity_variance: f32,
        pos_horiz_variance: f32,
        pos_vert_variance: f32,
        compass_variance: f32,
    },
    HomePosition {
        latitude: i32,
        longitude: i32,
        altitude: i32,
    },
    StatusText {
        severity: u8,
        text: String,
    },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Heartbeat { .. } => MessageKind::Heartbeat,
            Message::SysStatus { .. } => MessageKind::SysStatus,
            Message::SetMode { .. } => MessageKind::SetMode,
            Message::ParamRequestRead { .. } => MessageKind::ParamRequestRead,
            Message::ParamRequestList { .. } => MessageKind::ParamRequestList,
            Message::ParamValue { .. } => MessageKind::ParamValue,
            Message::ParamSet { .. } => MessageKind::ParamSet,
            Message::GpsRawInt { .. } => MessageKind::GpsRawInt,
            Message::Attitude { .. } => MessageKind::Attitude,
            Message::LocalPositionNed { .. } => MessageKind::LocalPositionNed,
            Message::GlobalPositionInt { .. } => MessageKind::GlobalPositionInt,
            Message::RcChannelsRaw { .. } => MessageKind::RcChannelsRaw,
            Message::MissionSetCurrent { .. } => MessageKind::MissionSetCurrent,
            Message::MissionCurrent { .. } => MessageKind::MissionCurrent,
            Message::MissionRequestList { .. } => MessageKind::MissionRequestList,
            Message::MissionCount { .. } => MessageKind::MissionCount,
            Message::MissionClearAll { .. } => MessageKind::MissionClearAll,
            Message::MissionAck { .. } => MessageKind::MissionAck,
            Message::MissionRequestInt { .. } => MessageKind::MissionRequestInt,
            Message::MissionItemInt { .. } => MessageKind::MissionItemInt,
            Message::RcChannels { .. } => MessageKind::RcChannels,
            Message::VfrHud { .. } => MessageKind::VfrHud,
            Message::CommandLong { .. } => MessageKind::CommandLong,
            Message::CommandAck { .. } => MessageKind::CommandAck,
            Message::SetPositionTargetLocalNed { .. } => MessageKind::SetPositionTargetLocalNed,
            Message::SetPositionTargetGlobalInt { .. } => MessageKind::SetPositionTargetGlobalInt,
            Message::AutopilotVersion { .. } => MessageKind::AutopilotVersion,
            Message::Wind { .. } => MessageKind::Wind,
            Message::Rangefinder { .. } => MessageKind::Rangefinder,
            Message::EkfStatusReport { .. } => MessageKind::EkfStatusReport,
            Message::HomePosition { .. } => MessageKind::HomePosition,
            Message::StatusText { .. } => MessageKind::StatusText,
        }
    }

    /// Convenience constructor for `COMMAND_LONG`.
    pub fn command_long(
        target_system: u8,
        target_component: u8,
        command: u16,
        params: [f32; 7],
    ) -> Self {
        Message::CommandLong {
            target_system,
            target_component,
            command,
            confirmation: 0,
            params,
        }
    }

    /// `SET_POSITION_TARGET_LOCAL_NED` commanding a velocity only.
    pub fn velocity_local_ned(north: f32, east: f32, down: f32) -> Self {
        Message::SetPositionTargetLocalNed {
            target_system: 0,
            target_component: 0,
            coordinate_frame: constants::MAV_FRAME_LOCAL_NED,
            type_mask: constants::POSITION_TARGET_TYPEMASK_VELOCITY_ONLY,
            position: [0.0; 3],
            velocity: [north, east, down],
            acceleration: [0.0; 3],
            yaw: 0.0,
            yaw_rate: 0.0,
        }
    }

    /// `SET_POSITION_TARGET_GLOBAL_INT` commanding a velocity only.
    pub fn velocity_global(north: f32, east: f32, down: f32) -> Self {
        Message::SetPositionTargetGlobalInt {
            target_system: 0,
            target_component: 0,
            coordinate_frame: constants::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            type_mask: constants::POSITION_TARGET_TYPEMASK_VELOCITY_ONLY,
            lat_int: 0,
            lon_int: 0,
            alt: 0.0,
            velocity: [north, east, down],
            acceleration: [0.0; 3],
            yaw: 0.0,
            yaw_rate: 0.0,
        }
    }

    /// Rewrite zero target fields to the given target.
    ///
    /// Messages built before the vehicle is known carry `0/0`; the session
    /// fills them in just before encoding.
    pub fn fill_targets(&mut self, system: u8, component: u8) {
        let targets = match self {
            Message::SetMode { target_system, .. } => {
                if *target_system == 0 {
                    *target_system = system;
                }
                return;
            }
            Message::ParamRequestRead {
                target_system,
                target_component,
                ..
            }
            | Message::ParamRequestList {
                target_system,
                target_component,
            }
            | Message::ParamSet {
                target_system,
                target_component,
                ..
            }
            | Message::MissionSetCurrent {
                target_system,
                target_component,
                ..
            }
            | Message::MissionRequestList {
                target_system,
                target_component,
            }
            | Message::MissionCount {
                target_system,
                target_component,
                ..
            }
            | Message::MissionClearAll {
                target_system,
                target_component,
            }
            | Message::MissionAck {
                target_system,
                target_component,
                ..
            }
            | Message::MissionRequestInt {
                target_system,
                target_component,
                ..
            }
            | Message::MissionItemInt {
                target_system,
                target_component,
                ..
            }
            | Message::CommandLong {
                target_system,
                target_component,
                ..
            }
            | Message::SetPositionTargetLocalNed {
                target_system,
                target_component,
                ..
            }
            | Message::SetPositionTargetGlobalInt {
                target_system,
                target_component,
                ..
            } => Some((target_system, target_component)),
            _ => None,
        };
        if let Some((ts, tc)) = targets {
            if *ts == 0 {
                *ts = system;
            }
            if *tc == 0 {
                *tc = component;
            }
        }
    }
}

/// Whether `name` fits in a wire parameter id.
pub fn param_id_is_valid(name: &str) -> bool {
    !name.is_empty() && name.len() <= PARAM_ID_MAX_LEN && name.is_ascii()
}
