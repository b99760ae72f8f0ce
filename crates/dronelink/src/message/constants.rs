// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol enumerations used by the session (subset of the common dialect).

// MAV_TYPE
pub const MAV_TYPE_GENERIC: u8 = 0;
pub const MAV_TYPE_FIXED_WING: u8 = 1;
pub const MAV_TYPE_QUADROTOR: u8 = 2;
pub const MAV_TYPE_COAXIAL: u8 = 3;
pub const MAV_TYPE_HELICOPTER: u8 = 4;
pub const MAV_TYPE_GCS: u8 = 6;
pub const MAV_TYPE_GROUND_ROVER: u8 = 10;
pub const MAV_TYPE_SURFACE_BOAT: u8 = 11;
pub const MAV_TYPE_HEXAROTOR: u8 = 13;
pub const MAV_TYPE_OCTOROTOR: u8 = 14;
pub const MAV_TYPE_TRICOPTER: u8 = 15;
pub const MAV_TYPE_ONBOARD_CONTROLLER: u8 = 18;
pub const MAV_TYPE_VTOL_TAILSITTER_DUOROTOR: u8 = 19;
pub const MAV_TYPE_VTOL_RESERVED5: u8 = 25;
pub const MAV_TYPE_GIMBAL: u8 = 26;
pub const MAV_TYPE_ADSB: u8 = 27;
pub const MAV_TYPE_DODECAROTOR: u8 = 29;

/// Heartbeat sources that never describe the vehicle itself.
pub const NON_VEHICLE_TYPES: &[u8] = &[
    MAV_TYPE_GCS,
    MAV_TYPE_GIMBAL,
    MAV_TYPE_ADSB,
    MAV_TYPE_ONBOARD_CONTROLLER,
];

// MAV_AUTOPILOT
pub const MAV_AUTOPILOT_GENERIC: u8 = 0;
pub const MAV_AUTOPILOT_ARDUPILOTMEGA: u8 = 3;
pub const MAV_AUTOPILOT_INVALID: u8 = 8;
pub const MAV_AUTOPILOT_PX4: u8 = 12;

// MAV_MODE_FLAG
pub const MAV_MODE_FLAG_CUSTOM_MODE_ENABLED: u8 = 1;
pub const MAV_MODE_FLAG_SAFETY_ARMED: u8 = 128;

// MAV_STATE
pub const MAV_STATE_UNINIT: u8 = 0;
pub const MAV_STATE_BOOT: u8 = 1;
pub const MAV_STATE_CALIBRATING: u8 = 2;
pub const MAV_STATE_STANDBY: u8 = 3;
pub const MAV_STATE_ACTIVE: u8 = 4;
pub const MAV_STATE_CRITICAL: u8 = 5;
pub const MAV_STATE_EMERGENCY: u8 = 6;
pub const MAV_STATE_POWEROFF: u8 = 7;

/// Display name of a `MAV_STATE` value.
pub fn system_status_name(state: u8) -> &'static str {
    match state {
        MAV_STATE_UNINIT => "UNINIT",
        MAV_STATE_BOOT => "BOOT",
        MAV_STATE_CALIBRATING => "CALIBRATING",
        MAV_STATE_STANDBY => "STANDBY",
        MAV_STATE_ACTIVE => "ACTIVE",
        MAV_STATE_CRITICAL => "CRITICAL",
        MAV_STATE_EMERGENCY => "EMERGENCY",
        MAV_STATE_POWEROFF => "POWEROFF",
        _ => "UNKNOWN",
    }
}

// MAV_CMD
pub const MAV_CMD_NAV_WAYPOINT: u16 = 16;
pub const MAV_CMD_NAV_LOITER_UNLIM: u16 = 17;
pub const MAV_CMD_NAV_LOITER_TIME: u16 = 19;
pub const MAV_CMD_NAV_RETURN_TO_LAUNCH: u16 = 20;
pub const MAV_CMD_NAV_LAND: u16 = 21;
pub const MAV_CMD_NAV_TAKEOFF: u16 = 22;
pub const MAV_CMD_CONDITION_YAW: u16 = 115;
pub const MAV_CMD_DO_CHANGE_SPEED: u16 = 178;
pub const MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN: u16 = 246;
pub const MAV_CMD_COMPONENT_ARM_DISARM: u16 = 400;
pub const MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES: u16 = 520;

// MAV_RESULT
pub const MAV_RESULT_ACCEPTED: u8 = 0;
pub const MAV_RESULT_TEMPORARILY_REJECTED: u8 = 1;
pub const MAV_RESULT_DENIED: u8 = 2;
pub const MAV_RESULT_UNSUPPORTED: u8 = 3;
pub const MAV_RESULT_FAILED: u8 = 4;
pub const MAV_RESULT_IN_PROGRESS: u8 = 5;

// MAV_MISSION_RESULT
pub const MAV_MISSION_ACCEPTED: u8 = 0;
pub const MAV_MISSION_ERROR: u8 = 1;
pub const MAV_MISSION_INVALID_SEQUENCE: u8 = 13;

// MAV_FRAME
pub const MAV_FRAME_GLOBAL: u8 = 0;
pub const MAV_FRAME_LOCAL_NED: u8 = 1;
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT: u8 = 3;
pub const MAV_FRAME_GLOBAL_INT: u8 = 5;
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT_INT: u8 = 6;

// POSITION_TARGET_TYPEMASK: ignore position, acceleration, yaw and yaw rate
pub const POSITION_TARGET_TYPEMASK_VELOCITY_ONLY: u16 = 0b0000_1111_1100_0111;

// MAV_PROTOCOL_CAPABILITY
pub const MAV_PROTOCOL_CAPABILITY_MISSION_FLOAT: u64 = 1 << 0;
pub const MAV_PROTOCOL_CAPABILITY_PARAM_FLOAT: u64 = 1 << 1;
pub const MAV_PROTOCOL_CAPABILITY_MISSION_INT: u64 = 1 << 2;
pub const MAV_PROTOCOL_CAPABILITY_COMMAND_INT: u64 = 1 << 3;
pub const MAV_PROTOCOL_CAPABILITY_PARAM_UNION: u64 = 1 << 4;
pub const MAV_PROTOCOL_CAPABILITY_FTP: u64 = 1 << 5;
pub const MAV_PROTOCOL_CAPABILITY_SET_ATTITUDE_TARGET: u64 = 1 << 6;
pub const MAV_PROTOCOL_CAPABILITY_SET_POSITION_TARGET_LOCAL_NED: u64 = 1 << 7;
pub const MAV_PROTOCOL_CAPABILITY_SET_POSITION_TARGET_GLOBAL_INT: u64 = 1 << 8;
pub const MAV_PROTOCOL_CAPABILITY_TERRAIN: u64 = 1 << 9;
pub const MAV_PROTOCOL_CAPABILITY_SET_ACTUATOR_TARGET: u64 = 1 << 10;
pub const MAV_PROTOCOL_CAPABILITY_FLIGHT_TERMINATION: u64 = 1 << 11;
pub const MAV_PROTOCOL_CAPABILITY_COMPASS_CALIBRATION: u64 = 1 << 12;

/// RC channel value meaning "not available".
pub const RC_CHANNEL_UNUSED: u16 = u16::MAX;

/// RSSI value meaning "unknown".
pub const RSSI_UNKNOWN: u8 = u8::MAX;

// MAV_PARAM_TYPE
pub const MAV_PARAM_TYPE_INT8: u8 = 2;
pub const MAV_PARAM_TYPE_INT32: u8 = 6;
pub const MAV_PARAM_TYPE_REAL32: u8 = 9;

// EKF_STATUS_FLAGS
pub const EKF_ATTITUDE: u16 = 0x01;
pub const EKF_VELOCITY_HORIZ: u16 = 0x02;
pub const EKF_VELOCITY_VERT: u16 = 0x04;
pub const EKF_POS_HORIZ_ABS: u16 = 0x10;
pub const EKF_CONST_POS_MODE: u16 = 0x80;
pub const EKF_PRED_POS_HORIZ_ABS: u16 = 0x200;

// MAV_SEVERITY
pub const MAV_SEVERITY_INFO: u8 = 6;
