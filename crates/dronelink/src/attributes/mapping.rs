// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message -> attribute updates.

use super::names;
use super::value::{
    Attitude, AttributeValue, Battery, Capabilities, GpsInfo, LocalLocation, Location,
    Rangefinder, RcChannels, Velocity, Version, Wind,
};
use crate::message::constants::{
    system_status_name, EKF_ATTITUDE, EKF_VELOCITY_HORIZ, EKF_VELOCITY_VERT,
    MAV_MODE_FLAG_SAFETY_ARMED, NON_VEHICLE_TYPES, RC_CHANNEL_UNUSED, RSSI_UNKNOWN,
};
use crate::message::modes::mode_display;
use crate::message::Message;
use std::time::Instant;

/// EKF flags that must all be set for `ekf_ok`.
pub const EKF_REQUIRED_FLAGS: u16 = EKF_ATTITUDE | EKF_VELOCITY_HORIZ | EKF_VELOCITY_VERT;

/// Whether a heartbeat of `mav_type` describes a vehicle.
pub fn is_vehicle_type(mav_type: u8) -> bool {
    !NON_VEHICLE_TYPES.contains(&mav_type)
}

/// `u16::MAX` is the wire's "unknown" marker for several fields.
fn known(value: u16) -> Option<u16> {
    (value != u16::MAX).then_some(value)
}

fn rc_channels(values: &[u16], rssi: u8) -> AttributeValue {
    AttributeValue::Channels(RcChannels {
        values: values
            .iter()
            .map(|&v| (v != RC_CHANNEL_UNUSED).then_some(v))
            .collect(),
        rssi: (rssi != RSSI_UNKNOWN).then_some(rssi),
    })
}

/// Combine an update with the value it replaces.
///
/// `RC_CHANNELS_RAW` covers eight channels and `RC_CHANNELS` up to
/// eighteen; each report only overwrites the slots it carries.
pub fn merge_update(previous: Option<&AttributeValue>, update: AttributeValue) -> AttributeValue {
    match (previous, update) {
        (Some(AttributeValue::Channels(old)), AttributeValue::Channels(new)) => {
            AttributeValue::Channels(new.merged_onto(old))
        }
        (_, update) => update,
    }
}

/// Attribute updates produced by one message, in application order.
pub fn attribute_updates(message: &Message) -> Vec<(&'static str, AttributeValue)> {
    match message {
        Message::Heartbeat {
            mav_type,
            autopilot,
            base_mode,
            custom_mode,
            system_status,
        } => {
            if !is_vehicle_type(*mav_type) {
                return Vec::new();
            }
            vec![
                (
                    names::MODE,
                    AttributeValue::Text(mode_display(*mav_type, *custom_mode)),
                ),
                (
                    names::ARMED,
                    AttributeValue::Bool(base_mode & MAV_MODE_FLAG_SAFETY_ARMED != 0),
                ),
                (
                    names::SYSTEM_STATUS,
                    AttributeValue::Text(system_status_name(*system_status).to_string()),
                ),
                (names::LAST_HEARTBEAT, AttributeValue::Timestamp(Instant::now())),
                (names::VEHICLE_TYPE, AttributeValue::Int(i64::from(*mav_type))),
                (names::AUTOPILOT, AttributeValue::Int(i64::from(*autopilot))),
            ]
        }

        Message::SysStatus {
            voltage_battery,
            current_battery,
            battery_remaining,
        } => vec![(
            names::BATTERY,
            AttributeValue::Battery(Battery {
                voltage: f32::from(*voltage_battery) / 1000.0,
                current: (*current_battery != -1).then(|| f32::from(*current_battery) / 100.0),
                level: u8::try_from(*battery_remaining).ok(),
            }),
        )],

        Message::GpsRawInt {
            fix_type,
            eph,
            epv,
            satellites_visible,
            ..
        } => vec![(
            names::GPS,
            AttributeValue::Gps(GpsInfo {
                fix_type: *fix_type,
                satellites_visible: *satellites_visible,
                eph: known(*eph),
                epv: known(*epv),
            }),
        )],

        Message::Attitude {
            roll, pitch, yaw, ..
        } => vec![(
            names::ATTITUDE,
            AttributeValue::Attitude(Attitude {
                roll: *roll,
                pitch: *pitch,
                yaw: *yaw,
            }),
        )],

        Message::GlobalPositionInt {
            lat,
            lon,
            alt,
            relative_alt,
            vx,
            vy,
            vz,
            hdg,
        } => {
            let mut updates = vec![
                (
                    names::LOCATION,
                    AttributeValue::Location(Location {
                        lat: f64::from(*lat) / 1e7,
                        lon: f64::from(*lon) / 1e7,
                        alt: f64::from(*alt) / 1000.0,
                        relative_alt: Some(f64::from(*relative_alt) / 1000.0),
                    }),
                ),
                (
                    names::VELOCITY,
                    AttributeValue::Velocity(Velocity {
                        north: f32::from(*vx) / 100.0,
                        east: f32::from(*vy) / 100.0,
                        down: f32::from(*vz) / 100.0,
                    }),
                ),
            ];
            if let Some(hdg) = known(*hdg) {
                updates.push((names::HEADING, AttributeValue::Int(i64::from(hdg / 100))));
            }
            updates
        }

        Message::VfrHud {
            airspeed,
            groundspeed,
            heading,
            ..
        } => {
            let mut updates = vec![
                (names::AIRSPEED, AttributeValue::Float(f64::from(*airspeed))),
                (
                    names::GROUNDSPEED,
                    AttributeValue::Float(f64::from(*groundspeed)),
                ),
            ];
            // Out-of-range headings (negative, or the u16 marker read as i16)
            // mean unknown.
            if (0..360).contains(heading) {
                updates.push((names::HEADING, AttributeValue::Int(i64::from(*heading))));
            }
            updates
        }

        Message::LocalPositionNed { x, y, z, .. } => vec![(
            names::LOCAL_LOCATION,
            AttributeValue::LocalLocation(LocalLocation {
                north: *x,
                east: *y,
                down: *z,
            }),
        )],

        Message::RcChannelsRaw { channels, rssi, .. } => {
            vec![(names::CHANNELS, rc_channels(channels, *rssi))]
        }

        Message::RcChannels {
            chancount,
            channels,
            rssi,
        } => {
            let count = usize::from(*chancount).min(channels.len());
            vec![(names::CHANNELS, rc_channels(&channels[..count], *rssi))]
        }

        Message::AutopilotVersion {
            capabilities,
            flight_sw_version,
            ..
        } => vec![
            (
                names::VERSION,
                AttributeValue::Version(Version::new(*flight_sw_version)),
            ),
            (
                names::CAPABILITIES,
                AttributeValue::Capabilities(Capabilities {
                    bits: *capabilities,
                }),
            ),
        ],

        Message::Wind {
            direction,
            speed,
            speed_z,
        } => vec![(
            names::WIND,
            AttributeValue::Wind(Wind {
                direction: *direction,
                speed: *speed,
                speed_z: *speed_z,
            }),
        )],

        Message::Rangefinder { distance, voltage } => vec![(
            names::RANGEFINDER,
            AttributeValue::Rangefinder(Rangefinder {
                distance: *distance,
                voltage: *voltage,
            }),
        )],

        Message::EkfStatusReport { flags, .. } => vec![(
            names::EKF_OK,
            AttributeValue::Bool(flags & EKF_REQUIRED_FLAGS == EKF_REQUIRED_FLAGS),
        )],

        Message::HomePosition {
            latitude,
            longitude,
            altitude,
        } => vec![(
            names::HOME_LOCATION,
            AttributeValue::Location(Location::new(
                f64::from(*latitude) / 1e7,
                f64::from(*longitude) / 1e7,
                f64::from(*altitude) / 1000.0,
            )),
        )],

        Message::MissionCurrent { seq } => {
            vec![(names::NEXT_WAYPOINT, AttributeValue::Int(i64::from(*seq)))]
        }

        Message::ParamValue { param_count, .. } => vec![(
            names::PARAMETERS,
            AttributeValue::Int(i64::from(*param_count)),
        )],

        Message::StatusText { text, .. } => {
            vec![(names::STATUS_TEXT, AttributeValue::Text(text.clone()))]
        }

        _ => Vec::new(),
    }
}
