// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ArduPilot flight-mode tables.
//!
//! The custom mode number in `HEARTBEAT` means different things per vehicle
//! family; [`VehicleClass`] picks the table from `MAV_TYPE`.

use super::constants::*;

/// Vehicle family that selects a mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    Copter,
    Plane,
    Rover,
}

const COPTER_MODES: &[(u32, &str)] = &[
    (0, "STABILIZE"),
    (1, "ACRO"),
    (2, "ALT_HOLD"),
    (3, "AUTO"),
    (4, "GUIDED"),
    (5, "LOITER"),
    (6, "RTL"),
    (7, "CIRCLE"),
    (9, "LAND"),
    (11, "DRIFT"),
    (13, "SPORT"),
    (14, "FLIP"),
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (19, "AVOID_ADSB"),
    (20, "GUIDED_NOGPS"),
    (21, "SMART_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FBWA"),
    (6, "FBWB"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
    (14, "AVOID_ADSB"),
    (15, "GUIDED"),
    (17, "QSTABILIZE"),
    (18, "QHOVER"),
    (19, "QLOITER"),
    (20, "QLAND"),
    (21, "QRTL"),
];

const ROVER_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "ACRO"),
    (3, "STEERING"),
    (4, "HOLD"),
    (5, "LOITER"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
    (16, "INITIALISING"),
];

impl VehicleClass {
    /// Map a `MAV_TYPE` to its mode family, `None` for non-vehicles and
    /// unsupported frames.
    pub fn from_mav_type(mav_type: u8) -> Option<Self> {
        match mav_type {
            MAV_TYPE_QUADROTOR | MAV_TYPE_COAXIAL | MAV_TYPE_HELICOPTER | MAV_TYPE_HEXAROTOR
            | MAV_TYPE_OCTOROTOR | MAV_TYPE_TRICOPTER | MAV_TYPE_DODECAROTOR => Some(Self::Copter),
            MAV_TYPE_FIXED_WING => Some(Self::Plane),
            t if (MAV_TYPE_VTOL_TAILSITTER_DUOROTOR..=MAV_TYPE_VTOL_RESERVED5).contains(&t) => {
                Some(Self::Plane)
            }
            MAV_TYPE_GROUND_ROVER | MAV_TYPE_SURFACE_BOAT => Some(Self::Rover),
            _ => None,
        }
    }

    fn table(self) -> &'static [(u32, &'static str)] {
        match self {
            Self::Copter => COPTER_MODES,
            Self::Plane => PLANE_MODES,
            Self::Rover => ROVER_MODES,
        }
    }

    /// Mode name for a custom mode number.
    pub fn mode_name(self, custom_mode: u32) -> Option<&'static str> {
        self.table()
            .iter()
            .find(|(n, _)| *n == custom_mode)
            .map(|(_, name)| *name)
    }

    /// Custom mode number for a (case-insensitive) mode name.
    pub fn mode_number(self, name: &str) -> Option<u32> {
        self.table()
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(num, _)| *num)
    }

    /// All mode names of this family.
    pub fn mode_names(self) -> impl Iterator<Item = &'static str> {
        self.table().iter().map(|(_, name)| *name)
    }
}

/// Display name for a heartbeat's mode; unknown numbers render as `MODE(n)`.
pub fn mode_display(mav_type: u8, custom_mode: u32) -> String {
    VehicleClass::from_mav_type(mav_type)
        .and_then(|class| class.mode_name(custom_mode))
        .map_or_else(|| format!("MODE({})", custom_mode), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copter_lookup_both_ways() {
        let class = VehicleClass::from_mav_type(MAV_TYPE_QUADROTOR).expect("copter");
        assert_eq!(class, VehicleClass::Copter);
        assert_eq!(class.mode_name(4), Some("GUIDED"));
        assert_eq!(class.mode_number("guided"), Some(4));
        assert_eq!(class.mode_number("FBWA"), None);
    }

    #[test]
    fn test_same_number_differs_per_family() {
        assert_eq!(mode_display(MAV_TYPE_QUADROTOR, 10), "MODE(10)");
        assert_eq!(mode_display(MAV_TYPE_FIXED_WING, 10), "AUTO");
        assert_eq!(mode_display(MAV_TYPE_GROUND_ROVER, 4), "HOLD");
    }

    #[test]
    fn test_non_vehicle_has_no_class() {
        assert_eq!(VehicleClass::from_mav_type(MAV_TYPE_GCS), None);
        assert_eq!(mode_display(MAV_TYPE_GCS, 0), "MODE(0)");
    }
}
