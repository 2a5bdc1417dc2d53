use crate::state::{AutopilotType, FlightMode, VehicleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VehicleClass {
    Copter,
    Plane,
    Rover,
    Unknown,
}

fn vehicle_class(vehicle_type: VehicleType) -> VehicleClass {
    match vehicle_type {
        VehicleType::Quadrotor
        | VehicleType::Hexarotor
        | VehicleType::Octorotor
        | VehicleType::Tricopter
        | VehicleType::Coaxial
        | VehicleType::Helicopter => VehicleClass::Copter,
        VehicleType::FixedWing => VehicleClass::Plane,
        VehicleType::GroundRover => VehicleClass::Rover,
        _ => VehicleClass::Unknown,
    }
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
    (15, "AUTOTUNE"),
    (16, "POSHOLD"),
    (17, "BRAKE"),
    (18, "THROW"),
    (21, "SMART_RTL"),
];

const PLANE_MODES: &[(u32, &str)] = &[
    (0, "MANUAL"),
    (1, "CIRCLE"),
    (2, "STABILIZE"),
    (3, "TRAINING"),
    (4, "ACRO"),
    (5, "FLY_BY_WIRE_A"),
    (6, "FLY_BY_WIRE_B"),
    (7, "CRUISE"),
    (8, "AUTOTUNE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "LOITER"),
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
    (6, "FOLLOW"),
    (7, "SIMPLE"),
    (10, "AUTO"),
    (11, "RTL"),
    (12, "SMART_RTL"),
    (15, "GUIDED"),
];

/// PX4 packs `custom_mode` as `(main_mode << 16) | sub_mode`, unlike
/// ArduPilot's flat mode numbers. Keys here are pre-packed so lookup stays a
/// plain linear scan like the ArduPilot tables.
const PX4_MAIN_MANUAL: u32 = 1;
const PX4_MAIN_ALTCTL: u32 = 2;
const PX4_MAIN_POSCTL: u32 = 3;
const PX4_MAIN_AUTO: u32 = 4;
const PX4_MAIN_ACRO: u32 = 5;
const PX4_MAIN_OFFBOARD: u32 = 6;
const PX4_MAIN_STABILIZED: u32 = 7;
const PX4_MAIN_RATTITUDE: u32 = 8;

const fn px4_pack(main_mode: u32, sub_mode: u32) -> u32 {
    (main_mode << 16) | sub_mode
}

const PX4_MODES: &[(u32, &str)] = &[
    (px4_pack(PX4_MAIN_MANUAL, 0), "MANUAL"),
    (px4_pack(PX4_MAIN_ALTCTL, 0), "ALTCTL"),
    (px4_pack(PX4_MAIN_POSCTL, 0), "POSCTL"),
    (px4_pack(PX4_MAIN_AUTO, 1), "AUTO.READY"),
    (px4_pack(PX4_MAIN_AUTO, 2), "AUTO.TAKEOFF"),
    (px4_pack(PX4_MAIN_AUTO, 3), "AUTO.LOITER"),
    (px4_pack(PX4_MAIN_AUTO, 4), "AUTO.MISSION"),
    (px4_pack(PX4_MAIN_AUTO, 5), "AUTO.RTL"),
    (px4_pack(PX4_MAIN_AUTO, 6), "AUTO.LAND"),
    (px4_pack(PX4_MAIN_AUTO, 8), "AUTO.FOLLOW_TARGET"),
    (px4_pack(PX4_MAIN_ACRO, 0), "ACRO"),
    (px4_pack(PX4_MAIN_OFFBOARD, 0), "OFFBOARD"),
    (px4_pack(PX4_MAIN_STABILIZED, 0), "STABILIZED"),
    (px4_pack(PX4_MAIN_RATTITUDE, 0), "RATTITUDE"),
];

fn mode_table(autopilot: AutopilotType, vehicle_type: VehicleType) -> &'static [(u32, &'static str)] {
    match autopilot {
        AutopilotType::ArduPilotMega => match vehicle_class(vehicle_type) {
            VehicleClass::Copter | VehicleClass::Unknown => COPTER_MODES,
            VehicleClass::Plane => PLANE_MODES,
            VehicleClass::Rover => ROVER_MODES,
        },
        AutopilotType::Px4 => PX4_MODES,
        _ => &[],
    }
}

pub(crate) fn mode_name(autopilot: AutopilotType, vehicle_type: VehicleType, custom_mode: u32) -> String {
    if autopilot != AutopilotType::ArduPilotMega && autopilot != AutopilotType::Px4 {
        return format!("MODE({custom_mode})");
    }
    let table = mode_table(autopilot, vehicle_type);
    for &(num, name) in table {
        if num == custom_mode {
            return name.to_string();
        }
    }
    format!("UNKNOWN({custom_mode})")
}

pub(crate) fn mode_number(autopilot: AutopilotType, vehicle_type: VehicleType, name: &str) -> Option<u32> {
    let table = mode_table(autopilot, vehicle_type);
    let upper = name.to_uppercase();
    for &(num, mode_name) in table {
        if mode_name == upper {
            return Some(num);
        }
    }
    None
}

pub(crate) fn available_modes(autopilot: AutopilotType, vehicle_type: VehicleType) -> Vec<FlightMode> {
    mode_table(autopilot, vehicle_type)
        .iter()
        .map(|&(num, name)| FlightMode {
            custom_mode: num,
            name: name.to_string(),
        })
        .collect()
}

/// Unpacks a PX4 `custom_mode` into `(main_mode, sub_mode)`.
pub(crate) fn px4_unpack(custom_mode: u32) -> (u32, u32) {
    (custom_mode >> 16, custom_mode & 0xFFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copter_guided_name() {
        assert_eq!(
            mode_name(AutopilotType::ArduPilotMega, VehicleType::Quadrotor, 4),
            "GUIDED"
        );
    }

    #[test]
    fn copter_guided_number_case_insensitive() {
        assert_eq!(
            mode_number(AutopilotType::ArduPilotMega, VehicleType::Quadrotor, "guided"),
            Some(4)
        );
    }

    #[test]
    fn plane_rtl_name() {
        assert_eq!(
            mode_name(AutopilotType::ArduPilotMega, VehicleType::FixedWing, 11),
            "RTL"
        );
    }

    #[test]
    fn unknown_mode_number() {
        assert_eq!(
            mode_name(AutopilotType::ArduPilotMega, VehicleType::Quadrotor, 999),
            "UNKNOWN(999)"
        );
    }

    #[test]
    fn available_modes_copter_length() {
        let modes = available_modes(AutopilotType::ArduPilotMega, VehicleType::Quadrotor);
        assert_eq!(modes.len(), COPTER_MODES.len());
    }

    #[test]
    fn non_ardupilot_returns_mode_n() {
        assert_eq!(
            mode_name(AutopilotType::Generic, VehicleType::Quadrotor, 4),
            "MODE(4)"
        );
    }

    #[test]
    fn non_ardupilot_available_modes_empty() {
        let modes = available_modes(AutopilotType::Generic, VehicleType::Quadrotor);
        assert!(modes.is_empty());
    }

    #[test]
    fn rover_guided_number() {
        assert_eq!(
            mode_number(AutopilotType::ArduPilotMega, VehicleType::GroundRover, "GUIDED"),
            Some(15)
        );
    }

    #[test]
    fn px4_auto_mission_name() {
        let packed = px4_pack(PX4_MAIN_AUTO, 4);
        assert_eq!(
            mode_name(AutopilotType::Px4, VehicleType::Quadrotor, packed),
            "AUTO.MISSION"
        );
    }

    #[test]
    fn px4_unpack_round_trips() {
        let packed = px4_pack(PX4_MAIN_AUTO, 6);
        assert_eq!(px4_unpack(packed), (PX4_MAIN_AUTO, 6));
    }

    #[test]
    fn px4_offboard_number() {
        assert_eq!(
            mode_number(AutopilotType::Px4, VehicleType::Quadrotor, "offboard"),
            Some(px4_pack(PX4_MAIN_OFFBOARD, 0))
        );
    }
}
