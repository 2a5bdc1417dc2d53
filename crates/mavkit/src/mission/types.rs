use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Mission,
    Fence,
    Rally,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionFrame {
    Mission,
    GlobalInt,
    GlobalRelativeAltInt,
    GlobalTerrainAltInt,
    LocalNed,
    Other,
}

impl MissionFrame {
    pub fn is_global_position(self) -> bool {
        matches!(
            self,
            MissionFrame::GlobalInt
                | MissionFrame::GlobalRelativeAltInt
                | MissionFrame::GlobalTerrainAltInt
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionItem {
    pub seq: u16,
    pub command: u16,
    pub frame: MissionFrame,
    pub current: bool,
    pub autocontinue: bool,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: i32,
    pub y: i32,
    pub z: f32,
}

impl MissionItem {
    /// `MAV_CMD_NAV_WAYPOINT` at the given position, relative-altitude frame.
    pub fn waypoint(seq: u16, lat_deg: f64, lon_deg: f64, alt_m: f32) -> Self {
        Self {
            seq,
            command: 16,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: (lat_deg * 1e7) as i32,
            y: (lon_deg * 1e7) as i32,
            z: alt_m,
        }
    }

    /// `MAV_CMD_NAV_TAKEOFF` to the given relative altitude.
    pub fn takeoff(seq: u16, alt_m: f32) -> Self {
        Self {
            seq,
            command: 22,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: 0,
            y: 0,
            z: alt_m,
        }
    }

    /// `MAV_CMD_NAV_LAND` at the given position.
    pub fn land(seq: u16, lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            seq,
            command: 21,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: (lat_deg * 1e7) as i32,
            y: (lon_deg * 1e7) as i32,
            z: 0.0,
        }
    }

    /// `MAV_CMD_NAV_RETURN_TO_LAUNCH`.
    pub fn return_to_launch(seq: u16) -> Self {
        Self {
            seq,
            command: 20,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: 0,
            y: 0,
            z: 0.0,
        }
    }

    /// `MAV_CMD_NAV_LOITER_UNLIM` at the given position and radius.
    pub fn loiter_unlimited(seq: u16, lat_deg: f64, lon_deg: f64, alt_m: f32, radius_m: f32) -> Self {
        Self {
            seq,
            command: 17,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: radius_m,
            param4: f32::NAN,
            x: (lat_deg * 1e7) as i32,
            y: (lon_deg * 1e7) as i32,
            z: alt_m,
        }
    }

    /// `MAV_CMD_NAV_LOITER_TIME` at the given position for `seconds`.
    pub fn loiter_time(
        seq: u16,
        lat_deg: f64,
        lon_deg: f64,
        alt_m: f32,
        seconds: f32,
        radius_m: f32,
    ) -> Self {
        Self {
            seq,
            command: 19,
            frame: MissionFrame::GlobalRelativeAltInt,
            current: false,
            autocontinue: true,
            param1: seconds,
            param2: 0.0,
            param3: radius_m,
            param4: f32::NAN,
            x: (lat_deg * 1e7) as i32,
            y: (lon_deg * 1e7) as i32,
            z: alt_m,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HomePosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f32,
}

impl HomePosition {
    pub fn to_mission_item(&self, seq: u16) -> MissionItem {
        MissionItem {
            seq,
            command: 16,
            frame: MissionFrame::GlobalInt,
            current: false,
            autocontinue: true,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: (self.latitude_deg * 1e7) as i32,
            y: (self.longitude_deg * 1e7) as i32,
            z: self.altitude_m,
        }
    }

    pub fn from_mission_item(item: &MissionItem) -> Option<Self> {
        if item.command == 16 && item.frame == MissionFrame::GlobalInt {
            Some(HomePosition {
                latitude_deg: item.x as f64 / 1e7,
                longitude_deg: item.y as f64 / 1e7,
                altitude_m: item.z,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionPlan {
    pub mission_type: MissionType,
    pub home: Option<HomePosition>,
    pub items: Vec<MissionItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionIssue {
    pub code: String,
    pub message: String,
    pub seq: Option<u16>,
    pub severity: IssueSeverity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waypoint_encodes_lat_lon_in_e7() {
        let item = MissionItem::waypoint(3, 47.3977, 8.5456, 20.0);
        assert_eq!(item.seq, 3);
        assert_eq!(item.command, 16);
        assert_eq!(item.x, 473977000);
        assert_eq!(item.y, 85456000);
        assert_eq!(item.z, 20.0);
    }

    #[test]
    fn takeoff_has_no_position() {
        let item = MissionItem::takeoff(0, 15.0);
        assert_eq!(item.command, 22);
        assert_eq!(item.x, 0);
        assert_eq!(item.y, 0);
        assert_eq!(item.z, 15.0);
    }

    #[test]
    fn loiter_time_carries_seconds_in_param1() {
        let item = MissionItem::loiter_time(5, 1.0, 2.0, 10.0, 30.0, 15.0);
        assert_eq!(item.command, 19);
        assert_eq!(item.param1, 30.0);
        assert_eq!(item.param3, 15.0);
    }

    #[test]
    fn return_to_launch_is_zeroed() {
        let item = MissionItem::return_to_launch(9);
        assert_eq!(item.command, 20);
        assert_eq!(item.x, 0);
        assert_eq!(item.y, 0);
        assert_eq!(item.z, 0.0);
    }
}
