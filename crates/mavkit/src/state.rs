use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub system_id: u8,
    pub component_id: u8,
    pub armed: bool,
    pub custom_mode: u32,
    pub mode_name: String,
    pub system_status: SystemStatus,
    pub vehicle_type: VehicleType,
    pub autopilot: AutopilotType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub altitude_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub heading_deg: Option<f64>,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub battery: Battery,
    pub gps: GpsInfo,
}

/// `BATTERY_STATUS`/`SYS_STATUS` view. `-1` wire sentinels become `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub voltage_v: Option<f32>,
    pub current_a: Option<f32>,
    pub level_pct: Option<i8>,
}

impl Battery {
    pub fn is_low(&self) -> bool {
        self.level_pct.is_some_and(|level| level < 20)
    }

    pub fn is_critical(&self) -> bool {
        self.level_pct.is_some_and(|level| level < 10)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsInfo {
    pub eph: Option<f32>,
    pub epv: Option<f32>,
    pub fix_type: GpsFixType,
    pub satellites_visible: Option<u8>,
}

impl GpsInfo {
    pub fn has_fix(&self) -> bool {
        self.fix_type.as_raw() >= 2
    }

    pub fn has_3d_fix(&self) -> bool {
        self.fix_type.as_raw() >= 3
    }
}

/// Attitude in radians, straight off `ATTITUDE` with no cache gating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// WGS84, MSL. `alt` stays `None` until a `GLOBAL_POSITION_INT` with a
/// non-zero raw `alt` field is observed (barometer boot-noise gate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationGlobal {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: Option<f64>,
}

/// WGS84, altitude relative to home.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationGlobalRelative {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

/// North-East-Down, relative to the EKF origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationLocal {
    pub north_m: f32,
    pub east_m: f32,
    pub down_m: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EkfStatus {
    pub velocity_variance: f32,
    pub pos_horiz_variance: f32,
    pub pos_vert_variance: f32,
    pub compass_variance: f32,
    pub terrain_alt_variance: f32,
    pub flags: u16,
}

impl EkfStatus {
    /// The three `EKF_*_CONST_POS_MODE`/attitude/velocity/horiz-pos flags
    /// being simultaneously set is the autopilot's own "estimator healthy"
    /// signal.
    pub fn is_ok(&self) -> bool {
        (self.flags & 0x07) == 0x07
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    #[default]
    Dev,
    Alpha,
    Beta,
    Rc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleVersion {
    pub raw: u32,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub release: u8,
    pub capabilities: Capabilities,
}

impl VehicleVersion {
    pub(crate) fn from_raw(raw: u32, capability_bits: u64) -> Self {
        let bytes = raw.to_le_bytes();
        Self {
            raw,
            patch: bytes[1],
            minor: bytes[2],
            major: bytes[3],
            release: bytes[0],
            capabilities: Capabilities::from_bits(capability_bits),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.release == 255
    }

    pub fn release_type(&self) -> ReleaseType {
        match self.release >> 6 {
            1 => ReleaseType::Alpha,
            2 => ReleaseType::Beta,
            3 => ReleaseType::Rc,
            _ => ReleaseType::Dev,
        }
    }
}

/// The 13 named booleans in bits 0..12 of `AUTOPILOT_VERSION.capabilities`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub mission_float: bool,
    pub param_float: bool,
    pub mission_int: bool,
    pub command_int: bool,
    pub param_union: bool,
    pub ftp: bool,
    pub set_attitude_target: bool,
    pub set_position_target_local_ned: bool,
    pub set_position_target_global_int: bool,
    pub terrain: bool,
    pub set_actuator_target: bool,
    pub flight_termination: bool,
    pub compass_calibration: bool,
}

impl Capabilities {
    pub(crate) fn from_bits(bits: u64) -> Self {
        Self {
            mission_float: bits & (1 << 0) != 0,
            param_float: bits & (1 << 1) != 0,
            mission_int: bits & (1 << 2) != 0,
            command_int: bits & (1 << 3) != 0,
            param_union: bits & (1 << 4) != 0,
            ftp: bits & (1 << 5) != 0,
            set_attitude_target: bits & (1 << 6) != 0,
            set_position_target_local_ned: bits & (1 << 7) != 0,
            set_position_target_global_int: bits & (1 << 8) != 0,
            terrain: bits & (1 << 9) != 0,
            set_actuator_target: bits & (1 << 10) != 0,
            flight_termination: bits & (1 << 11) != 0,
            compass_calibration: bits & (1 << 12) != 0,
        }
    }
}

/// `MOUNT_STATUS`/`MOUNT_ORIENTATION` projection, degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MountAttitude {
    pub pitch_deg: f32,
    pub roll_deg: f32,
    pub yaw_deg: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangefinderReading {
    pub distance_m: f32,
    pub voltage: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub direction_deg: f32,
    pub speed_mps: f32,
    pub speed_z_mps: f32,
}

/// Read-only table of current RC channel PWM values. `RC_CHANNELS_RAW`
/// populates channels 1..8; `RC_CHANNELS` populates 1..18 and supersedes it.
/// `65535` on the wire means "no signal on this channel" and is absent here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelTable {
    pub channels: [Option<u16>; 18],
    pub rssi: Option<u8>,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self {
            channels: [None; 18],
            rssi: None,
        }
    }
}

impl ChannelTable {
    pub fn get(&self, channel_number: usize) -> Option<u16> {
        if channel_number == 0 || channel_number > self.channels.len() {
            return None;
        }
        self.channels[channel_number - 1]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionState {
    pub current_seq: u16,
    pub total_items: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

impl Default for LinkState {
    fn default() -> Self {
        LinkState::Connecting
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub system_id: u8,
    pub component_id: u8,
    pub autopilot: AutopilotType,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightMode {
    pub custom_mode: u32,
    pub name: String,
}

// --- Simple enums mapping from MAVLink values ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    #[default]
    Unknown,
    Boot,
    Calibrating,
    Standby,
    Active,
    Critical,
    Emergency,
    Poweroff,
}

impl SystemStatus {
    /// `STANDBY` and `ACTIVE` are the only states in which the vehicle will
    /// accept and act on guided commands.
    pub fn is_ready(self) -> bool {
        matches!(self, SystemStatus::Standby | SystemStatus::Active)
    }

    pub(crate) fn from_mav(status: mavlink::common::MavState) -> Self {
        use mavlink::common::MavState;
        match status {
            MavState::MAV_STATE_BOOT => SystemStatus::Boot,
            MavState::MAV_STATE_CALIBRATING => SystemStatus::Calibrating,
            MavState::MAV_STATE_STANDBY => SystemStatus::Standby,
            MavState::MAV_STATE_ACTIVE => SystemStatus::Active,
            MavState::MAV_STATE_CRITICAL => SystemStatus::Critical,
            MavState::MAV_STATE_EMERGENCY => SystemStatus::Emergency,
            MavState::MAV_STATE_POWEROFF => SystemStatus::Poweroff,
            _ => SystemStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    #[default]
    Unknown,
    FixedWing,
    Quadrotor,
    Hexarotor,
    Octorotor,
    Tricopter,
    Helicopter,
    Coaxial,
    GroundRover,
    Generic,
    Gcs,
    Gimbal,
    Adsb,
    OnboardController,
}

impl VehicleType {
    /// Non-vehicle heartbeat sources the connection-liveness and mode
    /// projection must ignore: other GCSes, gimbals, ADS-B receivers, and
    /// onboard companion computers all emit `HEARTBEAT` too.
    pub fn is_vehicle(self) -> bool {
        !matches!(
            self,
            VehicleType::Gcs | VehicleType::Gimbal | VehicleType::Adsb | VehicleType::OnboardController
        )
    }

    pub(crate) fn from_mav(mav_type: mavlink::common::MavType) -> Self {
        use mavlink::common::MavType;
        match mav_type {
            MavType::MAV_TYPE_FIXED_WING => VehicleType::FixedWing,
            MavType::MAV_TYPE_QUADROTOR => VehicleType::Quadrotor,
            MavType::MAV_TYPE_HEXAROTOR => VehicleType::Hexarotor,
            MavType::MAV_TYPE_OCTOROTOR => VehicleType::Octorotor,
            MavType::MAV_TYPE_TRICOPTER => VehicleType::Tricopter,
            MavType::MAV_TYPE_HELICOPTER => VehicleType::Helicopter,
            MavType::MAV_TYPE_COAXIAL => VehicleType::Coaxial,
            MavType::MAV_TYPE_GROUND_ROVER => VehicleType::GroundRover,
            MavType::MAV_TYPE_GENERIC => VehicleType::Generic,
            MavType::MAV_TYPE_GCS => VehicleType::Gcs,
            MavType::MAV_TYPE_GIMBAL => VehicleType::Gimbal,
            MavType::MAV_TYPE_ADSB => VehicleType::Adsb,
            MavType::MAV_TYPE_ONBOARD_CONTROLLER => VehicleType::OnboardController,
            _ => VehicleType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotType {
    #[default]
    Unknown,
    Generic,
    ArduPilotMega,
    Px4,
}

impl AutopilotType {
    pub(crate) fn from_mav(autopilot: mavlink::common::MavAutopilot) -> Self {
        use mavlink::common::MavAutopilot;
        match autopilot {
            MavAutopilot::MAV_AUTOPILOT_GENERIC => AutopilotType::Generic,
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA => AutopilotType::ArduPilotMega,
            MavAutopilot::MAV_AUTOPILOT_PX4 => AutopilotType::Px4,
            _ => AutopilotType::Unknown,
        }
    }

    #[allow(dead_code)]
    pub(crate) fn to_mav(self) -> mavlink::common::MavAutopilot {
        use mavlink::common::MavAutopilot;
        match self {
            AutopilotType::Generic => MavAutopilot::MAV_AUTOPILOT_GENERIC,
            AutopilotType::ArduPilotMega => MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            AutopilotType::Px4 => MavAutopilot::MAV_AUTOPILOT_PX4,
            AutopilotType::Unknown => MavAutopilot::MAV_AUTOPILOT_GENERIC,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsFixType {
    #[default]
    NoFix,
    Fix2d,
    Fix3d,
    Dgps,
    RtkFloat,
    RtkFixed,
}

impl GpsFixType {
    pub(crate) fn as_raw(self) -> u8 {
        match self {
            GpsFixType::NoFix => 0,
            GpsFixType::Fix2d => 2,
            GpsFixType::Fix3d => 3,
            GpsFixType::Dgps => 4,
            GpsFixType::RtkFloat => 5,
            GpsFixType::RtkFixed => 6,
        }
    }

    pub(crate) fn from_raw(fix_type: u8) -> Self {
        match fix_type {
            2 => GpsFixType::Fix2d,
            3 => GpsFixType::Fix3d,
            4 => GpsFixType::Dgps,
            5 => GpsFixType::RtkFloat,
            6 => GpsFixType::RtkFixed,
            _ => GpsFixType::NoFix,
        }
    }
}

/// Fixed 8-slot RC override table. Index `i` holds the PWM override for
/// channel `i + 1`; `0` means "no override on this channel" both as the
/// wire value and the cleared-slot sentinel.
pub type ChannelOverrides = [u16; 8];

/// Internal state for watch channels (writer side).
pub(crate) struct StateWriters {
    pub vehicle_state: tokio::sync::watch::Sender<VehicleState>,
    pub identity: tokio::sync::watch::Sender<Option<VehicleIdentity>>,
    pub telemetry: tokio::sync::watch::Sender<Telemetry>,
    pub attitude: tokio::sync::watch::Sender<Attitude>,
    pub global_frame: tokio::sync::watch::Sender<LocationGlobal>,
    pub global_relative_frame: tokio::sync::watch::Sender<LocationGlobalRelative>,
    pub local_frame: tokio::sync::watch::Sender<LocationLocal>,
    pub ekf_status: tokio::sync::watch::Sender<EkfStatus>,
    pub version: tokio::sync::watch::Sender<Option<VehicleVersion>>,
    pub mount_attitude: tokio::sync::watch::Sender<MountAttitude>,
    pub rangefinder: tokio::sync::watch::Sender<Option<RangefinderReading>>,
    pub wind: tokio::sync::watch::Sender<Option<WindReading>>,
    pub channels: tokio::sync::watch::Sender<ChannelTable>,
    pub channel_overrides: tokio::sync::watch::Sender<ChannelOverrides>,
    pub home_position: tokio::sync::watch::Sender<Option<crate::mission::HomePosition>>,
    pub mission_state: tokio::sync::watch::Sender<MissionState>,
    pub link_state: tokio::sync::watch::Sender<LinkState>,
    pub mission_progress: tokio::sync::watch::Sender<Option<crate::mission::TransferProgress>>,
    pub param_store: tokio::sync::watch::Sender<crate::params::ParamStore>,
    pub param_progress: tokio::sync::watch::Sender<crate::params::ParamProgress>,
    /// Bumped on every `MissionCancelTransfer` command; transfer loops select
    /// on this changing rather than polling a flag.
    pub transfer_cancel: tokio::sync::watch::Sender<u64>,
}

/// Reader-side channels, cloneable via Arc.
pub(crate) struct StateChannels {
    pub vehicle_state: tokio::sync::watch::Receiver<VehicleState>,
    pub identity: tokio::sync::watch::Receiver<Option<VehicleIdentity>>,
    pub telemetry: tokio::sync::watch::Receiver<Telemetry>,
    pub attitude: tokio::sync::watch::Receiver<Attitude>,
    pub global_frame: tokio::sync::watch::Receiver<LocationGlobal>,
    pub global_relative_frame: tokio::sync::watch::Receiver<LocationGlobalRelative>,
    pub local_frame: tokio::sync::watch::Receiver<LocationLocal>,
    pub ekf_status: tokio::sync::watch::Receiver<EkfStatus>,
    pub version: tokio::sync::watch::Receiver<Option<VehicleVersion>>,
    pub mount_attitude: tokio::sync::watch::Receiver<MountAttitude>,
    pub rangefinder: tokio::sync::watch::Receiver<Option<RangefinderReading>>,
    pub wind: tokio::sync::watch::Receiver<Option<WindReading>>,
    pub channels: tokio::sync::watch::Receiver<ChannelTable>,
    pub channel_overrides: tokio::sync::watch::Receiver<ChannelOverrides>,
    pub home_position: tokio::sync::watch::Receiver<Option<crate::mission::HomePosition>>,
    pub mission_state: tokio::sync::watch::Receiver<MissionState>,
    pub link_state: tokio::sync::watch::Receiver<LinkState>,
    pub mission_progress: tokio::sync::watch::Receiver<Option<crate::mission::TransferProgress>>,
    pub param_store: tokio::sync::watch::Receiver<crate::params::ParamStore>,
    pub param_progress: tokio::sync::watch::Receiver<crate::params::ParamProgress>,
    pub transfer_cancel: tokio::sync::watch::Receiver<u64>,
}

pub(crate) fn create_channels() -> (StateWriters, StateChannels) {
    let (vs_tx, vs_rx) = tokio::sync::watch::channel(VehicleState::default());
    let (id_tx, id_rx) = tokio::sync::watch::channel(None);
    let (telem_tx, telem_rx) = tokio::sync::watch::channel(Telemetry::default());
    let (att_tx, att_rx) = tokio::sync::watch::channel(Attitude::default());
    let (gf_tx, gf_rx) = tokio::sync::watch::channel(LocationGlobal::default());
    let (grf_tx, grf_rx) = tokio::sync::watch::channel(LocationGlobalRelative::default());
    let (lf_tx, lf_rx) = tokio::sync::watch::channel(LocationLocal::default());
    let (ekf_tx, ekf_rx) = tokio::sync::watch::channel(EkfStatus::default());
    let (ver_tx, ver_rx) = tokio::sync::watch::channel(None);
    let (mount_tx, mount_rx) = tokio::sync::watch::channel(MountAttitude::default());
    let (rf_tx, rf_rx) = tokio::sync::watch::channel(None);
    let (wind_tx, wind_rx) = tokio::sync::watch::channel(None);
    let (chan_tx, chan_rx) = tokio::sync::watch::channel(ChannelTable::default());
    let (ovr_tx, ovr_rx) = tokio::sync::watch::channel(ChannelOverrides::default());
    let (home_tx, home_rx) = tokio::sync::watch::channel(None);
    let (ms_tx, ms_rx) = tokio::sync::watch::channel(MissionState::default());
    let (ls_tx, ls_rx) = tokio::sync::watch::channel(LinkState::Connecting);
    let (mp_tx, mp_rx) = tokio::sync::watch::channel(None);
    let (ps_tx, ps_rx) = tokio::sync::watch::channel(crate::params::ParamStore::default());
    let (pp_tx, pp_rx) = tokio::sync::watch::channel(crate::params::ParamProgress::default());
    let (tc_tx, tc_rx) = tokio::sync::watch::channel(0u64);

    let writers = StateWriters {
        vehicle_state: vs_tx,
        identity: id_tx,
        telemetry: telem_tx,
        attitude: att_tx,
        global_frame: gf_tx,
        global_relative_frame: grf_tx,
        local_frame: lf_tx,
        ekf_status: ekf_tx,
        version: ver_tx,
        mount_attitude: mount_tx,
        rangefinder: rf_tx,
        wind: wind_tx,
        channels: chan_tx,
        channel_overrides: ovr_tx,
        home_position: home_tx,
        mission_state: ms_tx,
        link_state: ls_tx,
        mission_progress: mp_tx,
        param_store: ps_tx,
        param_progress: pp_tx,
        transfer_cancel: tc_tx,
    };

    let channels = StateChannels {
        vehicle_state: vs_rx,
        identity: id_rx,
        telemetry: telem_rx,
        attitude: att_rx,
        global_frame: gf_rx,
        global_relative_frame: grf_rx,
        local_frame: lf_rx,
        ekf_status: ekf_rx,
        version: ver_rx,
        mount_attitude: mount_rx,
        rangefinder: rf_rx,
        wind: wind_rx,
        channels: chan_rx,
        channel_overrides: ovr_rx,
        home_position: home_rx,
        mission_state: ms_rx,
        link_state: ls_rx,
        mission_progress: mp_rx,
        param_store: ps_rx,
        param_progress: pp_rx,
        transfer_cancel: tc_rx,
    };

    (writers, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_low_and_critical_thresholds() {
        let low = Battery { voltage_v: None, current_a: None, level_pct: Some(15) };
        assert!(low.is_low());
        assert!(!low.is_critical());

        let critical = Battery { voltage_v: None, current_a: None, level_pct: Some(5) };
        assert!(critical.is_low());
        assert!(critical.is_critical());

        let healthy = Battery { voltage_v: None, current_a: None, level_pct: Some(80) };
        assert!(!healthy.is_low());
    }

    #[test]
    fn battery_unknown_level_is_never_low() {
        let unknown = Battery::default();
        assert!(!unknown.is_low());
        assert!(!unknown.is_critical());
    }

    #[test]
    fn gps_fix_thresholds() {
        let none = GpsInfo { fix_type: GpsFixType::NoFix, ..Default::default() };
        assert!(!none.has_fix());

        let two_d = GpsInfo { fix_type: GpsFixType::Fix2d, ..Default::default() };
        assert!(two_d.has_fix());
        assert!(!two_d.has_3d_fix());

        let three_d = GpsInfo { fix_type: GpsFixType::Fix3d, ..Default::default() };
        assert!(three_d.has_3d_fix());
    }

    #[test]
    fn ekf_ok_requires_all_three_flags() {
        let ok = EkfStatus { flags: 0x07, ..Default::default() };
        assert!(ok.is_ok());

        let degraded = EkfStatus { flags: 0x05, ..Default::default() };
        assert!(!degraded.is_ok());
    }

    #[test]
    fn version_decodes_bytes_and_release_type() {
        // raw = release(0) | patch(1) | minor(2) | major(3), little-endian bytes
        let raw = u32::from_le_bytes([0x80, 4, 3, 2]);
        let version = VehicleVersion::from_raw(raw, 0);
        assert_eq!(version.major, 2);
        assert_eq!(version.minor, 3);
        assert_eq!(version.patch, 4);
        assert_eq!(version.release, 0x80);
        assert!(!version.is_stable());
        assert_eq!(version.release_type(), ReleaseType::Beta);
    }

    #[test]
    fn version_release_255_is_stable() {
        let raw = u32::from_le_bytes([255, 0, 0, 1]);
        let version = VehicleVersion::from_raw(raw, 0);
        assert!(version.is_stable());
    }

    #[test]
    fn capabilities_decodes_named_bits() {
        let caps = Capabilities::from_bits((1 << 2) | (1 << 5));
        assert!(caps.mission_int);
        assert!(caps.ftp);
        assert!(!caps.command_int);
    }

    #[test]
    fn channel_table_get_is_one_indexed() {
        let mut table = ChannelTable::default();
        table.channels[2] = Some(1500);
        assert_eq!(table.get(3), Some(1500));
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(99), None);
    }

    #[test]
    fn vehicle_type_filters_non_vehicle_heartbeats() {
        assert!(!VehicleType::Gcs.is_vehicle());
        assert!(!VehicleType::Gimbal.is_vehicle());
        assert!(!VehicleType::Adsb.is_vehicle());
        assert!(!VehicleType::OnboardController.is_vehicle());
        assert!(VehicleType::Quadrotor.is_vehicle());
    }
}
