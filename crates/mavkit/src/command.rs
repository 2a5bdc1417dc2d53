use crate::error::VehicleError;
use crate::mission::{HomePosition, MissionPlan, MissionType};
use crate::params::ParamStore;
use mavlink::common::MavCmd;
use tokio::sync::oneshot;

pub(crate) enum Command {
    Arm {
        force: bool,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    Disarm {
        force: bool,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    SetMode {
        custom_mode: u32,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    CommandLong {
        command: MavCmd,
        params: [f32; 7],
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    GuidedGoto {
        lat_e7: i32,
        lon_e7: i32,
        alt_m: f32,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    MissionUpload {
        plan: MissionPlan,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    MissionDownload {
        mission_type: MissionType,
        reply: oneshot::Sender<Result<MissionPlan, VehicleError>>,
    },
    MissionClear {
        mission_type: MissionType,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    MissionSetCurrent {
        seq: u16,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    MissionCancelTransfer,
    ParamDownloadAll {
        reply: oneshot::Sender<Result<ParamStore, VehicleError>>,
    },
    ParamWrite {
        name: String,
        value: f32,
        reply: oneshot::Sender<Result<bool, VehicleError>>,
    },
    VelocityNed {
        vx_mps: f32,
        vy_mps: f32,
        vz_mps: f32,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    VelocityGlobal {
        vx_mps: f32,
        vy_mps: f32,
        vz_mps: f32,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    ConditionYaw {
        angle_deg: f32,
        speed_deg_s: f32,
        relative: bool,
        clockwise: bool,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    Reboot {
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    /// Bulk-replaces all 8 override slots in one shot; `None` means "cleared"
    /// (wire value `0`). Produces exactly one `RC_CHANNELS_OVERRIDE` message
    /// regardless of how many slots changed.
    ChannelOverrideSet {
        slots: [Option<u16>; 8],
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    GimbalRotate {
        pitch_deg: f32,
        roll_deg: f32,
        yaw_deg: f32,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    /// `alt_m` is MSL. `home` converts it to a relative altitude for the ROI
    /// command; `None` is only valid if the autopilot accepts MSL ROI
    /// directly, which this client does not assume, so it is an error.
    GimbalTargetLocation {
        lat_e7: i32,
        lon_e7: i32,
        alt_m: f64,
        home: Option<HomePosition>,
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    GimbalRelease {
        reply: oneshot::Sender<Result<(), VehicleError>>,
    },
    Shutdown,
}
