pub mod channels;
pub mod command;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod event_loop;
pub mod gimbal;
pub(crate) mod heartbeat;
pub mod mission;
pub mod modes;
pub mod params;
pub(crate) mod router;
pub mod state;
pub mod vehicle;

pub use config::VehicleConfig;
pub use error::VehicleError;
pub use event_bus::{
    AttributeChangedEvent, AttributeValue, EventBus, EventPriority, MavMessageEvent, SubscriptionId,
};
pub use vehicle::{MessageSubscription, Vehicle};

pub use channels::ChannelsHandle;
pub use gimbal::GimbalHandle;

pub use state::{
    AutopilotType, Battery, ChannelOverrides, ChannelTable, EkfStatus, FlightMode, GpsFixType,
    GpsInfo, LinkState, LocationGlobal, LocationGlobalRelative, LocationLocal, MissionState,
    MountAttitude, RangefinderReading, SystemStatus, Telemetry, VehicleIdentity, VehicleState,
    VehicleType, VehicleVersion, WindReading,
};

pub use mission::{
    items_for_wire_upload, normalize_for_compare, plan_from_wire_download, plans_equivalent,
    validate_plan, CompareTolerance, HomePosition, IssueSeverity, MissionFrame, MissionHandle,
    MissionItem, MissionIssue, MissionPlan, MissionTransferMachine, MissionType, RetryPolicy,
    TransferDirection, TransferError, TransferEvent, TransferPhase, TransferProgress,
};

pub use params::{
    format_param_file, parse_param_file, Param, ParamProgress, ParamStore, ParamTransferPhase,
    ParamType, ParamsHandle,
};
