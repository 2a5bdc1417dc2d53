use crate::mission::RetryPolicy;
use std::time::Duration;

#[derive(Clone)]
pub struct VehicleConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub retry_policy: RetryPolicy,
    pub auto_request_home: bool,
    pub auto_request_streams: bool,
    pub auto_request_capabilities: bool,
    /// Base rate (Hz) for the `REQUEST_DATA_STREAM` schedule sent on connect.
    pub stream_rate_hz: u16,
    pub command_buffer_size: usize,
    pub connect_timeout: Duration,
    /// Heartbeat liveness timeout; no heartbeat within this window flips
    /// `link_state` to `Disconnected`.
    pub heartbeat_timeout: Duration,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 255,
            gcs_component_id: 190,
            retry_policy: RetryPolicy::default(),
            auto_request_home: true,
            auto_request_streams: true,
            auto_request_capabilities: true,
            stream_rate_hz: 4,
            command_buffer_size: 32,
            connect_timeout: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(5),
        }
    }
}
