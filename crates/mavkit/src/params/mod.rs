pub mod file;
pub mod types;
pub(crate) mod wire;

pub use file::{format_param_file, parse_param_file};
pub use types::{Param, ParamProgress, ParamStore, ParamTransferPhase, ParamType};

use crate::error::VehicleError;
use crate::Vehicle;

/// Handle to parameter operations on a `Vehicle`.
pub struct ParamsHandle<'a> {
    vehicle: &'a Vehicle,
}

impl<'a> ParamsHandle<'a> {
    pub(crate) fn new(vehicle: &'a Vehicle) -> Self {
        Self { vehicle }
    }

    pub async fn download_all(&self) -> Result<ParamStore, VehicleError> {
        self.vehicle
            .send_command(|reply| crate::command::Command::ParamDownloadAll { reply })
            .await
    }

    /// Sends `PARAM_SET` and waits for the autopilot to echo it back,
    /// retrying a few times. Returns `Ok(false)` rather than an error when
    /// the retries are exhausted without an echo; callers decide whether
    /// that is fatal.
    pub async fn write(&self, name: String, value: f32) -> Result<bool, VehicleError> {
        self.vehicle
            .send_command(|reply| crate::command::Command::ParamWrite {
                name,
                value,
                reply,
            })
            .await
    }
}
