//! Mount/gimbal control: rotate, point at a ground location, and release
//! back to RC targeting.
//!
//! Built fresh, grounded in the same `send_message`/`send_command_long_ack`
//! helpers `event_loop.rs` already uses for every other command dispatch.

use crate::error::VehicleError;
use crate::mission::HomePosition;
use crate::state::{LocationGlobal, MountAttitude};
use crate::Vehicle;
use tokio::sync::watch;

/// Handle to mount/gimbal operations on a [`Vehicle`].
pub struct GimbalHandle<'a> {
    vehicle: &'a Vehicle,
}

impl<'a> GimbalHandle<'a> {
    pub(crate) fn new(vehicle: &'a Vehicle) -> Self {
        Self { vehicle }
    }

    /// Current `MOUNT_STATUS`/`MOUNT_ORIENTATION` projection, in degrees.
    pub fn orientation(&self) -> watch::Receiver<MountAttitude> {
        self.vehicle.inner.channels.mount_attitude.clone()
    }

    /// `MOUNT_CONFIGURE(MAVLINK_TARGETING)` then `MOUNT_CONTROL` with
    /// centidegree-scaled pitch/roll/yaw.
    pub async fn rotate(&self, pitch_deg: f32, roll_deg: f32, yaw_deg: f32) -> Result<(), VehicleError> {
        self.vehicle
            .send_command(|reply| crate::command::Command::GimbalRotate {
                pitch_deg,
                roll_deg,
                yaw_deg,
                reply,
            })
            .await
    }

    /// `MOUNT_CONFIGURE(GPS_POINT)` then `COMMAND_LONG(MAV_CMD_DO_SET_ROI)`.
    ///
    /// `loc` is an MSL location; `home` converts it to the relative altitude
    /// the ROI command expects. Returns `InvalidArgument` if `home` is not
    /// supplied, or if `loc.altitude_m` has not yet been observed (barometer
    /// warm-up gate).
    pub async fn target_location(
        &self,
        loc: LocationGlobal,
        home: Option<&HomePosition>,
    ) -> Result<(), VehicleError> {
        let Some(alt_m) = loc.altitude_m else {
            return Err(VehicleError::InvalidArgument(
                "gimbal target_location: altitude not yet known".to_string(),
            ));
        };
        let lat_e7 = (loc.latitude_deg * 1e7) as i32;
        let lon_e7 = (loc.longitude_deg * 1e7) as i32;
        self.vehicle
            .send_command(|reply| crate::command::Command::GimbalTargetLocation {
                lat_e7,
                lon_e7,
                alt_m,
                home: home.cloned(),
                reply,
            })
            .await
    }

    /// `MOUNT_CONFIGURE(RC_TARGETING)`.
    pub async fn release(&self) -> Result<(), VehicleError> {
        self.vehicle
            .send_command(|reply| crate::command::Command::GimbalRelease { reply })
            .await
    }
}
