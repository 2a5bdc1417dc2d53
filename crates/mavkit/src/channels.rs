//! Read-only RC channel table plus the fixed 8-slot override mapping.
//!
//! Built fresh (no direct teacher precedent) in the same shape as the
//! existing `mission`/`params` sub-APIs: a thin handle type over
//! `Vehicle::send_command`, with the actual mutation living in the event
//! loop so that every override replace is naturally a single
//! `RC_CHANNELS_OVERRIDE` message — no suspend/apply/flush state machine is
//! needed once mutation is itself one message across the command channel.

use crate::error::VehicleError;
use crate::state::{ChannelOverrides, ChannelTable};
use crate::Vehicle;
use tokio::sync::watch;

/// Handle to RC channel reads and override writes on a [`Vehicle`].
pub struct ChannelsHandle<'a> {
    vehicle: &'a Vehicle,
}

impl<'a> ChannelsHandle<'a> {
    pub(crate) fn new(vehicle: &'a Vehicle) -> Self {
        Self { vehicle }
    }

    /// Live RC channel values as read off `RC_CHANNELS_RAW`/`RC_CHANNELS`.
    pub fn table(&self) -> watch::Receiver<ChannelTable> {
        self.vehicle.inner.channels.channels.clone()
    }

    /// Currently active override slots (cleared slots read back as `0`).
    pub fn overrides(&self) -> watch::Receiver<ChannelOverrides> {
        self.vehicle.inner.channels.channel_overrides.clone()
    }

    /// Replaces all 8 override slots in one `RC_CHANNELS_OVERRIDE` message.
    /// `None` clears a slot (wire value `0`).
    pub async fn set(&self, slots: [Option<u16>; 8]) -> Result<(), VehicleError> {
        self.vehicle
            .send_command(|reply| crate::command::Command::ChannelOverrideSet { slots, reply })
            .await
    }

    /// Clears every override slot in one message.
    pub async fn clear(&self) -> Result<(), VehicleError> {
        self.set([None; 8]).await
    }
}
