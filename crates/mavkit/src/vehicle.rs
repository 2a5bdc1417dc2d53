use crate::channels::ChannelsHandle;
use crate::command::Command;
use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::event_bus::{AttributeChangedEvent, EventBus, EventPriority, MavMessageEvent, SubscriptionId};
use crate::event_loop::run_event_loop;
use crate::gimbal::GimbalHandle;
use crate::mission::{HomePosition, MissionHandle, TransferProgress};
use crate::params::{ParamProgress, ParamStore, ParamsHandle};
use crate::state::{
    create_channels, Attitude, ChannelOverrides, ChannelTable, EkfStatus, FlightMode, LinkState,
    LocationGlobal, LocationGlobalRelative, LocationLocal, MissionState, MountAttitude,
    RangefinderReading, StateChannels, Telemetry, VehicleIdentity, VehicleState, VehicleVersion,
    WindReading,
};
use mavlink::common::{self, MavCmd};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Async MAVLink vehicle handle.
///
/// `Vehicle` is `Clone + Send + Sync`. Clones share the same connection.
/// When the last clone is dropped, the event loop is cancelled.
#[derive(Clone)]
pub struct Vehicle {
    pub(crate) inner: Arc<VehicleInner>,
}

pub(crate) struct VehicleInner {
    pub(crate) command_tx: mpsc::Sender<Command>,
    pub(crate) event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    pub(crate) channels: StateChannels,
    _config: VehicleConfig,
}

/// RAII guard returned by [`Vehicle::on_message`] / [`Vehicle::on_attribute`].
/// Unsubscribes from the [`EventBus`] when dropped.
pub struct MessageSubscription {
    event_bus: Arc<EventBus>,
    id: SubscriptionId,
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.event_bus.unsubscribe(self.id);
    }
}

impl Drop for VehicleInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Vehicle {
    /// Connect using a mavlink address string (e.g. `udpin:0.0.0.0:14550`).
    /// Waits for the first HEARTBEAT before returning.
    pub async fn connect(address: &str) -> Result<Self, VehicleError> {
        Self::connect_with_config(address, VehicleConfig::default()).await
    }

    /// Connect via UDP. `bind_addr` is `host:port` to bind to (e.g. `0.0.0.0:14550`).
    pub async fn connect_udp(bind_addr: &str) -> Result<Self, VehicleError> {
        Self::connect(&format!("udpin:{bind_addr}")).await
    }

    /// Connect via TCP. `addr` is `host:port` to connect to.
    pub async fn connect_tcp(addr: &str) -> Result<Self, VehicleError> {
        Self::connect(&format!("tcp:{addr}")).await
    }

    /// Connect via serial port.
    pub async fn connect_serial(port: &str, baud: u32) -> Result<Self, VehicleError> {
        Self::connect(&format!("serial:{port}:{baud}")).await
    }

    /// Connect with a custom `VehicleConfig`.
    pub async fn connect_with_config(
        address: &str,
        config: VehicleConfig,
    ) -> Result<Self, VehicleError> {
        let connection = mavlink::connect_async::<common::MavMessage>(address)
            .await
            .map_err(|err| VehicleError::ConnectionFailed(err.to_string()))?;

        let (writers, channels) = create_channels();
        let cancel = CancellationToken::new();
        let event_bus = Arc::new(EventBus::new());
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);

        let loop_cancel = cancel.clone();
        let loop_event_bus = event_bus.clone();
        let loop_config_timeout = config.connect_timeout;

        // Spawn the event loop
        let writers_for_loop = writers;
        tokio::spawn(run_event_loop(
            connection,
            command_rx,
            writers_for_loop,
            loop_event_bus,
            config.clone(),
            loop_cancel,
        ));

        let vehicle = Vehicle {
            inner: Arc::new(VehicleInner {
                command_tx,
                event_bus,
                cancel,
                channels,
                _config: config,
            }),
        };

        // Wait for first HEARTBEAT (indicated by vehicle_state becoming non-default)
        let mut vs_rx = vehicle.state();
        let heartbeat_wait = async {
            loop {
                vs_rx.changed().await.map_err(|_| VehicleError::Disconnected)?;
                let state = vs_rx.borrow().clone();
                // A heartbeat sets autopilot to something (at minimum Generic from target update)
                if state.custom_mode != 0 || state.armed || state.mode_name != "" {
                    return Ok::<(), VehicleError>(());
                }
            }
        };

        tokio::select! {
            result = heartbeat_wait => result?,
            _ = tokio::time::sleep(loop_config_timeout) => {
                return Err(VehicleError::Timeout);
            }
        }

        Ok(vehicle)
    }

    // --- Reactive state (watch channels) ---

    pub fn state(&self) -> watch::Receiver<VehicleState> {
        self.inner.channels.vehicle_state.clone()
    }

    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.inner.channels.telemetry.clone()
    }

    pub fn attitude(&self) -> watch::Receiver<Attitude> {
        self.inner.channels.attitude.clone()
    }

    pub fn global_frame(&self) -> watch::Receiver<LocationGlobal> {
        self.inner.channels.global_frame.clone()
    }

    pub fn global_relative_frame(&self) -> watch::Receiver<LocationGlobalRelative> {
        self.inner.channels.global_relative_frame.clone()
    }

    pub fn local_frame(&self) -> watch::Receiver<LocationLocal> {
        self.inner.channels.local_frame.clone()
    }

    pub fn ekf_status(&self) -> watch::Receiver<EkfStatus> {
        self.inner.channels.ekf_status.clone()
    }

    pub fn version(&self) -> watch::Receiver<Option<VehicleVersion>> {
        self.inner.channels.version.clone()
    }

    pub fn mount_attitude(&self) -> watch::Receiver<MountAttitude> {
        self.inner.channels.mount_attitude.clone()
    }

    pub fn rangefinder(&self) -> watch::Receiver<Option<RangefinderReading>> {
        self.inner.channels.rangefinder.clone()
    }

    pub fn wind(&self) -> watch::Receiver<Option<WindReading>> {
        self.inner.channels.wind.clone()
    }

    pub fn channel_table(&self) -> watch::Receiver<ChannelTable> {
        self.inner.channels.channels.clone()
    }

    pub fn channel_overrides(&self) -> watch::Receiver<ChannelOverrides> {
        self.inner.channels.channel_overrides.clone()
    }

    pub fn param_store(&self) -> watch::Receiver<ParamStore> {
        self.inner.channels.param_store.clone()
    }

    pub fn param_progress(&self) -> watch::Receiver<ParamProgress> {
        self.inner.channels.param_progress.clone()
    }

    pub fn home_position(&self) -> watch::Receiver<Option<HomePosition>> {
        self.inner.channels.home_position.clone()
    }

    pub fn mission_state(&self) -> watch::Receiver<MissionState> {
        self.inner.channels.mission_state.clone()
    }

    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.inner.channels.link_state.clone()
    }

    pub fn mission_progress(&self) -> watch::Receiver<Option<TransferProgress>> {
        self.inner.channels.mission_progress.clone()
    }

    /// Polls the `watch` channel for each named attribute at 10Hz until all
    /// are non-default/present, or `timeout` elapses.
    ///
    /// Recognized names: `"parameters"`, `"gps_0"`, `"armed"`, `"mode"`,
    /// `"attitude"`, `"heartbeat"`.
    pub async fn wait_ready(&self, attrs: &[&str], timeout: Duration) -> Result<(), VehicleError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        loop {
            if attrs.iter().all(|attr| self.attr_is_ready(attr)) {
                return Ok(());
            }
            tokio::select! {
                _ = ticker.tick() => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(VehicleError::Timeout);
            }
        }
    }

    fn attr_is_ready(&self, attr: &str) -> bool {
        match attr {
            "parameters" => {
                let store = self.inner.channels.param_store.borrow();
                store.expected_count > 0 && store.params.len() as u16 >= store.expected_count
            }
            "gps_0" => self.inner.channels.telemetry.borrow().gps.has_fix(),
            "armed" => self.inner.channels.vehicle_state.borrow().armed,
            "mode" => !self.inner.channels.vehicle_state.borrow().mode_name.is_empty(),
            "attitude" => {
                // ATTITUDE updates unconditionally, so "ready" just means the
                // heartbeat-adopted connection has had a chance to project it.
                self.identity().is_some()
            }
            "heartbeat" => matches!(*self.inner.channels.link_state.borrow(), LinkState::Connected),
            _ => true,
        }
    }

    // --- Vehicle commands ---

    pub async fn arm(&self, force: bool) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::Arm { force, reply }).await
    }

    pub async fn disarm(&self, force: bool) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::Disarm { force, reply }).await
    }

    pub async fn set_mode(&self, custom_mode: u32) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::SetMode { custom_mode, reply }).await
    }

    pub async fn set_mode_by_name(&self, name: &str) -> Result<(), VehicleError> {
        let state = self.inner.channels.vehicle_state.borrow().clone();
        let custom_mode = crate::modes::mode_number(state.autopilot, state.vehicle_type, name)
            .ok_or_else(|| VehicleError::ModeNotAvailable(name.to_string()))?;
        self.set_mode(custom_mode).await
    }

    pub async fn takeoff(&self, altitude_m: f32) -> Result<(), VehicleError> {
        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m],
        )
        .await
    }

    pub async fn goto(&self, lat_deg: f64, lon_deg: f64, alt_m: f32) -> Result<(), VehicleError> {
        let lat_e7 = (lat_deg * 1e7) as i32;
        let lon_e7 = (lon_deg * 1e7) as i32;
        self.send_command(|reply| Command::GuidedGoto {
            lat_e7,
            lon_e7,
            alt_m,
            reply,
        })
        .await
    }

    pub async fn command_long(
        &self,
        cmd: MavCmd,
        params: [f32; 7],
    ) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::CommandLong {
            command: cmd,
            params,
            reply,
        })
        .await
    }

    /// `SET_POSITION_TARGET_LOCAL_NED` velocity-only setpoint.
    pub async fn velocity_ned(&self, vx_mps: f32, vy_mps: f32, vz_mps: f32) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::VelocityNed {
            vx_mps,
            vy_mps,
            vz_mps,
            reply,
        })
        .await
    }

    /// `SET_POSITION_TARGET_GLOBAL_INT` velocity-only setpoint.
    pub async fn velocity_global(&self, vx_mps: f32, vy_mps: f32, vz_mps: f32) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::VelocityGlobal {
            vx_mps,
            vy_mps,
            vz_mps,
            reply,
        })
        .await
    }

    /// `COMMAND_LONG(MAV_CMD_CONDITION_YAW)`.
    pub async fn condition_yaw(
        &self,
        angle_deg: f32,
        speed_deg_s: f32,
        relative: bool,
        clockwise: bool,
    ) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::ConditionYaw {
            angle_deg,
            speed_deg_s,
            relative,
            clockwise,
            reply,
        })
        .await
    }

    /// `COMMAND_LONG(MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN)`.
    pub async fn reboot(&self) -> Result<(), VehicleError> {
        self.send_command(|reply| Command::Reboot { reply }).await
    }

    pub fn available_modes(&self) -> Vec<FlightMode> {
        let state = self.inner.channels.vehicle_state.borrow().clone();
        crate::modes::available_modes(state.autopilot, state.vehicle_type)
    }

    pub fn identity(&self) -> Option<VehicleIdentity> {
        self.inner.channels.identity.borrow().clone()
    }

    /// Mission sub-API.
    pub fn mission(&self) -> MissionHandle<'_> {
        MissionHandle::new(self)
    }

    /// Parameter sub-API.
    pub fn params(&self) -> ParamsHandle<'_> {
        ParamsHandle::new(self)
    }

    /// RC channel read/override sub-API.
    pub fn channels(&self) -> ChannelsHandle<'_> {
        ChannelsHandle::new(self)
    }

    /// Gimbal/mount sub-API.
    pub fn gimbal(&self) -> GimbalHandle<'_> {
        GimbalHandle::new(self)
    }

    /// Subscribes to a named message (or `"*"` for every message). Delivery
    /// stops when the returned [`MessageSubscription`] is dropped.
    pub fn on_message<F>(&self, name: &'static str, priority: EventPriority, handler: F) -> MessageSubscription
    where
        F: Fn(&MavMessageEvent) + Send + Sync + 'static,
    {
        let id = if name == "*" {
            self.inner.event_bus.subscribe_all_messages(priority, handler)
        } else {
            self.inner.event_bus.subscribe_message(name, priority, handler)
        };
        MessageSubscription {
            event_bus: self.inner.event_bus.clone(),
            id,
        }
    }

    /// Subscribes to a named attribute (or `"*"` for every attribute).
    /// Delivery stops when the returned [`MessageSubscription`] is dropped.
    pub fn on_attribute<F>(&self, name: &'static str, priority: EventPriority, handler: F) -> MessageSubscription
    where
        F: Fn(&AttributeChangedEvent) + Send + Sync + 'static,
    {
        let id = self.inner.event_bus.subscribe_attribute(name, priority, handler);
        MessageSubscription {
            event_bus: self.inner.event_bus.clone(),
            id,
        }
    }

    /// Non-RAII variant of [`Vehicle::on_message`]: returns the raw
    /// [`SubscriptionId`] for callers that manage the subscription's
    /// lifetime explicitly via [`Vehicle::remove_message_listener`].
    pub fn add_message_listener<F>(&self, name: &'static str, priority: EventPriority, handler: F) -> SubscriptionId
    where
        F: Fn(&MavMessageEvent) + Send + Sync + 'static,
    {
        if name == "*" {
            self.inner.event_bus.subscribe_all_messages(priority, handler)
        } else {
            self.inner.event_bus.subscribe_message(name, priority, handler)
        }
    }

    /// Removes a subscription previously returned by
    /// [`Vehicle::add_message_listener`]. A no-op if already removed.
    pub fn remove_message_listener(&self, id: SubscriptionId) {
        self.inner.event_bus.unsubscribe(id);
    }

    /// Gracefully disconnect from the vehicle.
    pub async fn disconnect(self) -> Result<(), VehicleError> {
        let _ = self.inner.command_tx.send(Command::Shutdown).await;
        Ok(())
    }

    // --- Internal helper ---

    pub(crate) async fn send_command<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, VehicleError>>) -> Command,
    ) -> Result<T, VehicleError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(make(tx))
            .await
            .map_err(|_| VehicleError::Disconnected)?;
        rx.await.map_err(|_| VehicleError::Disconnected)?
    }
}
