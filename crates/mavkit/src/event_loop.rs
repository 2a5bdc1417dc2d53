use crate::command::Command;
use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::event_bus::{AttributeChangedEvent, AttributeValue, EventBus};
use crate::heartbeat::HeartbeatMonitor;
use crate::mission::{
    self, IssueSeverity, MissionFrame, MissionItem, MissionPlan, MissionTransferMachine, MissionType,
    TransferPhase,
};
use crate::params::{wire as param_wire, ParamStore};
use crate::router::MessageRouter;
use crate::state::{
    Attitude, AutopilotType, Battery, ChannelOverrides, ChannelTable, EkfStatus, GpsFixType,
    GpsInfo, LinkState, LocationGlobal, LocationGlobalRelative, LocationLocal, MissionState,
    MountAttitude, RangefinderReading, StateWriters, SystemStatus, VehicleIdentity, VehicleState,
    VehicleType, VehicleVersion, WindReading,
};
use mavlink::common::{self, MavCmd, MavModeFlag};
use mavlink::{AsyncMavConnection, MavHeader};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const MAGIC_FORCE_ARM_VALUE: f32 = 2989.0;
const MAGIC_FORCE_DISARM_VALUE: f32 = 21196.0;

/// `REQUEST_DATA_STREAM` entries sent once on connect: (stream, rate multiplier
/// against `config.stream_rate_hz`).
const STREAM_SCHEDULE: &[(common::MavDataStream, u16)] = &[
    (common::MavDataStream::MAV_DATA_STREAM_ALL, 1),
    (common::MavDataStream::MAV_DATA_STREAM_RAW_SENSORS, 2),
    (common::MavDataStream::MAV_DATA_STREAM_EXTENDED_STATUS, 1),
    (common::MavDataStream::MAV_DATA_STREAM_RC_CHANNELS, 1),
    (common::MavDataStream::MAV_DATA_STREAM_RAW_CONTROLLER, 1),
    (common::MavDataStream::MAV_DATA_STREAM_POSITION, 2),
    (common::MavDataStream::MAV_DATA_STREAM_EXTRA1, 1),
    (common::MavDataStream::MAV_DATA_STREAM_EXTRA2, 1),
    (common::MavDataStream::MAV_DATA_STREAM_EXTRA3, 1),
];

/// Internal tracking of the remote vehicle identity (from heartbeats).
#[derive(Debug, Clone, Copy)]
struct VehicleTarget {
    system_id: u8,
    component_id: u8,
    autopilot: common::MavAutopilot,
    vehicle_type: common::MavType,
}

pub(crate) async fn run_event_loop(
    connection: Box<dyn AsyncMavConnection<common::MavMessage> + Sync + Send>,
    mut command_rx: mpsc::Receiver<Command>,
    state_writers: StateWriters,
    event_bus: Arc<EventBus>,
    config: VehicleConfig,
    cancel: CancellationToken,
) {
    let mut vehicle_target: Option<VehicleTarget> = None;
    let mut home_requested = false;
    let mut streams_requested = false;
    let mut capabilities_requested = false;
    let mut channel_overrides: ChannelOverrides = ChannelOverrides::default();
    let mut heartbeat_monitor = HeartbeatMonitor::new(config.heartbeat_timeout);
    let mut liveness_tick = tokio::time::interval(Duration::from_millis(500));
    let router = MessageRouter::new(event_bus.clone());
    router.attach();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("event loop cancelled");
                set_link_state(&state_writers, &event_bus, LinkState::Disconnected);
                break;
            }
            Some(cmd) = command_rx.recv() => {
                match cmd {
                    Command::Shutdown => {
                        debug!("event loop shutdown requested");
                        set_link_state(&state_writers, &event_bus, LinkState::Disconnected);
                        break;
                    }
                    cmd => {
                        handle_command(
                            cmd,
                            &*connection,
                            &state_writers,
                            &event_bus,
                            &mut vehicle_target,
                            &mut channel_overrides,
                            &config,
                            &cancel,
                        ).await;
                    }
                }
            }
            _ = liveness_tick.tick() => {
                if heartbeat_monitor.check_timeout(Instant::now()) {
                    warn!("heartbeat timed out");
                    set_link_state(&state_writers, &event_bus, LinkState::Disconnected);
                }
            }
            result = connection.recv() => {
                match result {
                    Ok((header, msg)) => {
                        let is_vehicle_heartbeat = match &msg {
                            common::MavMessage::HEARTBEAT(hb) => {
                                VehicleType::from_mav(hb.mavtype).is_vehicle()
                            }
                            _ => true,
                        };

                        if is_vehicle_heartbeat {
                            let newly_adopted = update_vehicle_target(&mut vehicle_target, &header, &msg);
                            if newly_adopted {
                                if let Some(target) = vehicle_target {
                                    let _ = state_writers.identity.send(Some(VehicleIdentity {
                                        system_id: target.system_id,
                                        component_id: target.component_id,
                                        autopilot: AutopilotType::from_mav(target.autopilot),
                                        vehicle_type: VehicleType::from_mav(target.vehicle_type),
                                    }));
                                }
                            }

                            if matches!(msg, common::MavMessage::HEARTBEAT(_))
                                && heartbeat_monitor.on_heartbeat(Instant::now())
                            {
                                set_link_state(&state_writers, &event_bus, LinkState::Connected);
                            }

                            if let Some(target) = vehicle_target {
                                if !home_requested && config.auto_request_home {
                                    request_home_position(&*connection, &target, &config).await;
                                    home_requested = true;
                                }
                                if !streams_requested && config.auto_request_streams {
                                    request_data_streams(&*connection, &target, &config).await;
                                    streams_requested = true;
                                }
                                if !capabilities_requested && config.auto_request_capabilities {
                                    request_autopilot_capabilities(&*connection, &target, &config).await;
                                    capabilities_requested = true;
                                }
                            }
                        }

                        update_state(&header, &msg, &state_writers, &vehicle_target, &event_bus);
                        router.route(&msg);
                    }
                    Err(err) => {
                        warn!("MAVLink recv error: {err}");
                        set_link_state(&state_writers, &event_bus, LinkState::Error(err.to_string()));
                        break;
                    }
                }
            }
        }
    }
}

async fn request_home_position(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    target: &VehicleTarget,
    config: &VehicleConfig,
) {
    let _ = connection
        .send(
            &MavHeader {
                system_id: config.gcs_system_id,
                component_id: config.gcs_component_id,
                sequence: 0,
            },
            &common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                command: MavCmd::MAV_CMD_REQUEST_MESSAGE,
                confirmation: 0,
                param1: 242.0, // HOME_POSITION message ID
                param2: 0.0,
                param3: 0.0,
                param4: 0.0,
                param5: 0.0,
                param6: 0.0,
                param7: 0.0,
            }),
        )
        .await;
}

async fn request_data_streams(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    target: &VehicleTarget,
    config: &VehicleConfig,
) {
    for (stream, multiplier) in STREAM_SCHEDULE {
        let _ = connection
            .send(
                &MavHeader {
                    system_id: config.gcs_system_id,
                    component_id: config.gcs_component_id,
                    sequence: 0,
                },
                &common::MavMessage::REQUEST_DATA_STREAM(common::REQUEST_DATA_STREAM_DATA {
                    target_system: target.system_id,
                    target_component: target.component_id,
                    req_stream_id: *stream as u8,
                    req_message_rate: config.stream_rate_hz * multiplier,
                    start_stop: 1,
                }),
            )
            .await;
    }
}

async fn request_autopilot_capabilities(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    target: &VehicleTarget,
    config: &VehicleConfig,
) {
    let _ = connection
        .send(
            &MavHeader {
                system_id: config.gcs_system_id,
                component_id: config.gcs_component_id,
                sequence: 0,
            },
            &common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                command: MavCmd::MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES,
                confirmation: 0,
                param1: 1.0,
                param2: 0.0,
                param3: 0.0,
                param4: 0.0,
                param5: 0.0,
                param6: 0.0,
                param7: 0.0,
            }),
        )
        .await;
}

/// Returns `true` the moment a target is adopted for the first time.
fn update_vehicle_target(
    vehicle_target: &mut Option<VehicleTarget>,
    header: &MavHeader,
    message: &common::MavMessage,
) -> bool {
    if header.system_id == 0 {
        return false;
    }

    let was_none = vehicle_target.is_none();

    if let common::MavMessage::HEARTBEAT(hb) = message {
        *vehicle_target = Some(VehicleTarget {
            system_id: header.system_id,
            component_id: header.component_id,
            autopilot: hb.autopilot,
            vehicle_type: hb.mavtype,
        });
    } else if vehicle_target.is_none() {
        *vehicle_target = Some(VehicleTarget {
            system_id: header.system_id,
            component_id: header.component_id,
            autopilot: common::MavAutopilot::MAV_AUTOPILOT_GENERIC,
            vehicle_type: common::MavType::MAV_TYPE_GENERIC,
        });
    }

    was_none && vehicle_target.is_some()
}

fn update_state(
    _header: &MavHeader,
    message: &common::MavMessage,
    writers: &StateWriters,
    vehicle_target: &Option<VehicleTarget>,
    event_bus: &EventBus,
) {
    match message {
        common::MavMessage::HEARTBEAT(hb) => {
            if let Some(target) = vehicle_target {
                let autopilot_type = AutopilotType::from_mav(target.autopilot);
                let vtype = VehicleType::from_mav(target.vehicle_type);
                let armed = hb
                    .base_mode
                    .contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                let mode_name = crate::modes::mode_name(autopilot_type, vtype, hb.custom_mode);

                let new_state = VehicleState {
                    system_id: target.system_id,
                    component_id: target.component_id,
                    armed,
                    custom_mode: hb.custom_mode,
                    mode_name,
                    system_status: SystemStatus::from_mav(hb.system_status),
                    vehicle_type: vtype,
                    autopilot: autopilot_type,
                };
                let old_state = writers.vehicle_state.borrow().clone();
                if old_state != new_state {
                    publish_attribute_change(
                        event_bus,
                        "vehicle_state",
                        Some(AttributeValue::VehicleState(old_state.clone())),
                        AttributeValue::VehicleState(new_state.clone()),
                    );
                }
                // "mode"/"armed" are cached attributes: notify only on the
                // specific field changing, not on every bundled HEARTBEAT
                // (e.g. a system_status transition must not count as a mode
                // change).
                if old_state.mode_name != new_state.mode_name {
                    publish_attribute_change(
                        event_bus,
                        "mode",
                        Some(AttributeValue::Text(old_state.mode_name.clone())),
                        AttributeValue::Text(new_state.mode_name.clone()),
                    );
                }
                if old_state.armed != new_state.armed {
                    publish_attribute_change(
                        event_bus,
                        "armed",
                        Some(AttributeValue::Bool(old_state.armed)),
                        AttributeValue::Bool(new_state.armed),
                    );
                }
                let _ = writers.vehicle_state.send(new_state);
            }
        }
        common::MavMessage::VFR_HUD(data) => {
            writers.telemetry.send_modify(|t| {
                t.altitude_m = Some(data.alt as f64);
                t.speed_mps = Some(data.groundspeed as f64);
                t.heading_deg = Some(data.heading as f64);
            });
            publish_attribute_change(
                event_bus,
                "telemetry",
                None,
                AttributeValue::Telemetry(writers.telemetry.borrow().clone()),
            );
        }
        common::MavMessage::GLOBAL_POSITION_INT(data) => {
            let lat = data.lat as f64 / 1e7;
            let lon = data.lon as f64 / 1e7;
            let relative_alt_m = data.relative_alt as f64 / 1000.0;

            writers.telemetry.send_modify(|t| {
                t.latitude_deg = Some(lat);
                t.longitude_deg = Some(lon);
                t.altitude_m = Some(relative_alt_m);
                let vx = data.vx as f64 / 100.0;
                let vy = data.vy as f64 / 100.0;
                t.speed_mps = Some((vx * vx + vy * vy).sqrt());
                if data.hdg != u16::MAX {
                    t.heading_deg = Some(data.hdg as f64 / 100.0);
                }
            });
            publish_attribute_change(
                event_bus,
                "telemetry",
                None,
                AttributeValue::Telemetry(writers.telemetry.borrow().clone()),
            );

            let _ = writers.global_relative_frame.send(LocationGlobalRelative {
                latitude_deg: lat,
                longitude_deg: lon,
                altitude_m: relative_alt_m,
            });

            writers.global_frame.send_modify(|g| {
                g.latitude_deg = lat;
                g.longitude_deg = lon;
                // Barometer boot noise means `alt` can read zero for the first
                // few frames; don't surface MSL altitude until it moves.
                if data.alt != 0 {
                    g.altitude_m = Some(data.alt as f64 / 1000.0);
                }
            });
        }
        common::MavMessage::ATTITUDE(data) => {
            let attitude = Attitude {
                pitch: data.pitch,
                roll: data.roll,
                yaw: data.yaw,
            };
            // Streaming attribute: notify on every update, no cache gating.
            publish_attribute_change(event_bus, "attitude", None, AttributeValue::Attitude(attitude));
            let _ = writers.attitude.send(attitude);
        }
        common::MavMessage::LOCAL_POSITION_NED(data) => {
            let _ = writers.local_frame.send(LocationLocal {
                north_m: data.x,
                east_m: data.y,
                down_m: data.z,
            });
        }
        common::MavMessage::EKF_STATUS_REPORT(data) => {
            let _ = writers.ekf_status.send(EkfStatus {
                velocity_variance: data.velocity_variance,
                pos_horiz_variance: data.pos_horiz_variance,
                pos_vert_variance: data.pos_vert_variance,
                compass_variance: data.compass_variance,
                terrain_alt_variance: data.terrain_alt_variance,
                flags: data.flags.bits(),
            });
        }
        common::MavMessage::AUTOPILOT_VERSION(data) => {
            let _ = writers.version.send(Some(VehicleVersion::from_raw(
                data.flight_sw_version,
                data.capabilities.bits(),
            )));
        }
        common::MavMessage::MOUNT_STATUS(data) => {
            let _ = writers.mount_attitude.send(MountAttitude {
                pitch_deg: data.pointing_a as f32 / 100.0,
                roll_deg: data.pointing_b as f32 / 100.0,
                yaw_deg: data.pointing_c as f32 / 100.0,
            });
        }
        common::MavMessage::MOUNT_ORIENTATION(data) => {
            let _ = writers.mount_attitude.send(MountAttitude {
                pitch_deg: data.pitch,
                roll_deg: data.roll,
                yaw_deg: data.yaw,
            });
        }
        common::MavMessage::RANGEFINDER(data) => {
            let _ = writers.rangefinder.send(Some(RangefinderReading {
                distance_m: data.distance,
                voltage: data.voltage,
            }));
        }
        common::MavMessage::WIND(data) => {
            let _ = writers.wind.send(Some(WindReading {
                direction_deg: data.direction,
                speed_mps: data.speed,
                speed_z_mps: data.speed_z,
            }));
        }
        common::MavMessage::RC_CHANNELS_RAW(data) => {
            let raw = [
                data.chan1_raw,
                data.chan2_raw,
                data.chan3_raw,
                data.chan4_raw,
                data.chan5_raw,
                data.chan6_raw,
                data.chan7_raw,
                data.chan8_raw,
            ];
            writers.channels.send_modify(|table| {
                for (i, value) in raw.into_iter().enumerate() {
                    table.channels[i] = if value == u16::MAX { None } else { Some(value) };
                }
                table.rssi = if data.rssi == 255 { None } else { Some(data.rssi) };
            });
        }
        common::MavMessage::RC_CHANNELS(data) => {
            let raw = [
                data.chan1_raw,
                data.chan2_raw,
                data.chan3_raw,
                data.chan4_raw,
                data.chan5_raw,
                data.chan6_raw,
                data.chan7_raw,
                data.chan8_raw,
                data.chan9_raw,
                data.chan10_raw,
                data.chan11_raw,
                data.chan12_raw,
                data.chan13_raw,
                data.chan14_raw,
                data.chan15_raw,
                data.chan16_raw,
                data.chan17_raw,
                data.chan18_raw,
            ];
            let count = data.chancount as usize;
            writers.channels.send_modify(|table| {
                for (i, value) in raw.into_iter().enumerate() {
                    table.channels[i] = if i >= count || value == u16::MAX {
                        None
                    } else {
                        Some(value)
                    };
                }
                table.rssi = if data.rssi == 255 { None } else { Some(data.rssi) };
            });
        }
        common::MavMessage::SYS_STATUS(data) => {
            writers.telemetry.send_modify(|t| {
                t.battery = Battery {
                    voltage_v: if data.voltage_battery == u16::MAX {
                        None
                    } else {
                        Some(data.voltage_battery as f32 / 1000.0)
                    },
                    current_a: if data.current_battery < 0 {
                        None
                    } else {
                        Some(data.current_battery as f32 / 100.0)
                    },
                    level_pct: if data.battery_remaining < 0 {
                        None
                    } else {
                        Some(data.battery_remaining)
                    },
                };
            });
            publish_attribute_change(
                event_bus,
                "telemetry",
                None,
                AttributeValue::Telemetry(writers.telemetry.borrow().clone()),
            );
            // Streaming attribute: notify on every update, no cache gating.
            publish_attribute_change(
                event_bus,
                "battery",
                None,
                AttributeValue::Battery(writers.telemetry.borrow().battery),
            );
        }
        common::MavMessage::GPS_RAW_INT(data) => {
            writers.telemetry.send_modify(|t| {
                t.gps = GpsInfo {
                    eph: if data.eph == u16::MAX { None } else { Some(data.eph as f32 / 100.0) },
                    epv: if data.epv == u16::MAX { None } else { Some(data.epv as f32 / 100.0) },
                    fix_type: GpsFixType::from_raw(data.fix_type as u8),
                    satellites_visible: if data.satellites_visible == 255 {
                        None
                    } else {
                        Some(data.satellites_visible)
                    },
                };
            });
            publish_attribute_change(
                event_bus,
                "telemetry",
                None,
                AttributeValue::Telemetry(writers.telemetry.borrow().clone()),
            );
            // Streaming attribute: notify on every update, no cache gating.
            publish_attribute_change(
                event_bus,
                "gps_0",
                None,
                AttributeValue::Gps(writers.telemetry.borrow().gps),
            );
        }
        common::MavMessage::MISSION_CURRENT(data) => {
            let new_state = MissionState {
                current_seq: data.seq,
                total_items: data.total,
            };
            publish_attribute_change(
                event_bus,
                "mission_state",
                None,
                AttributeValue::MissionState(new_state.clone()),
            );
            let _ = writers.mission_state.send(new_state);
        }
        common::MavMessage::HOME_POSITION(data) => {
            let _ = writers
                .home_position
                .send(Some(mission::HomePosition {
                    latitude_deg: data.latitude as f64 / 1e7,
                    longitude_deg: data.longitude as f64 / 1e7,
                    altitude_m: (data.altitude as f64 / 1000.0) as f32,
                }));
        }
        common::MavMessage::PARAM_VALUE(data) => {
            let param = param_wire::param_from_value_data(data);
            writers.param_store.send_modify(|store| {
                if store.expected_count == 0 {
                    store.expected_count = data.param_count;
                }
                store.params.insert(param.name.clone(), param);
            });
        }
        _ => {
            trace!("unhandled message type");
        }
    }
}

fn set_link_state(writers: &StateWriters, event_bus: &EventBus, state: LinkState) {
    publish_attribute_change(
        event_bus,
        "link_state",
        None,
        AttributeValue::LinkState(state.clone()),
    );
    let _ = writers.link_state.send(state);
}

fn publish_attribute_change(
    event_bus: &EventBus,
    attribute_name: &'static str,
    old_value: Option<AttributeValue>,
    new_value: AttributeValue,
) {
    event_bus.publish_attribute(AttributeChangedEvent {
        timestamp: Instant::now(),
        attribute_name,
        old_value,
        new_value,
    });
}

// ---------------------------------------------------------------------------
// Command handling
// ---------------------------------------------------------------------------

async fn handle_command(
    cmd: Command,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    channel_overrides: &mut ChannelOverrides,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) {
    match cmd {
        Command::Arm { force, reply } => {
            let result = handle_arm_disarm(true, force, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::Disarm { force, reply } => {
            let result = handle_arm_disarm(false, force, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::SetMode { custom_mode, reply } => {
            let result = handle_set_mode(custom_mode, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::CommandLong { command, params, reply } => {
            let result = handle_command_long(command, params, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::GuidedGoto { lat_e7, lon_e7, alt_m, reply } => {
            let result = handle_guided_goto(lat_e7, lon_e7, alt_m, connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::VelocityNed { vx_mps, vy_mps, vz_mps, reply } => {
            let result = handle_velocity_ned(vx_mps, vy_mps, vz_mps, connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::VelocityGlobal { vx_mps, vy_mps, vz_mps, reply } => {
            let result = handle_velocity_global(vx_mps, vy_mps, vz_mps, connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::ConditionYaw { angle_deg, speed_deg_s, relative, clockwise, reply } => {
            let result = handle_condition_yaw(angle_deg, speed_deg_s, relative, clockwise, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::Reboot { reply } => {
            let result = handle_reboot(connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::ChannelOverrideSet { slots, reply } => {
            let result = handle_channel_override_set(slots, connection, vehicle_target, channel_overrides, writers, config).await;
            let _ = reply.send(result);
        }
        Command::GimbalRotate { pitch_deg, roll_deg, yaw_deg, reply } => {
            let result = handle_gimbal_rotate(pitch_deg, roll_deg, yaw_deg, connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::GimbalTargetLocation { lat_e7, lon_e7, alt_m, home, reply } => {
            let result = handle_gimbal_target_location(lat_e7, lon_e7, alt_m, home, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::GimbalRelease { reply } => {
            let result = handle_gimbal_release(connection, vehicle_target, config).await;
            let _ = reply.send(result);
        }
        Command::MissionUpload { plan, reply } => {
            let result = handle_mission_upload(plan, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::MissionDownload { mission_type, reply } => {
            let result = handle_mission_download(mission_type, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::MissionClear { mission_type, reply } => {
            let result = handle_mission_clear(mission_type, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::MissionSetCurrent { seq, reply } => {
            let result = handle_mission_set_current(seq, connection, writers, event_bus, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::MissionCancelTransfer => {
            writers.transfer_cancel.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
        }
        Command::ParamDownloadAll { reply } => {
            let result = handle_param_download_all(connection, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::ParamWrite { name, value, reply } => {
            let result = handle_param_write(name, value, connection, vehicle_target, config, cancel).await;
            let _ = reply.send(result);
        }
        Command::Shutdown => {
            // Handled in the main loop
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

async fn handle_param_download_all(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<ParamStore, VehicleError> {
    let target = get_target(vehicle_target)?;

    send_message(
        connection,
        config,
        common::MavMessage::PARAM_REQUEST_LIST(common::PARAM_REQUEST_LIST_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
        }),
    )
    .await?;

    let mut store = ParamStore::default();
    let mut seen: HashSet<String> = HashSet::new();
    let timeout = Duration::from_millis(config.retry_policy.request_timeout_ms.max(1000) * 10);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        if store.expected_count > 0 && seen.len() as u16 >= store.expected_count {
            return Ok(store);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VehicleError::Cancelled),
            _ = &mut deadline => {
                if seen.is_empty() {
                    return Err(VehicleError::Timeout);
                }
                // Partial download: the link went quiet mid-transfer. Return
                // what arrived rather than discarding it.
                return Ok(store);
            }
            result = connection.recv() => {
                let (header, msg) = result.map_err(|err| {
                    VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                })?;
                update_vehicle_target(vehicle_target, &header, &msg);
                if let common::MavMessage::PARAM_VALUE(data) = &msg {
                    let param = param_wire::param_from_value_data(data);
                    if store.expected_count == 0 {
                        store.expected_count = data.param_count;
                    }
                    seen.insert(param.name.clone());
                    store.params.insert(param.name.clone(), param);
                }
            }
        }
    }
}

/// Sends `PARAM_SET` and polls for the confirming `PARAM_VALUE`, retrying up
/// to 3 times at 1s each. Matches the spec's "Timeout on parameter set
/// returns `false` rather than raising": exhausting retries is a normal
/// `Ok(false)`, not an error — only a dead transport or cancellation raises.
async fn handle_param_write(
    name: String,
    value: f32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<bool, VehicleError> {
    let target = get_target(vehicle_target)?;
    let name_upper = name.to_uppercase();

    for _attempt in 0..3 {
        send_message(
            connection,
            config,
            common::MavMessage::PARAM_SET(common::PARAM_SET_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                param_id: param_wire::param_id_from_name(&name_upper),
                param_value: value,
                param_type: param_wire::param_type_to_mav(crate::params::ParamType::Real32),
            }),
        )
        .await?;

        let deadline = tokio::time::sleep(Duration::from_secs(1));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(VehicleError::Cancelled),
                _ = &mut deadline => break, // retry
                result = connection.recv() => {
                    let (header, msg) = result.map_err(|err| {
                        VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                    })?;
                    update_vehicle_target(vehicle_target, &header, &msg);
                    if let common::MavMessage::PARAM_VALUE(data) = &msg {
                        let param = param_wire::param_from_value_data(data);
                        if param.name == name_upper && (param.value - value).abs() < f32::EPSILON {
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    Ok(false)
}

// ---------------------------------------------------------------------------
// Helpers: send message, wait for response
// ---------------------------------------------------------------------------

async fn send_message(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    config: &VehicleConfig,
    message: common::MavMessage,
) -> Result<(), VehicleError> {
    connection
        .send(
            &MavHeader {
                system_id: config.gcs_system_id,
                component_id: config.gcs_component_id,
                sequence: 0,
            },
            &message,
        )
        .await
        .map(|_| ())
        .map_err(|err| VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string())))
}

/// Wait for a message matching `predicate`, continuing to update state for
/// all other messages received in the meantime.
async fn wait_for_response<F, T>(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    cancel: &CancellationToken,
    timeout: Duration,
    mut predicate: F,
) -> Result<T, VehicleError>
where
    F: FnMut(&MavHeader, &common::MavMessage) -> Option<T>,
{
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VehicleError::Cancelled),
            _ = &mut deadline => return Err(VehicleError::Timeout),
            result = connection.recv() => {
                let (header, msg) = result.map_err(|err| {
                    VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                })?;
                update_vehicle_target(vehicle_target, &header, &msg);
                update_state(&header, &msg, writers, vehicle_target, event_bus);
                if let Some(val) = predicate(&header, &msg) {
                    return Ok(val);
                }
            }
        }
    }
}

fn get_target(vehicle_target: &Option<VehicleTarget>) -> Result<VehicleTarget, VehicleError> {
    vehicle_target.ok_or(VehicleError::IdentityUnknown)
}

// ---------------------------------------------------------------------------
// Arm / Disarm
// ---------------------------------------------------------------------------

async fn handle_arm_disarm(
    arm: bool,
    force: bool,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let param1 = if arm { 1.0 } else { 0.0 };
    let param2 = if force {
        if arm { MAGIC_FORCE_ARM_VALUE } else { MAGIC_FORCE_DISARM_VALUE }
    } else {
        0.0
    };

    send_command_long_ack(
        MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
        [param1, param2, 0.0, 0.0, 0.0, 0.0, 0.0],
        target,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn send_command_long_ack(
    command: MavCmd,
    params: [f32; 7],
    target: VehicleTarget,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let retry_policy = &config.retry_policy;
    for _attempt in 0..=retry_policy.max_retries {
        send_message(
            connection,
            config,
            common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                command,
                confirmation: 0,
                param1: params[0],
                param2: params[1],
                param3: params[2],
                param4: params[3],
                param5: params[4],
                param6: params[5],
                param7: params[6],
            }),
        )
        .await?;

        let timeout = Duration::from_millis(retry_policy.request_timeout_ms);
        let ack = wait_for_response(connection, writers, event_bus, vehicle_target, cancel, timeout, |_header, msg| {
            if let common::MavMessage::COMMAND_ACK(ack) = msg {
                if ack.command == command {
                    return Some(ack.result);
                }
            }
            None
        })
        .await;

        match ack {
            Ok(common::MavResult::MAV_RESULT_ACCEPTED) => return Ok(()),
            Ok(result) => {
                return Err(VehicleError::CommandRejected {
                    command: format!("{command:?}"),
                    result: format!("{result:?}"),
                });
            }
            Err(VehicleError::Timeout) => continue, // retry
            Err(other) => return Err(other),
        }
    }

    Err(VehicleError::Timeout)
}

// ---------------------------------------------------------------------------
// Set mode
// ---------------------------------------------------------------------------

async fn handle_set_mode(
    custom_mode: u32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;

    // PX4 splits `custom_mode` into separate main/sub-mode params on the
    // wire; ArduPilot sends the flat mode number through param2 directly.
    let mode_params = if target.autopilot == common::MavAutopilot::MAV_AUTOPILOT_PX4 {
        let (main_mode, sub_mode) = crate::modes::px4_unpack(custom_mode);
        [1.0, main_mode as f32, sub_mode as f32, 0.0, 0.0, 0.0, 0.0]
    } else {
        [1.0, custom_mode as f32, 0.0, 0.0, 0.0, 0.0, 0.0]
    };

    // Try COMMAND_LONG(DO_SET_MODE) first
    let do_set_mode_result = send_command_long_ack(
        MavCmd::MAV_CMD_DO_SET_MODE,
        mode_params,
        target,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
    )
    .await;

    if do_set_mode_result.is_ok() {
        return Ok(());
    }

    // Fallback: wait for confirming heartbeat
    wait_for_response(
        connection,
        writers,
        event_bus,
        vehicle_target,
        cancel,
        Duration::from_secs(2),
        |_header, msg| match msg {
            common::MavMessage::HEARTBEAT(hb) if hb.custom_mode == custom_mode => Some(()),
            _ => None,
        },
    )
    .await
    .map_err(|_| VehicleError::CommandRejected {
        command: format!("DO_SET_MODE({custom_mode})"),
        result: "no confirming HEARTBEAT".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Generic COMMAND_LONG (public API)
// ---------------------------------------------------------------------------

async fn handle_command_long(
    command: MavCmd,
    params: [f32; 7],
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    send_command_long_ack(command, params, target, connection, writers, event_bus, vehicle_target, config, cancel).await
}

// ---------------------------------------------------------------------------
// Guided goto / velocity / yaw / reboot
// ---------------------------------------------------------------------------

/// Sends a single `MISSION_ITEM_INT` with `current = 2`: the guided-mode
/// "go here now" item, distinct from uploading a stored mission item.
async fn handle_guided_goto(
    lat_e7: i32,
    lon_e7: i32,
    alt_m: f32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;

    send_message(
        connection,
        config,
        common::MavMessage::MISSION_ITEM_INT(common::MISSION_ITEM_INT_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            seq: 0,
            frame: common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT,
            current: 2,
            autocontinue: 1,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: lat_e7,
            y: lon_e7,
            z: alt_m,
            mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        }),
    )
    .await
}

async fn handle_velocity_ned(
    vx_mps: f32,
    vy_mps: f32,
    vz_mps: f32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let type_mask = common::PositionTargetTypemask::from_bits_truncate(0x0DC7);

    send_message(
        connection,
        config,
        common::MavMessage::SET_POSITION_TARGET_LOCAL_NED(
            common::SET_POSITION_TARGET_LOCAL_NED_DATA {
                time_boot_ms: 0,
                target_system: target.system_id,
                target_component: target.component_id,
                coordinate_frame: common::MavFrame::MAV_FRAME_LOCAL_NED,
                type_mask,
                x: 0.0,
                y: 0.0,
                z: 0.0,
                vx: vx_mps,
                vy: vy_mps,
                vz: vz_mps,
                afx: 0.0,
                afy: 0.0,
                afz: 0.0,
                yaw: 0.0,
                yaw_rate: 0.0,
            },
        ),
    )
    .await
}

async fn handle_velocity_global(
    vx_mps: f32,
    vy_mps: f32,
    vz_mps: f32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let type_mask = common::PositionTargetTypemask::from_bits_truncate(0x0DC7);

    send_message(
        connection,
        config,
        common::MavMessage::SET_POSITION_TARGET_GLOBAL_INT(
            common::SET_POSITION_TARGET_GLOBAL_INT_DATA {
                time_boot_ms: 0,
                target_system: target.system_id,
                target_component: target.component_id,
                coordinate_frame: common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
                type_mask,
                lat_int: 0,
                lon_int: 0,
                alt: 0.0,
                vx: vx_mps,
                vy: vy_mps,
                vz: vz_mps,
                afx: 0.0,
                afy: 0.0,
                afz: 0.0,
                yaw: 0.0,
                yaw_rate: 0.0,
            },
        ),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn handle_condition_yaw(
    angle_deg: f32,
    speed_deg_s: f32,
    relative: bool,
    clockwise: bool,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let direction = if clockwise { 1.0 } else { -1.0 };
    let is_relative = if relative { 1.0 } else { 0.0 };

    send_command_long_ack(
        MavCmd::MAV_CMD_CONDITION_YAW,
        [angle_deg, speed_deg_s, direction, is_relative, 0.0, 0.0, 0.0],
        target,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
    )
    .await
}

async fn handle_reboot(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    send_message(
        connection,
        config,
        common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            command: MavCmd::MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
            confirmation: 0,
            param1: 1.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
        }),
    )
    .await
}

// ---------------------------------------------------------------------------
// RC channel overrides
// ---------------------------------------------------------------------------

async fn handle_channel_override_set(
    slots: [Option<u16>; 8],
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    channel_overrides: &mut ChannelOverrides,
    writers: &StateWriters,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    apply_channel_overrides(channel_overrides, slots);
    let _ = writers.channel_overrides.send(*channel_overrides);
    send_channel_overrides(connection, vehicle_target, channel_overrides, config).await
}

async fn send_channel_overrides(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    channel_overrides: &ChannelOverrides,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    send_message(
        connection,
        config,
        common::MavMessage::RC_CHANNELS_OVERRIDE(common::RC_CHANNELS_OVERRIDE_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            chan1_raw: channel_overrides[0],
            chan2_raw: channel_overrides[1],
            chan3_raw: channel_overrides[2],
            chan4_raw: channel_overrides[3],
            chan5_raw: channel_overrides[4],
            chan6_raw: channel_overrides[5],
            chan7_raw: channel_overrides[6],
            chan8_raw: channel_overrides[7],
        }),
    )
    .await
}

// ---------------------------------------------------------------------------
// Gimbal / mount control
// ---------------------------------------------------------------------------

async fn set_mount_mode(
    mode: common::MavMountMode,
    stabilize: bool,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    target: VehicleTarget,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let stab = u8::from(stabilize);
    send_message(
        connection,
        config,
        common::MavMessage::MOUNT_CONFIGURE(common::MOUNT_CONFIGURE_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            mount_mode: mode,
            stab_roll: stab,
            stab_pitch: stab,
            stab_yaw: stab,
        }),
    )
    .await
}

async fn handle_gimbal_rotate(
    pitch_deg: f32,
    roll_deg: f32,
    yaw_deg: f32,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    set_mount_mode(
        common::MavMountMode::MAV_MOUNT_MODE_MAVLINK_TARGETING,
        true,
        connection,
        target,
        config,
    )
    .await?;

    send_message(
        connection,
        config,
        common::MavMessage::MOUNT_CONTROL(common::MOUNT_CONTROL_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            input_a: degrees_to_centidegrees(pitch_deg),
            input_b: degrees_to_centidegrees(roll_deg),
            input_c: degrees_to_centidegrees(yaw_deg),
            save_position: 0,
        }),
    )
    .await
}

fn degrees_to_centidegrees(deg: f32) -> i32 {
    (deg * 100.0) as i32
}

/// Applies a bulk override replacement onto the 8-slot table, `None` clearing
/// a slot to the wire value `0`.
fn apply_channel_overrides(overrides: &mut ChannelOverrides, slots: [Option<u16>; 8]) {
    for (i, slot) in slots.into_iter().enumerate() {
        overrides[i] = slot.unwrap_or(0);
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_gimbal_target_location(
    lat_e7: i32,
    lon_e7: i32,
    alt_msl_m: f64,
    home: Option<mission::HomePosition>,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let Some(home) = home else {
        return Err(VehicleError::InvalidArgument(
            "gimbal target_location requires home to convert MSL altitude to relative".to_string(),
        ));
    };
    let target = get_target(vehicle_target)?;
    let relative_alt_m = (alt_msl_m - home.altitude_m as f64) as f32;

    set_mount_mode(
        common::MavMountMode::MAV_MOUNT_MODE_GPS_POINT,
        true,
        connection,
        target,
        config,
    )
    .await?;

    send_command_long_ack(
        MavCmd::MAV_CMD_DO_SET_ROI,
        [
            0.0,
            0.0,
            0.0,
            0.0,
            lat_e7 as f32 / 1e7,
            lon_e7 as f32 / 1e7,
            relative_alt_m,
        ],
        target,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
    )
    .await
}

async fn handle_gimbal_release(
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    set_mount_mode(
        common::MavMountMode::MAV_MOUNT_MODE_RC_TARGETING,
        false,
        connection,
        target,
        config,
    )
    .await
}

// ---------------------------------------------------------------------------
// Mission operations
// ---------------------------------------------------------------------------

fn to_mav_mission_type(mission_type: MissionType) -> common::MavMissionType {
    match mission_type {
        MissionType::Mission => common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        MissionType::Fence => common::MavMissionType::MAV_MISSION_TYPE_FENCE,
        MissionType::Rally => common::MavMissionType::MAV_MISSION_TYPE_RALLY,
    }
}

fn to_mav_frame(frame: MissionFrame) -> common::MavFrame {
    match frame {
        MissionFrame::Mission => common::MavFrame::MAV_FRAME_MISSION,
        MissionFrame::GlobalInt => common::MavFrame::MAV_FRAME_GLOBAL,
        MissionFrame::GlobalRelativeAltInt => common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
        MissionFrame::GlobalTerrainAltInt => common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT,
        MissionFrame::LocalNed => common::MavFrame::MAV_FRAME_LOCAL_NED,
        MissionFrame::Other => common::MavFrame::MAV_FRAME_MISSION,
    }
}

#[allow(deprecated)]
fn from_mav_frame(frame: common::MavFrame) -> MissionFrame {
    match frame {
        common::MavFrame::MAV_FRAME_MISSION => MissionFrame::Mission,
        common::MavFrame::MAV_FRAME_GLOBAL | common::MavFrame::MAV_FRAME_GLOBAL_INT => {
            MissionFrame::GlobalInt
        }
        common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
        | common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT => MissionFrame::GlobalRelativeAltInt,
        common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT
        | common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT_INT => MissionFrame::GlobalTerrainAltInt,
        common::MavFrame::MAV_FRAME_LOCAL_NED => MissionFrame::LocalNed,
        _ => MissionFrame::Other,
    }
}

fn from_mission_item_int(data: &common::MISSION_ITEM_INT_DATA) -> MissionItem {
    MissionItem {
        seq: data.seq,
        command: data.command as u16,
        frame: from_mav_frame(data.frame),
        current: data.current > 0,
        autocontinue: data.autocontinue > 0,
        param1: data.param1,
        param2: data.param2,
        param3: data.param3,
        param4: data.param4,
        x: data.x,
        y: data.y,
        z: data.z,
    }
}

#[allow(deprecated)]
fn from_mission_item_float(data: &common::MISSION_ITEM_DATA) -> MissionItem {
    let is_global = matches!(
        data.frame,
        common::MavFrame::MAV_FRAME_GLOBAL
            | common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
            | common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT
            | common::MavFrame::MAV_FRAME_GLOBAL_INT
            | common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
            | common::MavFrame::MAV_FRAME_GLOBAL_TERRAIN_ALT_INT
    );

    MissionItem {
        seq: data.seq,
        command: data.command as u16,
        frame: from_mav_frame(data.frame),
        current: data.current > 0,
        autocontinue: data.autocontinue > 0,
        param1: data.param1,
        param2: data.param2,
        param3: data.param3,
        param4: data.param4,
        x: if is_global { (data.x as f64 * 1e7) as i32 } else { data.x as i32 },
        y: if is_global { (data.y as f64 * 1e7) as i32 } else { data.y as i32 },
        z: data.z,
    }
}

fn mission_type_matches(received: common::MavMissionType, expected: MissionType) -> bool {
    let expected_mav = to_mav_mission_type(expected);
    if expected == MissionType::Mission {
        received == expected_mav || received == common::MavMissionType::MAV_MISSION_TYPE_MISSION
    } else {
        received == expected_mav
    }
}

fn send_requested_item_msg(
    wire_items: &[MissionItem],
    target: VehicleTarget,
    mission_type: MissionType,
    seq: u16,
) -> Result<common::MavMessage, VehicleError> {
    let item = wire_items
        .get(seq as usize)
        .ok_or_else(|| VehicleError::MissionTransfer {
            code: "item_out_of_range".to_string(),
            message: format!("requested item {seq} out of range"),
        })?;

    let command = num_traits::FromPrimitive::from_u16(item.command)
        .ok_or_else(|| VehicleError::MissionTransfer {
            code: "unsupported_command".to_string(),
            message: format!("unsupported MAV_CMD value {}", item.command),
        })?;
    let frame = to_mav_frame(item.frame);

    Ok(common::MavMessage::MISSION_ITEM_INT(
        common::MISSION_ITEM_INT_DATA {
            param1: item.param1,
            param2: item.param2,
            param3: item.param3,
            param4: item.param4,
            x: item.x,
            y: item.y,
            z: item.z,
            seq: item.seq,
            command,
            target_system: target.system_id,
            target_component: target.component_id,
            frame,
            current: 0,
            autocontinue: u8::from(item.autocontinue),
            mission_type: to_mav_mission_type(mission_type),
        },
    ))
}

/// Returns `true` once `transfer_cancel` has been bumped since `start_epoch`.
fn transfer_was_cancelled(rx: &watch::Receiver<u64>, start_epoch: u64) -> bool {
    *rx.borrow() != start_epoch
}

// ---------------------------------------------------------------------------
// Mission Upload
// ---------------------------------------------------------------------------

#[allow(deprecated)]
async fn handle_mission_upload(
    plan: MissionPlan,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    // Validate
    let issues = mission::validate_plan(&plan);
    if let Some(issue) = issues.iter().find(|i| i.severity == IssueSeverity::Error) {
        return Err(VehicleError::MissionValidation(format!(
            "{}: {}",
            issue.code, issue.message
        )));
    }

    let wire_items = mission::items_for_wire_upload(&plan);
    let target = get_target(vehicle_target)?;
    let mav_mission_type = to_mav_mission_type(plan.mission_type);
    let mut transfer_cancel_rx = writers.transfer_cancel.subscribe();
    let start_epoch = *transfer_cancel_rx.borrow();

    let mut machine = MissionTransferMachine::new_upload(
        plan.mission_type,
        wire_items.len() as u16,
        config.retry_policy,
    );
    let _ = writers.mission_progress.send(Some(machine.progress()));

    let count_msg = common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
        count: wire_items.len() as u16,
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: mav_mission_type,
        opaque_id: 0,
    });

    send_message(connection, config, count_msg.clone()).await?;

    // If empty plan, just wait for ACK
    if wire_items.is_empty() {
        return wait_for_mission_ack(
            &mut machine,
            plan.mission_type,
            connection,
            writers,
            event_bus,
            vehicle_target,
            config,
            cancel,
            &mut transfer_cancel_rx,
            start_epoch,
            || count_msg.clone(),
        )
        .await;
    }

    let mut acknowledged = HashSet::<u16>::new();

    // Wait for MISSION_REQUEST_INT / MISSION_REQUEST messages
    while machine.progress().phase != TransferPhase::AwaitAck {
        let timeout = Duration::from_millis(machine.timeout_ms());
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let msg = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    machine.cancel();
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::Cancelled);
                }
                _ = transfer_cancel_rx.changed() => {
                    if transfer_was_cancelled(&transfer_cancel_rx, start_epoch) {
                        machine.cancel();
                        let _ = writers.mission_progress.send(Some(machine.progress()));
                        return Err(VehicleError::Cancelled);
                    }
                }
                _ = &mut deadline => {
                    if let Some(err) = machine.on_timeout() {
                        let _ = writers.mission_progress.send(Some(machine.progress()));
                        return Err(VehicleError::MissionTransfer {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    send_message(connection, config, count_msg.clone()).await?;
                    break None;
                }
                result = connection.recv() => {
                    let (header, msg) = result.map_err(|err| {
                        VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                    })?;
                    update_vehicle_target(vehicle_target, &header, &msg);
                    update_state(&header, &msg, writers, vehicle_target, event_bus);

                    match &msg {
                        common::MavMessage::MISSION_REQUEST_INT(data) if data.mission_type == mav_mission_type => {
                            break Some(("int", data.seq));
                        }
                        common::MavMessage::MISSION_REQUEST(data) if data.mission_type == mav_mission_type => {
                            break Some(("req", data.seq));
                        }
                        common::MavMessage::MISSION_ACK(data) if data.mission_type == mav_mission_type => {
                            if data.mavtype == common::MavMissionResult::MAV_MISSION_ACCEPTED {
                                machine.on_ack_success();
                                let _ = writers.mission_progress.send(Some(machine.progress()));
                                return Ok(());
                            }
                            return Err(VehicleError::MissionTransfer {
                                code: "transfer.ack_error".to_string(),
                                message: format!("MISSION_ACK error: {:?}", data.mavtype),
                            });
                        }
                        _ => {}
                    }
                    continue;
                }
            }
        };

        if let Some((_kind, seq)) = msg {
            let item_msg = send_requested_item_msg(&wire_items, target, plan.mission_type, seq)?;
            send_message(connection, config, item_msg).await?;
            if acknowledged.insert(seq) {
                machine.on_item_transferred();
                let _ = writers.mission_progress.send(Some(machine.progress()));
            }
        }
    }

    // Await final ACK
    wait_for_mission_ack(
        &mut machine,
        plan.mission_type,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
        &mut transfer_cancel_rx,
        start_epoch,
        || count_msg.clone(),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn wait_for_mission_ack<F>(
    machine: &mut MissionTransferMachine,
    mission_type: MissionType,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
    transfer_cancel_rx: &mut watch::Receiver<u64>,
    start_epoch: u64,
    retry_msg: F,
) -> Result<(), VehicleError>
where
    F: Fn() -> common::MavMessage,
{
    let mav_mission_type = to_mav_mission_type(mission_type);
    loop {
        let timeout = Duration::from_millis(machine.timeout_ms());
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                machine.cancel();
                let _ = writers.mission_progress.send(Some(machine.progress()));
                return Err(VehicleError::Cancelled);
            }
            _ = transfer_cancel_rx.changed() => {
                if transfer_was_cancelled(transfer_cancel_rx, start_epoch) {
                    machine.cancel();
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::Cancelled);
                }
            }
            _ = &mut deadline => {
                if let Some(err) = machine.on_timeout() {
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::MissionTransfer {
                        code: err.code,
                        message: err.message,
                    });
                }
                let _ = writers.mission_progress.send(Some(machine.progress()));
                send_message(connection, config, retry_msg()).await?;
            }
            result = connection.recv() => {
                let (header, msg) = result.map_err(|err| {
                    VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                })?;
                update_vehicle_target(vehicle_target, &header, &msg);
                update_state(&header, &msg, writers, vehicle_target, event_bus);

                if let common::MavMessage::MISSION_ACK(data) = &msg {
                    if data.mission_type != mav_mission_type {
                        continue;
                    }
                    if data.mavtype == common::MavMissionResult::MAV_MISSION_ACCEPTED {
                        machine.on_ack_success();
                        let _ = writers.mission_progress.send(Some(machine.progress()));
                        return Ok(());
                    }
                    return Err(VehicleError::MissionTransfer {
                        code: "transfer.ack_error".to_string(),
                        message: format!("MISSION_ACK error: {:?}", data.mavtype),
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mission Download
// ---------------------------------------------------------------------------

#[allow(deprecated)]
async fn handle_mission_download(
    mission_type: MissionType,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<MissionPlan, VehicleError> {
    let target = get_target(vehicle_target)?;
    let mav_mission_type = to_mav_mission_type(mission_type);
    let mut machine = MissionTransferMachine::new_download(mission_type, config.retry_policy);
    let _ = writers.mission_progress.send(Some(machine.progress()));
    let mut transfer_cancel_rx = writers.transfer_cancel.subscribe();
    let start_epoch = *transfer_cancel_rx.borrow();

    let request_list_msg = common::MavMessage::MISSION_REQUEST_LIST(
        common::MISSION_REQUEST_LIST_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            mission_type: mav_mission_type,
        },
    );
    send_message(connection, config, request_list_msg.clone()).await?;

    // Wait for MISSION_COUNT
    let count = loop {
        let timeout = Duration::from_millis(machine.timeout_ms());
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                machine.cancel();
                let _ = writers.mission_progress.send(Some(machine.progress()));
                return Err(VehicleError::Cancelled);
            }
            _ = transfer_cancel_rx.changed() => {
                if transfer_was_cancelled(&transfer_cancel_rx, start_epoch) {
                    machine.cancel();
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::Cancelled);
                }
            }
            _ = &mut deadline => {
                if let Some(err) = machine.on_timeout() {
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::MissionTransfer {
                        code: err.code,
                        message: err.message,
                    });
                }
                let _ = writers.mission_progress.send(Some(machine.progress()));
                send_message(connection, config, request_list_msg.clone()).await?;
            }
            result = connection.recv() => {
                let (header, msg) = result.map_err(|err| {
                    VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                })?;
                update_vehicle_target(vehicle_target, &header, &msg);
                update_state(&header, &msg, writers, vehicle_target, event_bus);

                if let common::MavMessage::MISSION_COUNT(data) = &msg {
                    if mission_type_matches(data.mission_type, mission_type) {
                        break data.count;
                    }
                }
            }
        }
    };

    machine.set_download_total(count);
    let _ = writers.mission_progress.send(Some(machine.progress()));

    // Request each item
    let mut items = Vec::with_capacity(count as usize);
    for seq in 0..count {
        let mut use_int_request = true;

        let request_int_msg = common::MavMessage::MISSION_REQUEST_INT(
            common::MISSION_REQUEST_INT_DATA {
                seq,
                target_system: target.system_id,
                target_component: target.component_id,
                mission_type: mav_mission_type,
            },
        );
        let request_float_msg = common::MavMessage::MISSION_REQUEST(
            common::MISSION_REQUEST_DATA {
                seq,
                target_system: target.system_id,
                target_component: target.component_id,
                mission_type: mav_mission_type,
            },
        );

        let make_request_msg = |use_int: bool| -> common::MavMessage {
            if use_int {
                request_int_msg.clone()
            } else {
                request_float_msg.clone()
            }
        };

        send_message(connection, config, make_request_msg(use_int_request)).await?;

        let item = loop {
            let timeout = Duration::from_millis(machine.timeout_ms());
            let deadline = tokio::time::sleep(timeout);
            tokio::pin!(deadline);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    machine.cancel();
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    return Err(VehicleError::Cancelled);
                }
                _ = transfer_cancel_rx.changed() => {
                    if transfer_was_cancelled(&transfer_cancel_rx, start_epoch) {
                        machine.cancel();
                        let _ = writers.mission_progress.send(Some(machine.progress()));
                        return Err(VehicleError::Cancelled);
                    }
                }
                _ = &mut deadline => {
                    if let Some(err) = machine.on_timeout() {
                        let _ = writers.mission_progress.send(Some(machine.progress()));
                        return Err(VehicleError::MissionTransfer {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    let _ = writers.mission_progress.send(Some(machine.progress()));
                    if use_int_request {
                        use_int_request = false;
                    }
                    send_message(connection, config, make_request_msg(use_int_request)).await?;
                }
                result = connection.recv() => {
                    let (header, msg) = result.map_err(|err| {
                        VehicleError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
                    })?;
                    update_vehicle_target(vehicle_target, &header, &msg);
                    update_state(&header, &msg, writers, vehicle_target, event_bus);

                    match &msg {
                        common::MavMessage::MISSION_ITEM_INT(data)
                            if data.seq == seq && mission_type_matches(data.mission_type, mission_type) =>
                        {
                            break from_mission_item_int(data);
                        }
                        common::MavMessage::MISSION_ITEM(data)
                            if data.seq == seq && mission_type_matches(data.mission_type, mission_type) =>
                        {
                            break from_mission_item_float(data);
                        }
                        _ => {}
                    }
                }
            }
        };

        items.push(item);
        machine.on_item_transferred();
        let _ = writers.mission_progress.send(Some(machine.progress()));
    }

    // Send ACK
    let _ = send_message(
        connection,
        config,
        common::MavMessage::MISSION_ACK(common::MISSION_ACK_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            mavtype: common::MavMissionResult::MAV_MISSION_ACCEPTED,
            mission_type: mav_mission_type,
            opaque_id: 0,
        }),
    )
    .await;

    machine.on_ack_success();
    let _ = writers.mission_progress.send(Some(machine.progress()));

    Ok(mission::plan_from_wire_download(mission_type, items))
}

// ---------------------------------------------------------------------------
// Mission Clear
// ---------------------------------------------------------------------------

async fn handle_mission_clear(
    mission_type: MissionType,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let mav_mission_type = to_mav_mission_type(mission_type);

    let mut machine = MissionTransferMachine::new_upload(mission_type, 0, config.retry_policy);
    let _ = writers.mission_progress.send(Some(machine.progress()));
    let mut transfer_cancel_rx = writers.transfer_cancel.subscribe();
    let start_epoch = *transfer_cancel_rx.borrow();

    let clear_msg = common::MavMessage::MISSION_CLEAR_ALL(common::MISSION_CLEAR_ALL_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: mav_mission_type,
    });

    send_message(connection, config, clear_msg.clone()).await?;

    wait_for_mission_ack(
        &mut machine,
        mission_type,
        connection,
        writers,
        event_bus,
        vehicle_target,
        config,
        cancel,
        &mut transfer_cancel_rx,
        start_epoch,
        || clear_msg.clone(),
    )
    .await
}

// ---------------------------------------------------------------------------
// Mission Set Current
// ---------------------------------------------------------------------------

async fn handle_mission_set_current(
    seq: u16,
    connection: &(dyn AsyncMavConnection<common::MavMessage> + Sync + Send),
    writers: &StateWriters,
    event_bus: &EventBus,
    vehicle_target: &mut Option<VehicleTarget>,
    config: &VehicleConfig,
    cancel: &CancellationToken,
) -> Result<(), VehicleError> {
    let target = get_target(vehicle_target)?;
    let retry_policy = &config.retry_policy;

    for _attempt in 0..=retry_policy.max_retries {
        send_message(
            connection,
            config,
            common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                command: MavCmd::MAV_CMD_DO_SET_MISSION_CURRENT,
                confirmation: 0,
                param1: seq as f32,
                param2: 0.0,
                param3: 0.0,
                param4: 0.0,
                param5: 0.0,
                param6: 0.0,
                param7: 0.0,
            }),
        )
        .await?;

        let timeout = Duration::from_millis(retry_policy.request_timeout_ms);
        let result = wait_for_response(connection, writers, event_bus, vehicle_target, cancel, timeout, |_header, msg| {
            match msg {
                common::MavMessage::COMMAND_ACK(data)
                    if data.command == MavCmd::MAV_CMD_DO_SET_MISSION_CURRENT
                        && data.result == common::MavResult::MAV_RESULT_ACCEPTED =>
                {
                    Some(())
                }
                common::MavMessage::MISSION_CURRENT(data) if data.seq == seq => Some(()),
                _ => None,
            }
        })
        .await;

        match result {
            Ok(()) => return Ok(()),
            Err(VehicleError::Timeout) => continue,
            Err(other) => return Err(other),
        }
    }

    Err(VehicleError::MissionTransfer {
        code: "mission.set_current_timeout".to_string(),
        message: "Did not receive confirmation for set-current command".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_mode_and_armed_notify_only_on_change() {
        let (writers, _channels) = crate::state::create_channels();
        let event_bus = EventBus::new();

        let mode_events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let armed_events = Arc::new(std::sync::Mutex::new(Vec::new()));

        let m = mode_events.clone();
        event_bus.subscribe_attribute("mode", crate::event_bus::EventPriority::Normal, move |ev| {
            if let AttributeValue::Text(name) = &ev.new_value {
                m.lock().unwrap().push(name.clone());
            }
        });
        let a = armed_events.clone();
        event_bus.subscribe_attribute("armed", crate::event_bus::EventPriority::Normal, move |ev| {
            if let AttributeValue::Bool(armed) = &ev.new_value {
                a.lock().unwrap().push(*armed);
            }
        });

        let vehicle_target = Some(VehicleTarget {
            system_id: 1,
            component_id: 1,
            autopilot: common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            vehicle_type: common::MavType::MAV_TYPE_QUADROTOR,
        });
        let header = MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        };

        let heartbeat = |custom_mode: u32, armed: bool| {
            common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
                custom_mode,
                mavtype: common::MavType::MAV_TYPE_QUADROTOR,
                autopilot: common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
                base_mode: if armed {
                    MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED
                } else {
                    MavModeFlag::empty()
                },
                system_status: common::MavState::MAV_STATE_STANDBY,
                mavlink_version: 3,
            })
        };

        // STABILIZE (0) -> STABILIZE again (no-op) -> GUIDED (4), then arm
        // without changing mode.
        update_state(&header, &heartbeat(0, false), &writers, &vehicle_target, &event_bus);
        update_state(&header, &heartbeat(0, false), &writers, &vehicle_target, &event_bus);
        update_state(&header, &heartbeat(4, false), &writers, &vehicle_target, &event_bus);
        update_state(&header, &heartbeat(4, true), &writers, &vehicle_target, &event_bus);

        assert_eq!(
            *mode_events.lock().unwrap(),
            vec!["STABILIZE".to_string(), "GUIDED".to_string()]
        );
        assert_eq!(*armed_events.lock().unwrap(), vec![true]);
    }

    #[test]
    fn attitude_notifies_on_every_update_without_cache_gating() {
        let (writers, _channels) = crate::state::create_channels();
        let event_bus = EventBus::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        event_bus.subscribe_attribute("attitude", crate::event_bus::EventPriority::Normal, move |_| {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let header = MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        };
        let attitude_msg = common::MavMessage::ATTITUDE(common::ATTITUDE_DATA {
            time_boot_ms: 0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            rollspeed: 0.0,
            pitchspeed: 0.0,
            yawspeed: 0.0,
        });

        update_state(&header, &attitude_msg, &writers, &None, &event_bus);
        update_state(&header, &attitude_msg, &writers, &None, &event_bus);

        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn centidegree_scaling() {
        assert_eq!(degrees_to_centidegrees(45.0), 4500);
        assert_eq!(degrees_to_centidegrees(-12.5), -1250);
        assert_eq!(degrees_to_centidegrees(0.0), 0);
    }

    #[test]
    fn channel_override_replace_is_bulk() {
        let mut overrides: ChannelOverrides = [1500; 8];
        apply_channel_overrides(&mut overrides, [Some(1600), None, None, None, None, None, None, Some(1400)]);
        assert_eq!(overrides, [1600, 0, 0, 0, 0, 0, 0, 1400]);
    }

    #[test]
    fn channel_override_clear_zeroes_every_slot() {
        let mut overrides: ChannelOverrides = [1500; 8];
        apply_channel_overrides(&mut overrides, [None; 8]);
        assert_eq!(overrides, [0; 8]);
    }
}
