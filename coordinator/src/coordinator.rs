//! Fleet coordinator core: owns the roster and the central
//! probability grid, dispatches bus messages and operator commands, and runs
//! the search control loop.

use std::sync::Arc;
use std::time::Duration;

use mob_bus::BusClient;
use mob_domain::wire::{
    self, ConfirmationPayload, ConfirmationType, ConnectPayload, DroneCommand, FleetEventPayload, FleetEventType,
    MissionStartPayload, MissionStartType, OperatorFrame, OperatorFrameType, OutboundFrame, OutboundFrameType,
    PositionAltitudeData, StatePayload, TelemetryPayload,
};
use mob_domain::{MissionConfig, MissionPhase, Role};
use mob_search::{GridParams, ProbabilityGrid};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::fleet::Roster;
use crate::gcs::TelemetryBroadcaster;

/// Phases a scout/utility may be picked up from when tasked into a new
/// mission — either grounded (IDLE) or already patrolling.
const ACCEPTABLE_FOR_TASKING: &[MissionPhase] = &[MissionPhase::Idle, MissionPhase::RoleUtilityTask];

pub struct Coordinator {
    pub config: MissionConfig,
    pub bus: Arc<BusClient>,
    pub broadcaster: TelemetryBroadcaster,
    roster: Mutex<Roster>,
    grid: Mutex<ProbabilityGrid>,
    assigned_scout: Mutex<Option<String>>,
    video_active: Mutex<bool>,
    search_task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(config: MissionConfig, bus: Arc<BusClient>, broadcaster: TelemetryBroadcaster) -> Arc<Self> {
        let roster = Roster::from_config(&config);
        let grid = new_grid(&config);
        Arc::new(Self {
            config,
            bus,
            broadcaster,
            roster: Mutex::new(roster),
            grid: Mutex::new(grid),
            assigned_scout: Mutex::new(None),
            video_active: Mutex::new(false),
            search_task: Mutex::new(None),
        })
    }

    pub async fn subscribe_topics(&self) {
        self.bus.subscribe(wire::TOPIC_FLEET_CONNECT).await;
        self.bus.subscribe(wire::TOPIC_FLEET_TELEMETRY_WILDCARD).await;
        self.bus.subscribe(wire::TOPIC_FLEET_STATE_WILDCARD).await;
        self.bus.subscribe(wire::TOPIC_FLEET_EVENT_WILDCARD).await;
    }

    /// Bus listener task, multiplexed with operator frames arriving from the
    /// GCS broadcaster over `operator_rx` — one task, two input streams, so
    /// bus messages and operator commands can never race each other through
    /// separate locks.
    pub async fn run(self: Arc<Self>, mut operator_rx: mpsc::Receiver<OperatorFrame>) {
        loop {
            tokio::select! {
                envelope = self.bus.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope).await,
                        None => {
                            warn!("bus client closed, coordinator bus listener exiting");
                            break;
                        }
                    }
                }
                frame = operator_rx.recv() => {
                    match frame {
                        Some(frame) => self.handle_operator_frame(frame).await,
                        None => {
                            warn!("operator command channel closed, coordinator exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Map-evolution loop task: advances drift on the central grid
    /// whenever the assigned scout is actively searching.
    pub async fn run_map_evolution_loop(self: Arc<Self>) {
        let interval_s = self.config.prob_search.evolve_interval_s;
        let mut interval = tokio::time::interval(Duration::from_secs_f64(interval_s.max(0.1)));
        loop {
            interval.tick().await;
            if self.is_assigned_scout_searching().await {
                self.grid.lock().await.evolve_map(interval_s);
            }
        }
    }

    async fn is_assigned_scout_searching(&self) -> bool {
        let Some(scout_id) = self.assigned_scout.lock().await.clone() else { return false };
        self.roster.lock().await.phase_of(&scout_id).map(|p| p.is_searching()).unwrap_or(false)
    }

    async fn handle_envelope(&self, envelope: mob_bus::Envelope) {
        let now = mob_domain::now_ms();
        let topic = envelope.topic.as_str();

        if topic == wire::TOPIC_FLEET_CONNECT {
            self.handle_fleet_connect(envelope.payload, now).await;
        } else if topic == wire::TOPIC_FLEET_EVENT_TARGET_FOUND || topic == wire::TOPIC_FLEET_EVENT_CONFIRMATION {
            // peer/coordinator-originated events on the shared fleet/event/+
            // wildcard that are not addressed `fleet/event/<id>` reports.
        } else if let Some(drone_id) = wire::last_segment(topic).map(str::to_string) {
            if topic.starts_with("fleet/telemetry/") {
                self.handle_telemetry(&drone_id, envelope.payload, now).await;
            } else if topic.starts_with("fleet/state/") {
                self.handle_state(&drone_id, envelope.payload, now).await;
            } else if topic.starts_with("fleet/event/") {
                self.handle_drone_event(&drone_id, envelope.payload).await;
            }
        }
    }

    async fn handle_fleet_connect(&self, payload: serde_json::Value, now: u64) {
        let Ok(parsed) = serde_json::from_value::<ConnectPayload>(payload) else { return };
        let mut roster = self.roster.lock().await;
        if roster.contains(&parsed.drone_id) {
            roster.mark_connected(&parsed.drone_id, now);
            info!(drone_id = %parsed.drone_id, role = %parsed.role, "drone connected");
        } else {
            warn!(drone_id = %parsed.drone_id, "fleet/connect from unknown drone id, ignoring");
        }
    }

    async fn handle_telemetry(&self, drone_id: &str, payload: serde_json::Value, now: u64) {
        let Ok(parsed) = serde_json::from_value::<TelemetryPayload>(payload) else { return };
        let phase = parsed.mission_phase;
        {
            let mut roster = self.roster.lock().await;
            roster.update_telemetry(drone_id, parsed.telemetry.clone(), phase, now);
        }
        if phase.is_searching() {
            let mut grid = self.grid.lock().await;
            grid.update_map(parsed.telemetry.position, parsed.telemetry.position.z, false);
        }
        self.broadcaster.broadcast(OutboundFrame::new(
            OutboundFrameType::Telemetry,
            serde_json::to_value(&parsed).unwrap_or_default(),
        ));
    }

    async fn handle_state(&self, drone_id: &str, payload: serde_json::Value, now: u64) {
        let Ok(parsed) = serde_json::from_value::<StatePayload>(payload) else { return };
        let previous = self.roster.lock().await.phase_of(drone_id);
        self.roster.lock().await.update_phase(drone_id, parsed.state, now);

        let was_overwatch = matches!(previous, Some(MissionPhase::RoleEmergencyEyes | MissionPhase::RoleEmergencyAssist));
        let still_overwatch = matches!(parsed.state, MissionPhase::RoleEmergencyEyes | MissionPhase::RoleEmergencyAssist);
        if was_overwatch && !still_overwatch {
            *self.video_active.lock().await = false;
            info!(drone_id, "overwatch ended, stopping associated video stream");
        }

        self.broadcaster.broadcast(OutboundFrame::new(
            OutboundFrameType::Telemetry,
            serde_json::to_value(&parsed).unwrap_or_default(),
        ));
    }

    async fn handle_drone_event(&self, drone_id: &str, payload: serde_json::Value) {
        let Ok(parsed) = serde_json::from_value::<FleetEventPayload>(payload) else { return };
        match parsed.event_type {
            FleetEventType::PendingConfirmation => {
                self.broadcaster.broadcast(OutboundFrame::new(OutboundFrameType::PendingConfirmation, parsed.data));
            }
            FleetEventType::TargetDeliveryRequest => {
                // Our own drone agent never emits this event type (it
                // self-tasks the payload directly off the broadcast
                // `fleet/event/target_found`), but a conformant peer agent
                // could, so the dispatch arm stays live.
                if let Ok(data) = serde_json::from_value::<PositionAltitudeData>(parsed.data) {
                    self.grid.lock().await.confirm_target_at(data.position);
                    if let Some(payload_drone) = self.roster.lock().await.any_idle_payload() {
                        let command = DroneCommand::LaunchAndStandby { position: data.position };
                        self.bus
                            .publish(wire::topic_drone_command(&payload_drone.drone_id), serde_json::to_value(command).unwrap())
                            .await;
                    } else {
                        warn!(drone_id, "TARGET_DELIVERY_REQUEST received but no idle payload drone available");
                    }
                }
            }
            FleetEventType::AiDetection => {
                if let Ok(data) = serde_json::from_value::<PositionAltitudeData>(parsed.data) {
                    self.grid.lock().await.update_map(data.position, data.altitude, true);
                }
            }
        }
    }

    async fn handle_operator_frame(&self, frame: OperatorFrame) {
        match frame.frame_type {
            OperatorFrameType::TriggerMobMode => self.trigger_mob_mode().await,
            OperatorFrameType::ConfirmTarget => self.relay_confirmation(frame.data, ConfirmationType::OperatorConfirmTarget).await,
            OperatorFrameType::RejectTarget => self.relay_confirmation(frame.data, ConfirmationType::OperatorRejectTarget).await,
            OperatorFrameType::TriggerPatrolMode => self.trigger_patrol_mode().await,
            OperatorFrameType::TriggerOverwatchMode => self.trigger_overwatch_mode(frame.data).await,
        }
    }

    async fn relay_confirmation(&self, data: serde_json::Value, kind: ConfirmationType) {
        #[derive(serde::Deserialize)]
        struct Addressed {
            drone_id: String,
        }
        let Ok(addressed) = serde_json::from_value::<Addressed>(data) else {
            warn!("CONFIRM/REJECT_TARGET operator frame missing drone_id, ignoring");
            return;
        };
        let payload = ConfirmationPayload { drone_id: addressed.drone_id, kind };
        self.bus.publish(wire::TOPIC_FLEET_EVENT_CONFIRMATION, serde_json::to_value(payload).unwrap()).await;
    }

    async fn trigger_mob_mode(&self) {
        self.grid.lock().await.initialize_map();

        let scout = self.roster.lock().await.find_by_role(Role::Scout, ACCEPTABLE_FOR_TASKING).map(|r| r.drone_id.clone());
        let tasked = match scout {
            Some(id) => Some((id, Role::Scout)),
            None => {
                warn!("TRIGGER_MOB_MODE: no scout available, failing over to utility");
                self.roster
                    .lock()
                    .await
                    .find_by_role(Role::Utility, ACCEPTABLE_FOR_TASKING)
                    .map(|r| (r.drone_id.clone(), Role::Utility))
            }
        };

        let Some((drone_id, _role)) = tasked else {
            warn!("TRIGGER_MOB_MODE: no scout or utility available to task, aborting");
            self.broadcaster.broadcast(OutboundFrame::new(
                OutboundFrameType::Warning,
                serde_json::json!({ "message": "no scout or utility available for MOB_EMERGENCY" }),
            ));
            return;
        };

        if self.roster.lock().await.any_idle_payload().is_none() {
            warn!("TRIGGER_MOB_MODE: no idle payload drone available, proceeding without one");
            self.broadcaster.broadcast(OutboundFrame::new(
                OutboundFrameType::Warning,
                serde_json::json!({ "message": "no idle payload drone available for delivery" }),
            ));
        }

        let command = DroneCommand::StartMission { kind: MissionStartType::MobEmergency };
        self.bus.publish(wire::topic_drone_command(&drone_id), serde_json::to_value(command).unwrap()).await;
        // Broadcast so payload/utility self-react per their own role table too.
        let start = MissionStartPayload { kind: MissionStartType::MobEmergency, position: None };
        self.bus.publish(wire::TOPIC_MISSION_START, serde_json::to_value(start).unwrap()).await;

        *self.assigned_scout.lock().await = Some(drone_id.clone());
        self.restart_search_loop().await;
    }

    async fn trigger_patrol_mode(&self) {
        let utility = self.roster.lock().await.find_by_role(Role::Utility, &[MissionPhase::Idle]).map(|r| r.drone_id.clone());
        match utility {
            Some(drone_id) => {
                self.bus.publish(wire::topic_drone_command(&drone_id), serde_json::to_value(DroneCommand::StartPatrol).unwrap()).await;
            }
            None => warn!("TRIGGER_PATROL_MODE: no idle utility drone available"),
        }
    }

    async fn trigger_overwatch_mode(&self, data: serde_json::Value) {
        let Ok(position) = serde_json::from_value::<mob_domain::Position>(data) else {
            warn!("TRIGGER_OVERWATCH_MODE missing a position, ignoring");
            return;
        };
        let picked = self.roster.lock().await.find_by_role(Role::Utility, ACCEPTABLE_FOR_TASKING).map(|r| r.drone_id.clone());
        let picked = match picked {
            Some(id) => Some(id),
            None => self.roster.lock().await.find_by_role(Role::Scout, ACCEPTABLE_FOR_TASKING).map(|r| r.drone_id.clone()),
        };
        let Some(drone_id) = picked else {
            warn!("TRIGGER_OVERWATCH_MODE: no utility or scout available");
            return;
        };

        self.bus.publish(wire::topic_drone_command(&drone_id), serde_json::to_value(DroneCommand::StartVideoStream).unwrap()).await;
        self.bus
            .publish(wire::topic_drone_command(&drone_id), serde_json::to_value(DroneCommand::StartOverwatch { position }).unwrap())
            .await;
        *self.video_active.lock().await = true;
        info!(drone_id, "overwatch mode triggered, media stream started");
    }

    /// Aborts any previous search loop and spawns a fresh one, mirroring the
    /// abort-and-replace discipline used for per-phase drone behaviors.
    async fn restart_search_loop(self: &Arc<Self>) {
        if let Some(handle) = self.search_task.lock().await.take() {
            handle.abort();
        }
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run_search_control_loop().await });
        *self.search_task.lock().await = Some(handle);
    }

    /// Probabilistic search control loop. Cancellation-safe: every
    /// suspension point is a plain `sleep`/`publish`, and ending the loop
    /// never forces a drone's phase — the scout ends its own search via its
    /// own transitions.
    async fn run_search_control_loop(self: Arc<Self>) {
        let waypoint_interval = Duration::from_secs_f64(self.config.prob_search.waypoint_interval_s.max(0.1));
        loop {
            if !self.is_assigned_scout_searching().await {
                break;
            }
            let waypoint = self.grid.lock().await.get_next_search_waypoint();
            let Some(scout_id) = self.assigned_scout.lock().await.clone() else { break };
            let command = DroneCommand::GotoWaypoint { position: waypoint };
            self.bus.publish(wire::topic_drone_command(&scout_id), serde_json::to_value(command).unwrap()).await;
            tokio::time::sleep(waypoint_interval).await;
        }
    }
}

fn new_grid(config: &MissionConfig) -> ProbabilityGrid {
    let p = &config.prob_search;
    ProbabilityGrid::new(GridParams {
        grid_size: p.grid_size,
        search_area_size_m: p.search_area_size_m,
        area_center: (p.area.x, p.area.y),
        search_altitude: p.search_altitude,
        r_max: p.r_max,
        h_ref: p.h_ref,
        miss_probability: p.miss_probability,
        drift_x_m_s: p.drift_x_m_s,
        drift_y_m_s: p.drift_y_m_s,
    })
}
