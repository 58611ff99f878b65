//! The drone mission agent: owns the state machine, the flight-controller
//! handle, the bus connection, and (for MOB_SEARCH) a local gossip grid.
//! Exactly three concurrent tasks run for the agent's lifetime: the bus
//! event listener, the health monitor, and a behavior supervisor that runs
//! (and cancels) the current phase's entry callback.

use std::sync::Arc;
use std::time::Duration;

use mob_bus::BusClient;
use mob_domain::wire::{
    self, ConfirmationPayload, ConfirmationType, ConnectPayload, DroneCommand, FleetEventPayload,
    FleetEventType, MapUpdatePayload, MissionStartPayload, StatePayload, TargetFoundPayload,
    TelemetryPayload,
};
use mob_domain::{Detection, MissionConfig, MissionPhase, MissionType, Position, Role, Telemetry};
use mob_fsm::Trigger;
use mob_search::{GridParams, ProbabilityGrid};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::controller::FlightController;
use crate::detector::Detector;
use crate::dispatch::decide_start_trigger;
use crate::machine::SharedMachine;
use crate::snapshot::SnapshotWriter;

/// Everything the three agent tasks and the phase-behaviors share. Each
/// mutable field is independently locked rather than guarded by one big
/// mutex, since the three tasks touch disjoint subsets of it concurrently.
pub struct AgentContext {
    pub drone_id: String,
    pub role: Role,
    pub config: MissionConfig,
    pub bus: Arc<BusClient>,
    pub machine: SharedMachine,
    pub controller: Mutex<Box<dyn FlightController>>,
    pub detector: Mutex<Box<dyn Detector>>,
    pub local_grid: Mutex<Option<ProbabilityGrid>>,
    pub target: Mutex<Option<Position>>,
    pub last_telemetry: Mutex<Option<Telemetry>>,
    pub detections: Mutex<Vec<Detection>>,
    pub snapshot: Mutex<SnapshotWriter>,
    waypoint_tx: mpsc::UnboundedSender<Position>,
    waypoint_rx: Mutex<mpsc::UnboundedReceiver<Position>>,
}

impl AgentContext {
    pub fn new(
        drone_id: impl Into<String>,
        role: Role,
        config: MissionConfig,
        bus: Arc<BusClient>,
        controller: Box<dyn FlightController>,
        detector: Box<dyn Detector>,
    ) -> Arc<Self> {
        let drone_id = drone_id.into();
        let snapshot = SnapshotWriter::open(config.health.snapshot_path.as_deref());
        let (waypoint_tx, waypoint_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            machine: SharedMachine::new(drone_id.clone(), role),
            drone_id,
            role,
            config,
            bus,
            controller: Mutex::new(controller),
            detector: Mutex::new(detector),
            local_grid: Mutex::new(None),
            target: Mutex::new(None),
            last_telemetry: Mutex::new(None),
            detections: Mutex::new(Vec::new()),
            snapshot: Mutex::new(snapshot),
            waypoint_tx,
            waypoint_rx: Mutex::new(waypoint_rx),
        })
    }

    /// Lazily builds this drone's local probability grid copy the first time
    /// it is needed (own detections or peer gossip), centered on the
    /// configured search area. Centralized mode treats this as an advisory
    /// replica only — the coordinator's copy drives the actual search loop.
    async fn ensure_local_grid(&self) {
        let mut guard = self.local_grid.lock().await;
        if guard.is_none() {
            let p = &self.config.prob_search;
            *guard = Some(ProbabilityGrid::new(GridParams {
                grid_size: p.grid_size,
                search_area_size_m: p.search_area_size_m,
                area_center: (p.area.x, p.area.y),
                search_altitude: p.search_altitude,
                r_max: p.r_max,
                h_ref: p.h_ref,
                miss_probability: p.miss_probability,
                drift_x_m_s: p.drift_x_m_s,
                drift_y_m_s: p.drift_y_m_s,
            }));
        }
    }

    pub async fn next_waypoint_command(&self) -> Option<Position> {
        self.waypoint_rx.lock().await.recv().await
    }
}

/// Connects the bus, announces on `fleet/connect`, subscribes to every topic
/// this agent needs to react to, then runs the three-task lifecycle until the
/// listener or health monitor ends (process shutdown).
pub async fn run(ctx: Arc<AgentContext>) {
    ctx.bus.publish(wire::TOPIC_FLEET_CONNECT, serde_json::to_value(ConnectPayload {
        drone_id: ctx.drone_id.clone(),
        role: ctx.role,
    }).unwrap()).await;

    ctx.bus.subscribe(wire::TOPIC_MISSION_START).await;
    ctx.bus.subscribe(wire::TOPIC_FLEET_EVENT_CONFIRMATION).await;
    ctx.bus.subscribe(wire::TOPIC_FLEET_EVENT_TARGET_FOUND).await;
    ctx.bus.subscribe(wire::TOPIC_FLEET_MAP_UPDATE).await;
    ctx.bus.subscribe(wire::topic_drone_command(&ctx.drone_id)).await;

    let listener = tokio::spawn(run_event_listener(ctx.clone()));
    let health = tokio::spawn(run_health_monitor(ctx.clone()));
    let supervisor = tokio::spawn(run_behavior_supervisor(ctx.clone()));

    tokio::select! {
        _ = listener => info!(drone_id = %ctx.drone_id, "event listener task ended"),
        _ = health => info!(drone_id = %ctx.drone_id, "health monitor task ended"),
        _ = supervisor => info!(drone_id = %ctx.drone_id, "behavior supervisor ended"),
    }

    ctx.controller.lock().await.disconnect().await;
    publish_state(&ctx, MissionPhase::Idle).await;
    info!(drone_id = %ctx.drone_id, "drone agent shutting down");
}

/// Runs the current phase's entry behavior, aborting and replacing it every
/// time the machine transitions, and publishing the `fleet/state/<id>`
/// notification in exactly the order transitions occur (the watch channel
/// preserves that order since there is exactly one writer, `SharedMachine`).
async fn run_behavior_supervisor(ctx: Arc<AgentContext>) {
    let mut phase_rx = ctx.machine.subscribe();
    let mut current: Option<JoinHandle<()>> = None;
    loop {
        let phase = *phase_rx.borrow();
        publish_state(&ctx, phase).await;

        if let Some(handle) = current.take() {
            handle.abort();
        }
        let behavior_ctx = ctx.clone();
        current = Some(tokio::spawn(async move {
            crate::behaviors::run_entry_behavior(behavior_ctx, phase).await;
        }));

        if phase_rx.changed().await.is_err() {
            break;
        }
    }
}

async fn publish_state(ctx: &AgentContext, phase: MissionPhase) {
    let payload = StatePayload { state: phase, drone_id: ctx.drone_id.clone(), role: ctx.role };
    ctx.bus.publish(wire::topic_fleet_state(&ctx.drone_id), serde_json::to_value(payload).unwrap()).await;
}

/// Every 1 second: poll telemetry, detect local-operator takeover/release,
/// detect resource-shortage emergencies, publish telemetry, snapshot.
async fn run_health_monitor(ctx: Arc<AgentContext>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;

        let telemetry = ctx.controller.lock().await.poll_telemetry().await;
        *ctx.last_telemetry.lock().await = Some(telemetry.clone());

        let phase = ctx.machine.phase().await;

        if telemetry.vehicle_mode == mob_domain::VehicleMode::Manual {
            if phase != MissionPhase::LocalOperatorControl {
                warn!(drone_id = %ctx.drone_id, "local-operator override detected (MANUAL mode), taking over");
                ctx.machine.fire(Trigger::LocalOperatorTakeover, None).await;
            }
        } else if phase == MissionPhase::LocalOperatorControl {
            info!(drone_id = %ctx.drone_id, "local-operator override released");
            ctx.machine.fire(Trigger::LocalOperatorRelease, None).await;
        } else if phase != MissionPhase::Emergency
            && health_predicate_fails(&telemetry, &ctx.config.health, phase)
        {
            warn!(drone_id = %ctx.drone_id, battery = telemetry.battery_pct, "health predicate failed, triggering emergency");
            ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        }

        let payload = TelemetryPayload { telemetry: telemetry.clone(), mission_phase: phase, drone_id: ctx.drone_id.clone() };
        ctx.bus.publish(wire::topic_fleet_telemetry(&ctx.drone_id), serde_json::to_value(payload).unwrap()).await;

        let detections = ctx.detections.lock().await.clone();
        ctx.snapshot.lock().await.record(&ctx.drone_id, phase, &telemetry, &detections);
    }
}

fn health_predicate_fails(telemetry: &Telemetry, health: &mob_domain::HealthConfig, phase: MissionPhase) -> bool {
    if phase == MissionPhase::Idle || phase == MissionPhase::Completed {
        return false;
    }
    telemetry.battery_pct < health.min_battery_emergency
        || telemetry.age_seconds(mob_domain::now_ms()) > health.max_heartbeat_latency
        || !telemetry.connected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FlightController;
    use crate::simulated::SimulatedController;

    /// A low-battery reading must trip the health predicate regardless of
    /// which searching/utility phase the drone is in, but never while idle
    /// or completed.
    #[tokio::test]
    async fn low_battery_reading_trips_health_predicate() {
        let mut controller = SimulatedController::new("scout_1", Position::new(0.0, 0.0, 0.0));
        controller.connect().await.unwrap();
        controller.takeoff(50.0).await.unwrap();
        controller.set_battery(5.0);
        let telemetry = controller.poll_telemetry().await;
        let health = mob_domain::HealthConfig::default();

        assert!(health_predicate_fails(&telemetry, &health, MissionPhase::RoleSearchPrimary));
        assert!(!health_predicate_fails(&telemetry, &health, MissionPhase::Idle));
        assert!(!health_predicate_fails(&telemetry, &health, MissionPhase::Completed));
    }

    #[tokio::test]
    async fn healthy_battery_does_not_trip_predicate() {
        let mut controller = SimulatedController::new("scout_1", Position::new(0.0, 0.0, 0.0));
        controller.connect().await.unwrap();
        controller.takeoff(50.0).await.unwrap();
        let telemetry = controller.poll_telemetry().await;
        let health = mob_domain::HealthConfig::default();

        assert!(!health_predicate_fails(&telemetry, &health, MissionPhase::RoleSearchPrimary));
    }
}

/// Consumes the bus and dispatches each subscribed topic to its handler.
async fn run_event_listener(ctx: Arc<AgentContext>) {
    loop {
        let Some(envelope) = ctx.bus.recv().await else { break };
        let topic = envelope.topic.clone();

        if topic == wire::TOPIC_MISSION_START {
            handle_mission_start(&ctx, envelope.payload).await;
        } else if topic == wire::TOPIC_FLEET_EVENT_TARGET_FOUND {
            handle_target_found(&ctx, envelope.payload).await;
        } else if topic == wire::TOPIC_FLEET_EVENT_CONFIRMATION {
            handle_confirmation(&ctx, envelope.payload).await;
        } else if topic == wire::TOPIC_FLEET_MAP_UPDATE {
            handle_map_update(&ctx, envelope.payload).await;
        } else if topic == wire::topic_drone_command(&ctx.drone_id) {
            handle_drone_command(&ctx, envelope.payload).await;
        } else {
            debug!(drone_id = %ctx.drone_id, topic, "unhandled topic");
        }
    }
}

async fn current_battery(ctx: &AgentContext) -> f64 {
    ctx.last_telemetry.lock().await.as_ref().map(|t| t.battery_pct).unwrap_or(100.0)
}

async fn handle_mission_start(ctx: &AgentContext, payload: serde_json::Value) {
    let parsed: Result<MissionStartPayload, _> = serde_json::from_value(payload);
    let Ok(parsed) = parsed else {
        debug!(drone_id = %ctx.drone_id, "dropping malformed mission/start payload");
        return;
    };
    if let Some(position) = parsed.position {
        *ctx.target.lock().await = Some(position);
    }
    let battery = current_battery(ctx).await;
    if let Some((trigger, mission_type)) =
        decide_start_trigger(&ctx.drone_id, ctx.role, parsed.kind, battery, &ctx.config.health)
    {
        ctx.machine.fire(trigger, Some(mission_type)).await;
    }
}

async fn handle_target_found(ctx: &AgentContext, payload: serde_json::Value) {
    let Ok(parsed) = serde_json::from_value::<TargetFoundPayload>(payload) else {
        debug!(drone_id = %ctx.drone_id, "dropping malformed target_found payload");
        return;
    };
    if ctx.role != Role::Payload {
        return;
    }
    let phase = ctx.machine.phase().await;
    if !matches!(phase, MissionPhase::RoleEmergencyStandby | MissionPhase::Idle) {
        debug!(drone_id = %ctx.drone_id, ?phase, "payload ignoring target_found: not in STANDBY or IDLE");
        return;
    }
    *ctx.target.lock().await = Some(parsed.position);
    ctx.machine.fire(Trigger::StartDeliveryMission, Some(MissionType::PayloadDelivery)).await;
}

async fn handle_confirmation(ctx: &AgentContext, payload: serde_json::Value) {
    let Ok(parsed) = serde_json::from_value::<ConfirmationPayload>(payload) else {
        debug!(drone_id = %ctx.drone_id, "dropping malformed confirmation payload");
        return;
    };
    if parsed.drone_id != ctx.drone_id {
        return;
    }
    if ctx.machine.phase().await != MissionPhase::TargetPendingConfirmation {
        warn!(drone_id = %ctx.drone_id, "confirmation arrived but drone is not pending confirmation, ignoring");
        return;
    }
    match parsed.kind {
        ConfirmationType::OperatorConfirmTarget => {
            ctx.machine.fire(Trigger::ConfirmTarget, None).await;
        }
        ConfirmationType::OperatorRejectTarget => {
            ctx.machine.fire(Trigger::RejectTarget, None).await;
        }
    }
}

async fn handle_map_update(ctx: &AgentContext, payload: serde_json::Value) {
    let Ok(parsed) = serde_json::from_value::<MapUpdatePayload>(payload) else {
        debug!(drone_id = %ctx.drone_id, "dropping malformed map/update payload");
        return;
    };
    if parsed.drone_id == ctx.drone_id {
        return;
    }
    ctx.ensure_local_grid().await;
    if let Some(grid) = ctx.local_grid.lock().await.as_mut() {
        grid.update_map(parsed.position, parsed.altitude, parsed.has_detection);
        debug!(drone_id = %ctx.drone_id, peer = %parsed.drone_id, "merged peer observation into local grid");
    }
}

async fn handle_drone_command(ctx: &AgentContext, payload: serde_json::Value) {
    let Ok(command) = serde_json::from_value::<DroneCommand>(payload) else {
        debug!(drone_id = %ctx.drone_id, "dropping malformed drone/command payload");
        return;
    };
    let phase = ctx.machine.phase().await;
    match command {
        DroneCommand::StartMission { kind } => {
            let battery = current_battery(ctx).await;
            if let Some((trigger, mission_type)) =
                decide_start_trigger(&ctx.drone_id, ctx.role, kind, battery, &ctx.config.health)
            {
                ctx.machine.fire(trigger, Some(mission_type)).await;
            }
        }
        DroneCommand::StartPatrol => {
            ctx.machine.fire(Trigger::StartPatrolMission, Some(MissionType::Patrol)).await;
        }
        DroneCommand::StartOverwatch { position } => {
            *ctx.target.lock().await = Some(position);
            ctx.machine.fire(Trigger::StartOverwatchMission, Some(MissionType::Overwatch)).await;
        }
        DroneCommand::StartVideoStream => {
            info!(drone_id = %ctx.drone_id, "video stream requested (camera system out of scope, logging only)");
        }
        DroneCommand::LaunchAndStandby { position } => {
            *ctx.target.lock().await = Some(position);
            ctx.machine.fire(Trigger::StartStandbyMission, Some(MissionType::Standby)).await;
        }
        DroneCommand::GotoWaypoint { position } => {
            let _ = ctx.waypoint_tx.send(position);
        }
        DroneCommand::OperatorConfirmTarget => {
            if phase == MissionPhase::TargetPendingConfirmation {
                ctx.machine.fire(Trigger::ConfirmTarget, None).await;
            }
        }
        DroneCommand::OperatorRejectTarget => {
            if phase == MissionPhase::TargetPendingConfirmation {
                ctx.machine.fire(Trigger::RejectTarget, None).await;
            }
        }
        DroneCommand::ReturnToHome => {
            if phase.is_searching() {
                ctx.machine.fire(Trigger::SearchCompleteNegative, None).await;
            } else if phase == MissionPhase::RoleUtilityTask {
                ctx.machine.fire(Trigger::PatrolComplete, None).await;
            } else if matches!(phase, MissionPhase::RoleEmergencyEyes | MissionPhase::RoleEmergencyAssist) {
                ctx.machine.fire(Trigger::OverwatchComplete, None).await;
            } else {
                debug!(drone_id = %ctx.drone_id, ?phase, "RETURN_TO_HOME has no matching transition from this phase");
            }
        }
    }
}

pub(crate) async fn publish_map_update(ctx: &AgentContext, position: Position, altitude: f64, has_detection: bool) {
    let payload = MapUpdatePayload { drone_id: ctx.drone_id.clone(), position, altitude, has_detection };
    ctx.bus.publish(wire::TOPIC_FLEET_MAP_UPDATE, serde_json::to_value(payload).unwrap()).await;
}

pub(crate) async fn publish_fleet_event(ctx: &AgentContext, event_type: FleetEventType, data: serde_json::Value) {
    let payload = FleetEventPayload { event_type, data };
    ctx.bus.publish(wire::topic_fleet_event(&ctx.drone_id), serde_json::to_value(payload).unwrap()).await;
}

pub(crate) async fn ensure_local_grid(ctx: &AgentContext) {
    ctx.ensure_local_grid().await;
}
