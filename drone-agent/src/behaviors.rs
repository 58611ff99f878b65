//! Role-specific per-phase entry behaviors. Each function runs for as
//! long as its phase is active; the behavior supervisor in `agent.rs` aborts
//! it the instant the state machine moves on, so none of these need to poll
//! for cancellation themselves.

use std::sync::Arc;
use std::time::Duration;

use mob_domain::wire::{FleetEventType, PendingConfirmationData, TargetFoundPayload};
use mob_domain::{LedColor, MissionPhase, Position};
use mob_fsm::Trigger;
use tracing::{info, warn};

use crate::agent::{publish_fleet_event, publish_map_update, AgentContext};
use crate::strategy::{approach_point, OrbitStrategy, SearchPattern};

/// Minimum detector confidence treated as a confirmed sighting, gating the
/// scout/utility search loop's `target_sighted` trigger.
const DETECTION_CONFIDENCE_THRESHOLD: f64 = 0.6;

pub async fn run_entry_behavior(ctx: Arc<AgentContext>, phase: MissionPhase) {
    match phase {
        MissionPhase::Idle
        | MissionPhase::LocalOperatorControl
        | MissionPhase::TargetPendingConfirmation => std::future::pending::<()>().await,

        MissionPhase::Preflight => preflight(&ctx).await,
        MissionPhase::Takeoff => takeoff(&ctx).await,
        MissionPhase::RoleSearchPrimary => role_search_primary(&ctx).await,
        MissionPhase::RoleSearchAssist => role_search_assist(&ctx).await,
        MissionPhase::RoleEmergencyStandby => role_emergency_standby(&ctx).await,
        MissionPhase::RoleUtilityTask => role_utility_task(&ctx).await,
        MissionPhase::RoleEmergencyEyes => role_emergency_eyes(&ctx).await,
        MissionPhase::RoleEmergencyAssist => role_emergency_assist(&ctx).await,
        MissionPhase::TargetConfirmed => target_confirmed(&ctx).await,
        MissionPhase::Delivering => delivering(&ctx).await,
        MissionPhase::Returning => returning(&ctx).await,
        MissionPhase::Landing => landing(&ctx).await,
        MissionPhase::Completed => completed(&ctx).await,
        MissionPhase::Emergency => emergency(&ctx).await,
    }
}

/// Battery gate before takeoff. Below threshold, the mission never leaves the
/// ground: fire `trigger_emergency` directly rather than silently idling.
async fn preflight(ctx: &AgentContext) {
    let battery = ctx.last_telemetry.lock().await.as_ref().map(|t| t.battery_pct).unwrap_or(100.0);
    if battery < ctx.config.health.min_battery_preflight {
        warn!(drone_id = %ctx.drone_id, battery, "preflight battery check failed");
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    ctx.machine.fire(Trigger::PreflightSuccess, None).await;
}

async fn takeoff(ctx: &AgentContext) {
    let altitude = ctx.config.prob_search.search_altitude;
    let mission_type = ctx.machine.mission_type().await;
    let result = ctx.controller.lock().await.takeoff(altitude).await;
    match result {
        Ok(()) => {
            ctx.machine.fire(Trigger::TakeoffSuccess, Some(mission_type)).await;
        }
        Err(e) => {
            warn!(drone_id = %ctx.drone_id, error = %e, "takeoff failed");
            ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        }
    }
}

/// Scout's primary search loop: fly each waypoint the coordinator (or a
/// peer) commands via `GOTO_WAYPOINT`, scan, and either report a sighting or
/// feed a negative observation back into the local gossip grid. The gossip
/// replica is also advected once a second on its own, independent of
/// waypoint arrival, so it keeps tracking drift while this drone waits on
/// the next command.
async fn role_search_primary(ctx: &AgentContext) {
    let mut drift = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            waypoint = ctx.next_waypoint_command() => {
                let Some(waypoint) = waypoint else { return };
                if fly_and_scan(ctx, waypoint).await {
                    return;
                }
            }
            _ = drift.tick() => {
                crate::agent::ensure_local_grid(ctx).await;
                if let Some(grid) = ctx.local_grid.lock().await.as_mut() {
                    grid.evolve_map(1.0);
                }
            }
        }
    }
}

/// Utility's search-assist loop mirrors the scout's, but generates its own
/// lawnmower coverage rather than waiting on externally-commanded waypoints,
/// sweeping independently of the coordinator.
async fn role_search_assist(ctx: &AgentContext) {
    let origin = current_position(ctx).await;
    let mut pattern = SearchPattern::new(
        ctx.config.strategies.search.algorithm,
        origin,
        ctx.config.lawnmower,
        ctx.config.strategies.search.size,
    );
    loop {
        let Some(waypoint) = pattern.next_waypoint() else {
            ctx.machine.fire(Trigger::SearchCompleteNegative, None).await;
            return;
        };
        if fly_and_scan(ctx, waypoint).await {
            return;
        }
    }
}

/// Flies to `waypoint`, scans, publishes the observation to the gossip grid
/// and/or fires `target_sighted`. Returns `true` if a sighting ended the
/// search (caller should stop iterating).
async fn fly_and_scan(ctx: &AgentContext, waypoint: Position) -> bool {
    if ctx.controller.lock().await.goto(waypoint).await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return true;
    }
    let altitude = waypoint.z;
    let detection = ctx.detector.lock().await.scan(waypoint, altitude).await;

    match detection {
        Some(d) if d.exceeds(DETECTION_CONFIDENCE_THRESHOLD) => {
            let pos = d.world_position.unwrap_or(waypoint);
            ctx.detections.lock().await.push(d.clone());
            crate::agent::ensure_local_grid(ctx).await;
            if let Some(grid) = ctx.local_grid.lock().await.as_mut() {
                grid.confirm_target_at(pos);
            }
            publish_map_update(ctx, pos, altitude, true).await;

            if ctx.machine.fire(Trigger::TargetSighted, None).await.is_some() {
                *ctx.target.lock().await = Some(pos);
                publish_fleet_event(
                    ctx,
                    FleetEventType::PendingConfirmation,
                    serde_json::to_value(PendingConfirmationData { position: pos, confidence: d.confidence }).unwrap(),
                )
                .await;
            }
            true
        }
        Some(d) => {
            ctx.detections.lock().await.push(d);
            crate::agent::ensure_local_grid(ctx).await;
            if let Some(grid) = ctx.local_grid.lock().await.as_mut() {
                grid.update_map(waypoint, altitude, false);
            }
            publish_map_update(ctx, waypoint, altitude, false).await;
            false
        }
        None => {
            crate::agent::ensure_local_grid(ctx).await;
            if let Some(grid) = ctx.local_grid.lock().await.as_mut() {
                grid.update_map(waypoint, altitude, false);
            }
            publish_map_update(ctx, waypoint, altitude, false).await;
            false
        }
    }
}

/// Payload holds at the configured standby point, armed and hovering,
/// awaiting `fleet/event/target_found` (handled directly by the event
/// listener, which fires `start_delivery_mission` out from under this task).
async fn role_emergency_standby(ctx: &AgentContext) {
    let standby = ctx.target.lock().await.unwrap_or_else(|| {
        let area = ctx.config.prob_search.area;
        Position::new(area.x, area.y, ctx.config.lawnmower.patrol_altitude)
    });
    if ctx.controller.lock().await.goto(standby).await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    ctx.controller.lock().await.set_led(LedColor::White).await;
    std::future::pending::<()>().await;
}

/// Utility patrol: lawnmower sweep of the configured area, aborting to RTL
/// early if battery crosses the patrol-RTL threshold.
async fn role_utility_task(ctx: &AgentContext) {
    let origin = current_position(ctx).await;
    let mut pattern = SearchPattern::new(
        ctx.config.strategies.search.algorithm,
        origin,
        ctx.config.lawnmower,
        ctx.config.strategies.search.size,
    );
    loop {
        let battery = ctx.last_telemetry.lock().await.as_ref().map(|t| t.battery_pct).unwrap_or(100.0);
        if battery < ctx.config.health.min_battery_patrol_rtl {
            ctx.machine.fire(Trigger::PatrolBatteryLow, None).await;
            return;
        }
        let Some(waypoint) = pattern.next_waypoint() else {
            ctx.machine.fire(Trigger::PatrolComplete, None).await;
            return;
        };
        if ctx.controller.lock().await.goto(waypoint).await.is_err() {
            ctx.machine.fire(Trigger::TriggerEmergency, None).await;
            return;
        }
    }
}

/// Scout overwatch: orbit the point of interest (own position if none was
/// handed down) until an operator sends RETURN_TO_HOME.
async fn role_emergency_eyes(ctx: &AgentContext) {
    orbit_until_cancelled(ctx).await;
}

/// Utility's overwatch counterpart: holds station near the point of interest
/// rather than orbiting (the "eyes" role belongs to the scout; utility is an
/// assist asset), awaiting RETURN_TO_HOME.
async fn role_emergency_assist(ctx: &AgentContext) {
    let center = ctx.target.lock().await.unwrap_or(current_position(ctx).await);
    let point = approach_point(ctx.config.strategies.flight.algorithm, center, ctx.config.precision_hover);
    if ctx.controller.lock().await.goto(point).await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    std::future::pending::<()>().await;
}

async fn orbit_until_cancelled(ctx: &AgentContext) {
    let center = ctx.target.lock().await.unwrap_or(current_position(ctx).await);
    let mut orbit = OrbitStrategy::new(center, ctx.config.orbit);
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        let next = orbit.next_waypoint(1.0);
        if ctx.controller.lock().await.goto(next).await.is_err() {
            ctx.machine.fire(Trigger::TriggerEmergency, None).await;
            return;
        }
    }
}

/// Scout publishes the confirmed sighting to the fleet (payload self-tasks on
/// this broadcast) and immediately heads home.
async fn target_confirmed(ctx: &AgentContext) {
    let Some(position) = *ctx.target.lock().await else {
        warn!(drone_id = %ctx.drone_id, "TARGET_CONFIRMED with no recorded target position");
        ctx.machine.fire(Trigger::DeliveryRequestSent, None).await;
        return;
    };
    let payload = TargetFoundPayload { position, source_drone: ctx.drone_id.clone() };
    ctx.bus
        .publish(mob_domain::wire::TOPIC_FLEET_EVENT_TARGET_FOUND, serde_json::to_value(payload).unwrap())
        .await;
    ctx.machine.fire(Trigger::DeliveryRequestSent, None).await;
}

/// Payload's delivery run: approach the target, hover, signal drop with the
/// LED, then head home (the FSM routes delivery_complete through RETURNING).
async fn delivering(ctx: &AgentContext) {
    let Some(target) = *ctx.target.lock().await else {
        warn!(drone_id = %ctx.drone_id, "DELIVERING with no recorded target position");
        ctx.machine.fire(Trigger::DeliveryComplete, None).await;
        return;
    };
    let approach = approach_point(ctx.config.strategies.flight.algorithm, target, ctx.config.precision_hover);
    if ctx.controller.lock().await.goto(approach).await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    ctx.controller.lock().await.set_led(LedColor::Green).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    ctx.controller.lock().await.set_led(LedColor::Off).await;
    info!(drone_id = %ctx.drone_id, "payload delivered");
    ctx.machine.fire(Trigger::DeliveryComplete, None).await;
}

async fn returning(ctx: &AgentContext) {
    if ctx.controller.lock().await.return_to_home().await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    ctx.machine.fire(Trigger::ArrivedHome, None).await;
}

async fn landing(ctx: &AgentContext) {
    if ctx.controller.lock().await.land().await.is_err() {
        ctx.machine.fire(Trigger::TriggerEmergency, None).await;
        return;
    }
    ctx.machine.fire(Trigger::LandComplete, None).await;
}

async fn completed(ctx: &AgentContext) {
    *ctx.target.lock().await = None;
    ctx.machine.fire(Trigger::MissionFinished, None).await;
}

/// EMERGENCY supersedes every other phase: force an immediate land attempt,
/// then fall back to IDLE via the absorbing reset trigger.
async fn emergency(ctx: &AgentContext) {
    ctx.controller.lock().await.set_led(LedColor::Red).await;
    let _ = ctx.controller.lock().await.land().await;
    ctx.machine.fire(Trigger::ResetFromEmergency, None).await;
}

async fn current_position(ctx: &AgentContext) -> Position {
    ctx.last_telemetry.lock().await.as_ref().map(|t| t.position).unwrap_or_default()
}
