//! Shared role-appropriate dispatch for `mission/start` (broadcast) and the
//! addressed `drone/command/<id>` `START_MISSION` command — both carry the
//! same `MissionStartType` and both route through this one decision table,
//! so a drone reacts identically regardless of which topic the trigger
//! arrived on.

use mob_domain::wire::MissionStartType;
use mob_domain::{HealthConfig, MissionType, Role};
use mob_fsm::Trigger;
use tracing::warn;

/// Decide which trigger (if any) this drone should fire in response to a
/// mission-start request, given its static role, current battery, and the
/// configured health thresholds. `None` means refuse silently (logged),
/// matching the PreconditionFailure taxonomy.
pub fn decide_start_trigger(
    drone_id: &str,
    role: Role,
    kind: MissionStartType,
    battery_pct: f64,
    health: &HealthConfig,
) -> Option<(Trigger, MissionType)> {
    match (kind, role) {
        (MissionStartType::MobEmergency, Role::Scout) => Some((Trigger::StartMission, MissionType::MobSearch)),
        (MissionStartType::MobEmergency, Role::Payload) => Some((Trigger::StartStandbyMission, MissionType::Standby)),
        (MissionStartType::MobEmergency, Role::Utility) => Some((Trigger::StartMission, MissionType::MobSearch)),

        (MissionStartType::GeneralEmergency, Role::Scout) => {
            Some((Trigger::StartOverwatchMission, MissionType::Overwatch))
        }
        (MissionStartType::GeneralEmergency, Role::Payload) => {
            Some((Trigger::StartStandbyMission, MissionType::Standby))
        }
        (MissionStartType::GeneralEmergency, Role::Utility) => {
            if battery_pct > health.min_battery_patrol_rtl {
                Some((Trigger::StartOverwatchMission, MissionType::Overwatch))
            } else {
                warn!(drone_id, battery_pct, "utility refusing GENERAL_EMERGENCY overwatch: battery at/below patrol-RTL threshold");
                None
            }
        }

        (MissionStartType::UtilityHullInspection, Role::Utility) => {
            Some((Trigger::StartPatrolMission, MissionType::Patrol))
        }
        (MissionStartType::UtilityHullInspection, Role::Scout) => {
            if battery_pct > health.high_battery_threshold {
                Some((Trigger::StartPatrolMission, MissionType::Patrol))
            } else {
                warn!(drone_id, battery_pct, "scout refusing UTILITY_HULL_INSPECTION: battery below high-battery threshold");
                None
            }
        }
        (MissionStartType::UtilityHullInspection, Role::Payload) => {
            warn!(drone_id, "payload refuses UTILITY_HULL_INSPECTION unconditionally");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health() -> HealthConfig {
        HealthConfig { min_battery_preflight: 50.0, min_battery_emergency: 20.0, min_battery_patrol_rtl: 30.0, max_heartbeat_latency: 5.0, high_battery_threshold: 80.0, snapshot_path: None }
    }

    #[test]
    fn payload_always_refuses_hull_inspection() {
        assert!(decide_start_trigger("p1", Role::Payload, MissionStartType::UtilityHullInspection, 100.0, &health()).is_none());
    }

    #[test]
    fn utility_refuses_general_emergency_below_patrol_rtl_threshold() {
        assert!(decide_start_trigger("u1", Role::Utility, MissionStartType::GeneralEmergency, 25.0, &health()).is_none());
        assert!(decide_start_trigger("u1", Role::Utility, MissionStartType::GeneralEmergency, 35.0, &health()).is_some());
    }

    #[test]
    fn scout_requires_high_battery_for_hull_inspection() {
        assert!(decide_start_trigger("s1", Role::Scout, MissionStartType::UtilityHullInspection, 70.0, &health()).is_none());
        assert!(decide_start_trigger("s1", Role::Scout, MissionStartType::UtilityHullInspection, 90.0, &health()).is_some());
    }

    #[test]
    fn mob_emergency_tasks_every_role() {
        assert!(decide_start_trigger("s1", Role::Scout, MissionStartType::MobEmergency, 100.0, &health()).is_some());
        assert!(decide_start_trigger("p1", Role::Payload, MissionStartType::MobEmergency, 100.0, &health()).is_some());
        assert!(decide_start_trigger("u1", Role::Utility, MissionStartType::MobEmergency, 100.0, &health()).is_some());
    }
}
