//! Typed per-drone mission state machine.
//!
//! Deliberately *not* built on a metaprogrammed state-machine library: states
//! are a plain enum, transitions are rows in a static table, and conditions
//! are plain predicate functions over (role, mission_type) rather than
//! strings resolved at runtime. Adding a transition is adding one row.

use mob_domain::{MissionPhase, MissionType, Role};
use tracing::{debug, info, warn};

/// Named triggers a caller can fire against the machine. Unlike `MissionPhase`
/// this is an input, not a snapshot of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    StartMission,
    StartStandbyMission,
    StartPatrolMission,
    StartOverwatchMission,
    StartDeliveryMission,
    PreflightSuccess,
    TakeoffSuccess,
    TargetSighted,
    ConfirmTarget,
    RejectTarget,
    SearchCompleteNegative,
    DeliveryRequestSent,
    DeliveryComplete,
    PatrolComplete,
    PatrolBatteryLow,
    OverwatchComplete,
    ArrivedHome,
    LandComplete,
    TriggerEmergency,
    LocalOperatorTakeover,
    LocalOperatorRelease,
    MissionFinished,
    ResetFromEmergency,
}

/// The set of source phases a transition row applies from.
enum FromSet {
    Any,
    AnyExcept(MissionPhase),
    States(&'static [MissionPhase]),
}

impl FromSet {
    fn contains(&self, phase: MissionPhase) -> bool {
        match self {
            FromSet::Any => true,
            FromSet::AnyExcept(excluded) => phase != *excluded,
            FromSet::States(set) => set.contains(&phase),
        }
    }
}

/// Guard predicate over the drone's static role and its current mission type.
type Guard = fn(Role, MissionType) -> bool;

struct TransitionRow {
    trigger: Trigger,
    from: FromSet,
    to: MissionPhase,
    guard: Option<Guard>,
}

fn is_scout(role: Role, _t: MissionType) -> bool {
    role == Role::Scout
}
fn is_utility(role: Role, _t: MissionType) -> bool {
    role == Role::Utility
}
fn is_mob_search(_r: Role, t: MissionType) -> bool {
    t == MissionType::MobSearch
}
fn is_mob_search_and_scout(r: Role, t: MissionType) -> bool {
    is_mob_search(r, t) && is_scout(r, t)
}
fn is_mob_search_and_utility(r: Role, t: MissionType) -> bool {
    is_mob_search(r, t) && is_utility(r, t)
}
fn is_standby(_r: Role, t: MissionType) -> bool {
    t == MissionType::Standby
}
fn is_patrol(_r: Role, t: MissionType) -> bool {
    t == MissionType::Patrol
}
fn is_overwatch_and_scout(r: Role, t: MissionType) -> bool {
    t == MissionType::Overwatch && is_scout(r, t)
}
fn is_overwatch_and_utility(r: Role, t: MissionType) -> bool {
    t == MissionType::Overwatch && is_utility(r, t)
}
fn is_delivery(_r: Role, t: MissionType) -> bool {
    t == MissionType::PayloadDelivery
}

use MissionPhase::*;

const IDLE_OR_UTILITY_TASK: &[MissionPhase] = &[Idle, RoleUtilityTask];
const SEARCH_PHASES: &[MissionPhase] = &[RoleSearchPrimary, RoleSearchAssist];
const IDLE_OR_STANDBY: &[MissionPhase] = &[Idle, RoleEmergencyStandby];
const OVERWATCH_PHASES: &[MissionPhase] = &[RoleEmergencyEyes, RoleEmergencyAssist];

static TABLE: &[TransitionRow] = &[
    TransitionRow { trigger: Trigger::StartMission, from: FromSet::States(IDLE_OR_UTILITY_TASK), to: Preflight, guard: None },
    TransitionRow { trigger: Trigger::StartStandbyMission, from: FromSet::States(IDLE_OR_UTILITY_TASK), to: Preflight, guard: None },
    TransitionRow { trigger: Trigger::StartPatrolMission, from: FromSet::States(&[Idle]), to: Preflight, guard: None },
    TransitionRow { trigger: Trigger::StartOverwatchMission, from: FromSet::States(IDLE_OR_UTILITY_TASK), to: Preflight, guard: None },
    TransitionRow { trigger: Trigger::StartDeliveryMission, from: FromSet::States(IDLE_OR_STANDBY), to: Preflight, guard: None },
    TransitionRow { trigger: Trigger::PreflightSuccess, from: FromSet::States(&[Preflight]), to: Takeoff, guard: None },

    // takeoff_success fans out by (role, mission_type) — one row per destination.
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleSearchPrimary, guard: Some(is_mob_search_and_scout) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleSearchAssist, guard: Some(is_mob_search_and_utility) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleEmergencyStandby, guard: Some(is_standby) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleUtilityTask, guard: Some(is_patrol) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleEmergencyAssist, guard: Some(is_overwatch_and_utility) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: RoleEmergencyEyes, guard: Some(is_overwatch_and_scout) },
    TransitionRow { trigger: Trigger::TakeoffSuccess, from: FromSet::States(&[Takeoff]), to: Delivering, guard: Some(is_delivery) },

    TransitionRow { trigger: Trigger::TargetSighted, from: FromSet::States(SEARCH_PHASES), to: TargetPendingConfirmation, guard: None },
    TransitionRow { trigger: Trigger::RejectTarget, from: FromSet::States(&[TargetPendingConfirmation]), to: RoleSearchPrimary, guard: Some(is_scout) },
    TransitionRow { trigger: Trigger::RejectTarget, from: FromSet::States(&[TargetPendingConfirmation]), to: RoleSearchAssist, guard: Some(is_utility) },
    TransitionRow { trigger: Trigger::ConfirmTarget, from: FromSet::States(&[TargetPendingConfirmation]), to: TargetConfirmed, guard: None },

    TransitionRow { trigger: Trigger::SearchCompleteNegative, from: FromSet::States(SEARCH_PHASES), to: Returning, guard: None },
    TransitionRow { trigger: Trigger::DeliveryRequestSent, from: FromSet::States(&[TargetConfirmed]), to: Returning, guard: None },
    TransitionRow { trigger: Trigger::DeliveryComplete, from: FromSet::States(&[Delivering]), to: Returning, guard: None },
    TransitionRow { trigger: Trigger::PatrolComplete, from: FromSet::States(&[RoleUtilityTask]), to: Returning, guard: None },
    TransitionRow { trigger: Trigger::PatrolBatteryLow, from: FromSet::States(&[RoleUtilityTask]), to: Returning, guard: None },
    TransitionRow { trigger: Trigger::OverwatchComplete, from: FromSet::States(OVERWATCH_PHASES), to: Returning, guard: None },

    TransitionRow { trigger: Trigger::ArrivedHome, from: FromSet::States(&[Returning]), to: Landing, guard: None },
    TransitionRow { trigger: Trigger::LandComplete, from: FromSet::States(&[Landing]), to: Completed, guard: None },

    TransitionRow { trigger: Trigger::TriggerEmergency, from: FromSet::Any, to: Emergency, guard: None },
    TransitionRow { trigger: Trigger::LocalOperatorTakeover, from: FromSet::AnyExcept(Emergency), to: LocalOperatorControl, guard: None },
    TransitionRow { trigger: Trigger::LocalOperatorRelease, from: FromSet::States(&[LocalOperatorControl]), to: Returning, guard: None },

    TransitionRow { trigger: Trigger::MissionFinished, from: FromSet::States(&[Completed]), to: Idle, guard: None },
    TransitionRow { trigger: Trigger::ResetFromEmergency, from: FromSet::States(&[Emergency]), to: Idle, guard: None },
];

/// One drone's live state machine. Owns only the phase; role and
/// mission_type live alongside it in the mission agent and are passed in at
/// trigger time so guards can evaluate them.
pub struct DroneStateMachine {
    drone_id: String,
    role: Role,
    phase: MissionPhase,
}

impl DroneStateMachine {
    pub fn new(drone_id: impl Into<String>, role: Role) -> Self {
        Self { drone_id: drone_id.into(), role, phase: MissionPhase::INITIAL }
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn drone_id(&self) -> &str {
        &self.drone_id
    }

    /// Attempt `trigger` against the current phase with `mission_type` as the
    /// guard context. Returns the new phase on success. Triggers with no
    /// matching row are rejected silently (callers must tolerate this, per
    /// the kernel's precondition-failure semantics) and logged at `debug`.
    pub fn fire(&mut self, trigger: Trigger, mission_type: MissionType) -> Option<MissionPhase> {
        let row = TABLE.iter().find(|row| {
            row.trigger == trigger
                && row.from.contains(self.phase)
                && row.guard.map(|g| g(self.role, mission_type)).unwrap_or(true)
        });

        match row {
            Some(row) => {
                let from = self.phase;
                self.phase = row.to;
                info!(
                    drone_id = %self.drone_id,
                    from = %from,
                    to = %row.to,
                    trigger = ?trigger,
                    "state transition"
                );
                Some(row.to)
            }
            None => {
                debug!(
                    drone_id = %self.drone_id,
                    phase = %self.phase,
                    trigger = ?trigger,
                    "trigger rejected: no matching transition"
                );
                None
            }
        }
    }

    /// Force the phase directly. Used only by the agent's `fleet/connect`
    /// bootstrap (phase is always IDLE at that point) — never by mission
    /// logic, which must go through `fire`.
    pub fn reset_to_idle(&mut self) {
        if self.phase != MissionPhase::Idle {
            warn!(drone_id = %self.drone_id, phase = %self.phase, "forcing phase to IDLE outside of a transition");
        }
        self.phase = MissionPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scout_mob_search_happy_path() {
        let mut m = DroneStateMachine::new("scout_1", Role::Scout);
        assert_eq!(m.phase(), Idle);
        assert_eq!(m.fire(Trigger::StartMission, MissionType::MobSearch), Some(Preflight));
        assert_eq!(m.fire(Trigger::PreflightSuccess, MissionType::MobSearch), Some(Takeoff));
        assert_eq!(m.fire(Trigger::TakeoffSuccess, MissionType::MobSearch), Some(RoleSearchPrimary));
        assert_eq!(m.fire(Trigger::TargetSighted, MissionType::MobSearch), Some(TargetPendingConfirmation));
        assert_eq!(m.fire(Trigger::ConfirmTarget, MissionType::MobSearch), Some(TargetConfirmed));
        assert_eq!(m.fire(Trigger::DeliveryRequestSent, MissionType::MobSearch), Some(Returning));
        assert_eq!(m.fire(Trigger::ArrivedHome, MissionType::MobSearch), Some(Landing));
        assert_eq!(m.fire(Trigger::LandComplete, MissionType::MobSearch), Some(Completed));
        assert_eq!(m.fire(Trigger::MissionFinished, MissionType::MobSearch), Some(Idle));
    }

    #[test]
    fn payload_never_enters_search_or_utility_phases() {
        let mut m = DroneStateMachine::new("payload_1", Role::Payload);
        m.fire(Trigger::StartMission, MissionType::MobSearch);
        m.fire(Trigger::PreflightSuccess, MissionType::MobSearch);
        // payload has no MOB_SEARCH takeoff row at all: trigger is rejected.
        assert_eq!(m.fire(Trigger::TakeoffSuccess, MissionType::MobSearch), None);
        assert_ne!(m.phase(), RoleSearchPrimary);
        assert_ne!(m.phase(), RoleSearchAssist);
        assert_ne!(m.phase(), RoleUtilityTask);
    }

    #[test]
    fn emergency_is_absorbing_except_for_reset() {
        let mut m = DroneStateMachine::new("scout_1", Role::Scout);
        m.fire(Trigger::TriggerEmergency, MissionType::Idle);
        assert_eq!(m.phase(), Emergency);
        assert_eq!(m.fire(Trigger::StartMission, MissionType::Idle), None);
        assert_eq!(m.fire(Trigger::TargetSighted, MissionType::Idle), None);
        assert_eq!(m.fire(Trigger::ResetFromEmergency, MissionType::Idle), Some(Idle));
    }

    #[test]
    fn local_operator_control_cannot_be_entered_from_emergency() {
        let mut m = DroneStateMachine::new("u_1", Role::Utility);
        m.fire(Trigger::TriggerEmergency, MissionType::Idle);
        assert_eq!(m.fire(Trigger::LocalOperatorTakeover, MissionType::Idle), None);
    }

    #[test]
    fn local_operator_release_always_goes_to_returning() {
        let mut m = DroneStateMachine::new("u_1", Role::Utility);
        m.fire(Trigger::StartMission, MissionType::Patrol);
        m.fire(Trigger::PreflightSuccess, MissionType::Patrol);
        m.fire(Trigger::TakeoffSuccess, MissionType::Patrol);
        assert_eq!(m.phase(), RoleUtilityTask);
        m.fire(Trigger::LocalOperatorTakeover, MissionType::Patrol);
        assert_eq!(m.phase(), LocalOperatorControl);
        assert_eq!(m.fire(Trigger::LocalOperatorRelease, MissionType::Patrol), Some(Returning));
    }

    #[test]
    fn reject_target_returns_scout_to_search_primary() {
        let mut m = DroneStateMachine::new("scout_1", Role::Scout);
        m.fire(Trigger::StartMission, MissionType::MobSearch);
        m.fire(Trigger::PreflightSuccess, MissionType::MobSearch);
        m.fire(Trigger::TakeoffSuccess, MissionType::MobSearch);
        m.fire(Trigger::TargetSighted, MissionType::MobSearch);
        assert_eq!(m.fire(Trigger::RejectTarget, MissionType::MobSearch), Some(RoleSearchPrimary));
    }
}
