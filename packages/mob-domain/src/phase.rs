use serde::{Deserialize, Serialize};

/// Tagged mission-phase enumeration. Exactly one phase is active per drone at
/// any time; transitions between phases are the sole responsibility of the
/// state machine in `mob-fsm` — nothing else may assign this field directly.
///
/// `ROLE_EMERGENCY_STANDBY` is the one and only airborne-hover-awaiting-task
/// phase: the phase list names it twice under two labels ("ROLE_SEARCH_DELIVER
/// (≡ STANDBY)" and "ROLE_EMERGENCY_STANDBY"), so this enum carries a single
/// variant rather than two that would alias to the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionPhase {
    Idle,
    Preflight,
    Takeoff,
    RoleSearchPrimary,
    RoleSearchAssist,
    RoleEmergencyEyes,
    RoleEmergencyStandby,
    RoleEmergencyAssist,
    RoleUtilityTask,
    TargetPendingConfirmation,
    TargetConfirmed,
    Delivering,
    Returning,
    Landing,
    Completed,
    Emergency,
    LocalOperatorControl,
}

impl MissionPhase {
    pub const INITIAL: MissionPhase = MissionPhase::Idle;

    /// True for phases in which the drone is actively searching and therefore
    /// a valid target for the coordinator's search control loop / grid update.
    pub fn is_searching(&self) -> bool {
        matches!(self, MissionPhase::RoleSearchPrimary | MissionPhase::RoleSearchAssist)
    }
}

impl std::fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        f.write_str(&s)
    }
}
