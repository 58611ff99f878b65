use serde::{Deserialize, Serialize};

/// Static per-drone role. Drives which mission types a drone accepts; modeled
/// as a tagged variant rather than a free-form string so dispatch on role is
/// exhaustive and checked by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Scout,
    Payload,
    Utility,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Scout => "scout",
            Role::Payload => "payload",
            Role::Utility => "utility",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orthogonal context carried alongside `MissionPhase`, used as a guard when
/// several transitions share a trigger (e.g. `takeoff_success`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionType {
    MobSearch,
    Standby,
    Patrol,
    Overwatch,
    PayloadDelivery,
    Idle,
}
