use serde::{Deserialize, Serialize};

use crate::phase::MissionPhase;
use crate::role::Role;
use crate::telemetry::Telemetry;

/// One entry in the coordinator's fleet roster. Owned exclusively by the
/// coordinator's bus-handler task; never exposed to the search control loop,
/// which instead queries by drone_id for a snapshot when it needs one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetVehicleRecord {
    pub drone_id: String,
    pub role: Role,
    pub telemetry: Option<Telemetry>,
    pub phase: MissionPhase,
    pub last_seen_ms: u64,
}

impl FleetVehicleRecord {
    pub fn new(drone_id: impl Into<String>, role: Role) -> Self {
        Self {
            drone_id: drone_id.into(),
            role,
            telemetry: None,
            phase: MissionPhase::INITIAL,
            last_seen_ms: 0,
        }
    }
}
