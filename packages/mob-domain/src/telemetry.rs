use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Flight-controller vehicle mode. Distinct from `MissionPhase` — never conflate
/// the two when serializing telemetry (see design notes on the source mixing them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleMode {
    Disarmed,
    Armed,
    TakingOff,
    Guided,
    Loiter,
    Landing,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Attitude {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Off,
    Green,
    Red,
    Blue,
    White,
}

/// Immutable per-drone telemetry snapshot. Each poll produces a new instance;
/// nothing here is mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub position: Position,
    pub attitude: Attitude,
    pub battery_pct: f64,
    pub vehicle_mode: VehicleMode,
    pub led: LedColor,
    pub connected: bool,
    /// Unix epoch milliseconds of the last received heartbeat.
    pub last_heartbeat_ms: u64,
}

impl Telemetry {
    pub fn age_seconds(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.last_heartbeat_ms) as f64 / 1000.0
    }
}
