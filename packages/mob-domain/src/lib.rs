//! Shared data model, configuration schema, and error taxonomy for the
//! drone-fleet mission kernel: the types every other crate in the workspace
//! passes across its own boundaries.

pub mod config;
pub mod detection;
pub mod error;
pub mod fleet_record;
pub mod phase;
pub mod position;
pub mod role;
pub mod snapshot;
pub mod telemetry;
pub mod wire;

pub use config::{
    DroneEntry, DroneKind, FlightAlgorithm, GcsConfig, HealthConfig, LawnmowerConfig, MissionConfig,
    MqttConfig, OrbitConfig, PrecisionHoverConfig, ProbSearchConfig, SearchAlgorithm, SearchArea,
    StrategiesConfig,
};
pub use detection::Detection;
pub use error::MissionError;
pub use fleet_record::FleetVehicleRecord;
pub use phase::MissionPhase;
pub use position::Position;
pub use role::{MissionType, Role};
pub use snapshot::SnapshotRow;
pub use telemetry::{Attitude, LedColor, Telemetry, VehicleMode};

/// Milliseconds since the Unix epoch, used throughout the kernel for
/// heartbeat staleness checks and CSV snapshot timestamps.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
