use serde::{Deserialize, Serialize};

use crate::error::MissionError;
use crate::role::Role;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}
fn default_mqtt_port() -> u16 {
    7883
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self { host: default_mqtt_host(), port: default_mqtt_port() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcsConfig {
    #[serde(default = "default_gcs_host")]
    pub host: String,
    #[serde(default = "default_gcs_port")]
    pub port: u16,
}

fn default_gcs_host() -> String {
    "0.0.0.0".to_string()
}
fn default_gcs_port() -> u16 {
    8765
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self { host: default_gcs_host(), port: default_gcs_port() }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct HealthConfig {
    pub min_battery_preflight: f64,
    pub min_battery_emergency: f64,
    pub min_battery_patrol_rtl: f64,
    pub max_heartbeat_latency: f64,
    /// Threshold the mission agent's utility-inspection acceptance guard
    /// checks against; kept as a configured field rather than a constant so
    /// operators can tune it per deployment.
    pub high_battery_threshold: f64,
    /// Path to append the optional per-drone CSV snapshot to. Absent =
    /// snapshotting disabled.
    pub snapshot_path: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_battery_preflight: 50.0,
            min_battery_emergency: 20.0,
            min_battery_patrol_rtl: 30.0,
            max_heartbeat_latency: 5.0,
            high_battery_threshold: 80.0,
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DroneKind {
    Simulated,
    Real,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DroneEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DroneKind,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SearchArea {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ProbSearchConfig {
    pub grid_size: usize,
    pub search_area_size_m: f64,
    pub search_altitude: f64,
    pub r_max: f64,
    pub h_ref: f64,
    pub miss_probability: f64,
    pub evolve_interval_s: f64,
    pub waypoint_interval_s: f64,
    pub drift_x_m_s: f64,
    pub drift_y_m_s: f64,
    pub area: SearchArea,
}

impl Default for ProbSearchConfig {
    fn default() -> Self {
        Self {
            grid_size: 100,
            search_area_size_m: 2000.0,
            search_altitude: 100.0,
            r_max: 500.0,
            h_ref: 50.0,
            miss_probability: 0.1,
            evolve_interval_s: 5.0,
            waypoint_interval_s: 10.0,
            drift_x_m_s: 0.5,
            drift_y_m_s: 0.2,
            area: SearchArea { x: 0.0, y: 0.0, z: 0.0 },
        }
    }
}

/// Waypoint-generation pattern for ROLE_SEARCH_ASSIST / ROLE_UTILITY_TASK.
/// `Lawnmower` is the one the mission behaviors exercise by default;
/// `VerticalAscent`/`Random` are two alternate patrol generators, kept
/// selectable through configuration for parity with the wider schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    VerticalAscent,
    Random,
    Lawnmower,
}

/// Waypoint-approach pattern for DELIVERING / ROLE_EMERGENCY_EYES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightAlgorithm {
    PrecisionHover,
    Direct,
    Orbit,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SearchStrategyConfig {
    pub algorithm: SearchAlgorithm,
    pub area: SearchArea,
    pub size: f64,
}

impl Default for SearchStrategyConfig {
    fn default() -> Self {
        Self { algorithm: SearchAlgorithm::Lawnmower, area: SearchArea { x: 0.0, y: 0.0, z: 0.0 }, size: 2000.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FlightStrategyConfig {
    pub algorithm: FlightAlgorithm,
}

impl Default for FlightStrategyConfig {
    fn default() -> Self {
        Self { algorithm: FlightAlgorithm::PrecisionHover }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct StrategiesConfig {
    #[serde(default)]
    pub search: SearchStrategyConfig,
    #[serde(default)]
    pub flight: FlightStrategyConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LawnmowerConfig {
    pub patrol_altitude: f64,
    pub spacing: f64,
    pub leg_length: f64,
    pub num_legs: u32,
}

impl Default for LawnmowerConfig {
    fn default() -> Self {
        Self { patrol_altitude: 40.0, spacing: 50.0, leg_length: 500.0, num_legs: 10 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OrbitConfig {
    pub radius: f64,
    pub speed: f64,
    pub altitude_offset: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self { radius: 100.0, speed: 10.0, altitude_offset: 30.0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PrecisionHoverConfig {
    pub altitude_offset: f64,
}

impl Default for PrecisionHoverConfig {
    fn default() -> Self {
        Self { altitude_offset: 2.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MissionConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub gcs: GcsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub drones: Vec<DroneEntry>,
    #[serde(default)]
    pub prob_search: ProbSearchConfig,
    #[serde(default)]
    pub lawnmower: LawnmowerConfig,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub precision_hover: PrecisionHoverConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
}

/// Bundled fallback document, used when no `--config` path is readable and
/// `--strict` was not requested.
const DEFAULT_CONFIG_TOML: &str = include_str!("../config.default.toml");

impl MissionConfig {
    /// Load from `path`. On read/parse failure: if `strict` is set, return a
    /// `FatalConfig` error; otherwise fall back to the compiled-in default
    /// document, matching the teacher's own config-loading fallback.
    pub fn load(path: &str, strict: bool) -> Result<Self, MissionError> {
        let parsed = match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| MissionError::FatalConfig(format!("invalid config at {path}: {e}"))),
            Err(e) => Err(MissionError::FatalConfig(format!("cannot read {path}: {e}"))),
        };
        match parsed {
            Ok(config) => Ok(config),
            Err(e) if strict => Err(e),
            Err(_) => toml::from_str(DEFAULT_CONFIG_TOML)
                .map_err(|e| MissionError::FatalConfig(format!("invalid built-in default config: {e}"))),
        }
    }

    pub fn drone(&self, id: &str) -> Option<&DroneEntry> {
        self.drones.iter().find(|d| d.id == id)
    }
}
