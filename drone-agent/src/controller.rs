//! Narrow interface onto the flight-controller hardware abstraction. The real
//! implementations (simulated-vehicle and MAVLink) are external collaborators
//! per the kernel's scope; this crate only ships the simulated backend so the
//! mission agent is runnable end-to-end without real hardware (see
//! `simulated.rs`).

use async_trait::async_trait;
use mob_domain::{LedColor, MissionError, Position, Telemetry};

/// Everything a mission-agent role behavior needs to drive a vehicle.
/// Implementations own their own connection and internal vehicle state; the
/// mission kernel never reaches past this interface.
#[async_trait]
pub trait FlightController: Send + Sync {
    async fn connect(&mut self) -> Result<(), MissionError>;
    async fn disconnect(&mut self);

    async fn takeoff(&mut self, altitude_m: f64) -> Result<(), MissionError>;
    async fn goto(&mut self, target: Position) -> Result<(), MissionError>;
    async fn land(&mut self) -> Result<(), MissionError>;
    async fn return_to_home(&mut self) -> Result<(), MissionError>;

    async fn set_led(&mut self, color: LedColor);

    /// Snapshot the controller's current view of the vehicle. Never fails:
    /// an unreachable controller reports `connected: false` and a stale
    /// heartbeat so the health monitor's own predicate can react.
    async fn poll_telemetry(&mut self) -> Telemetry;
}
