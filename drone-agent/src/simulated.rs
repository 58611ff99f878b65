//! Simulated flight-controller and detector backends. Deliberately thin: a
//! drone-agent process wired to these can run the full mission kernel
//! end-to-end without any real vehicle or camera attached. These are
//! themselves external collaborators, not part of the mission kernel proper.

use async_trait::async_trait;
use mob_domain::{Detection, LedColor, MissionError, Position, Telemetry, VehicleMode};
use rand::Rng;
use tracing::{debug, info};

use crate::controller::FlightController;
use crate::detector::Detector;

/// Battery drained per telemetry poll while airborne, percent. Tuned so a
/// multi-minute mission visibly burns battery without requiring a long test.
const DRAIN_PER_POLL: f64 = 0.05;
/// Fraction of takeoff/goto/land calls treated as a local-operator MANUAL
/// flip, for exercising the health monitor's takeover detection without a
/// real RC transmitter. Zero by default; tests override it directly.
const DEFAULT_MANUAL_FLIP_CHANCE: f64 = 0.0;

pub struct SimulatedController {
    drone_id: String,
    position: Position,
    home: Position,
    battery_pct: f64,
    vehicle_mode: VehicleMode,
    led: LedColor,
    connected: bool,
    last_heartbeat_ms: u64,
    manual_flip_chance: f64,
}

impl SimulatedController {
    pub fn new(drone_id: impl Into<String>, home: Position) -> Self {
        Self {
            drone_id: drone_id.into(),
            position: home,
            home,
            battery_pct: 100.0,
            vehicle_mode: VehicleMode::Disarmed,
            led: LedColor::Off,
            connected: false,
            last_heartbeat_ms: mob_domain::now_ms(),
            manual_flip_chance: DEFAULT_MANUAL_FLIP_CHANCE,
        }
    }

    /// Force the battery reading, for health-monitor emergency-trigger tests.
    pub fn set_battery(&mut self, pct: f64) {
        self.battery_pct = pct;
    }

    pub fn position(&self) -> Position {
        self.position
    }
}

#[async_trait]
impl FlightController for SimulatedController {
    async fn connect(&mut self) -> Result<(), MissionError> {
        self.connected = true;
        self.vehicle_mode = VehicleMode::Armed;
        self.last_heartbeat_ms = mob_domain::now_ms();
        info!(drone_id = %self.drone_id, "simulated controller connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        self.vehicle_mode = VehicleMode::Disarmed;
        info!(drone_id = %self.drone_id, "simulated controller disconnected");
    }

    async fn takeoff(&mut self, altitude_m: f64) -> Result<(), MissionError> {
        if !self.connected {
            return Err(MissionError::ResourceShortage(format!("{} controller not connected", self.drone_id)));
        }
        self.vehicle_mode = VehicleMode::TakingOff;
        self.position.z = altitude_m;
        self.vehicle_mode = VehicleMode::Guided;
        self.last_heartbeat_ms = mob_domain::now_ms();
        debug!(drone_id = %self.drone_id, altitude_m, "simulated takeoff complete");
        Ok(())
    }

    async fn goto(&mut self, target: Position) -> Result<(), MissionError> {
        if !self.connected {
            return Err(MissionError::ResourceShortage(format!("{} controller not connected", self.drone_id)));
        }
        self.position = target;
        self.vehicle_mode = VehicleMode::Guided;
        self.last_heartbeat_ms = mob_domain::now_ms();
        Ok(())
    }

    async fn land(&mut self) -> Result<(), MissionError> {
        self.vehicle_mode = VehicleMode::Landing;
        self.position.z = 0.0;
        self.vehicle_mode = VehicleMode::Disarmed;
        self.last_heartbeat_ms = mob_domain::now_ms();
        info!(drone_id = %self.drone_id, "simulated landing complete");
        Ok(())
    }

    async fn return_to_home(&mut self) -> Result<(), MissionError> {
        let cruise_altitude = self.position.z.max(1.0);
        self.goto(self.home.with_altitude(cruise_altitude)).await
    }

    async fn set_led(&mut self, color: LedColor) {
        self.led = color;
    }

    async fn poll_telemetry(&mut self) -> Telemetry {
        if self.connected && self.vehicle_mode != VehicleMode::Disarmed {
            self.battery_pct = (self.battery_pct - DRAIN_PER_POLL).max(0.0);
            if self.manual_flip_chance > 0.0 && rand::thread_rng().gen_bool(self.manual_flip_chance) {
                self.vehicle_mode = VehicleMode::Manual;
            }
        }
        self.last_heartbeat_ms = mob_domain::now_ms();
        Telemetry {
            position: self.position,
            attitude: Default::default(),
            battery_pct: self.battery_pct,
            vehicle_mode: self.vehicle_mode,
            led: self.led,
            connected: self.connected,
            last_heartbeat_ms: self.last_heartbeat_ms,
        }
    }
}

/// Returns a detection once the drone comes within `detection_radius_m` of
/// `target`, confidence rising with proximity. `None` target means "nothing
/// to find" (used by payload/utility drones, which never scan).
pub struct SimulatedDetector {
    target: Option<Position>,
    detection_radius_m: f64,
    source: String,
}

impl SimulatedDetector {
    pub fn new(drone_id: impl Into<String>) -> Self {
        Self { target: None, detection_radius_m: 60.0, source: drone_id.into() }
    }

    pub fn place_target(&mut self, pos: Position) {
        self.target = Some(pos);
    }
}

#[async_trait]
impl Detector for SimulatedDetector {
    async fn scan(&mut self, drone_pos: Position, _altitude_m: f64) -> Option<Detection> {
        let target = self.target?;
        let distance = drone_pos.distance_xy(&target);
        if distance > self.detection_radius_m {
            return None;
        }
        let confidence = (1.0 - distance / self.detection_radius_m).clamp(0.3, 0.99);
        Some(Detection {
            image_x: 0.5,
            image_y: 0.5,
            world_position: Some(target),
            confidence,
            is_person: true,
            source: self.source.clone(),
            metadata: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn controller_takeoff_and_goto_update_position() {
        let mut c = SimulatedController::new("scout_1", Position::new(0.0, 0.0, 0.0));
        c.connect().await.unwrap();
        c.takeoff(50.0).await.unwrap();
        assert_eq!(c.position().z, 50.0);
        c.goto(Position::new(10.0, 20.0, 50.0)).await.unwrap();
        assert_eq!(c.position(), Position::new(10.0, 20.0, 50.0));
    }

    #[tokio::test]
    async fn detector_fires_only_within_radius() {
        let mut d = SimulatedDetector::new("scout_1");
        d.place_target(Position::new(100.0, 0.0, 0.0));
        assert!(d.scan(Position::new(0.0, 0.0, 50.0), 50.0).await.is_none());
        let hit = d.scan(Position::new(90.0, 0.0, 50.0), 50.0).await;
        assert!(hit.is_some());
        assert!(hit.unwrap().exceeds(0.2));
    }
}
