//! Waypoint-generation strategies selected by `strategies.search.algorithm`
//! and `strategies.flight.algorithm`. These drive the local movement
//! patterns (patrol sweeps, orbits, precision approaches) that sit alongside
//! the coordinator-driven probability-grid search.

use mob_domain::{FlightAlgorithm, LawnmowerConfig, OrbitConfig, PrecisionHoverConfig, Position, SearchAlgorithm};
use rand::Rng;

/// Boustrophedon ("lawnmower") coverage pattern: fixed-length legs offset by
/// `spacing`, alternating direction each leg.
pub struct LawnmowerPattern {
    origin: Position,
    config: LawnmowerConfig,
    leg: u32,
}

impl LawnmowerPattern {
    pub fn new(origin: Position, config: LawnmowerConfig) -> Self {
        Self { origin, config, leg: 0 }
    }

    /// Next waypoint in the sweep, or `None` once `num_legs` have been flown
    /// (the caller should then fire `patrol_complete` / `search_complete`).
    pub fn next_waypoint(&mut self) -> Option<Position> {
        if self.leg >= self.config.num_legs {
            return None;
        }
        let forward = self.leg % 2 == 0;
        let along = if forward { self.config.leg_length } else { 0.0 };
        let across = self.leg as f64 * self.config.spacing;
        self.leg += 1;
        Some(Position::new(
            self.origin.x + along,
            self.origin.y + across,
            self.config.patrol_altitude,
        ))
    }

}

/// Vertical-ascent pattern: climbs in place through a handful of altitude
/// bands, widening visibility without lateral movement. One of three patrol
/// generators, kept selectable even though the default mission behaviors
/// only exercise `Lawnmower`.
pub struct VerticalAscentPattern {
    origin: Position,
    step: u32,
    bands: u32,
    band_height: f64,
}

impl VerticalAscentPattern {
    pub fn new(origin: Position, bands: u32, band_height: f64) -> Self {
        Self { origin, step: 0, bands, band_height }
    }

    pub fn next_waypoint(&mut self) -> Option<Position> {
        if self.step >= self.bands {
            return None;
        }
        self.step += 1;
        Some(self.origin.with_altitude(self.step as f64 * self.band_height))
    }
}

/// Uniform-random waypoint within a square area, for the `Random` patrol
/// generator.
pub struct RandomPattern {
    center: Position,
    half_size_m: f64,
    altitude: f64,
}

impl RandomPattern {
    pub fn new(center: Position, size_m: f64, altitude: f64) -> Self {
        Self { center, half_size_m: size_m / 2.0, altitude }
    }

    pub fn next_waypoint(&self) -> Position {
        let mut rng = rand::thread_rng();
        let dx = rng.gen_range(-self.half_size_m..=self.half_size_m);
        let dy = rng.gen_range(-self.half_size_m..=self.half_size_m);
        Position::new(self.center.x + dx, self.center.y + dy, self.altitude)
    }
}

/// Dispatches on the configured `SearchAlgorithm`. Only `Lawnmower` is finite
/// (returns `None` when exhausted); the other two patterns are unbounded and
/// the caller's own iteration budget decides when to stop.
pub enum SearchPattern {
    Lawnmower(LawnmowerPattern),
    VerticalAscent(VerticalAscentPattern),
    Random(RandomPattern),
}

impl SearchPattern {
    pub fn new(algorithm: SearchAlgorithm, origin: Position, lawnmower: LawnmowerConfig, area_size_m: f64) -> Self {
        match algorithm {
            SearchAlgorithm::Lawnmower => SearchPattern::Lawnmower(LawnmowerPattern::new(origin, lawnmower)),
            SearchAlgorithm::VerticalAscent => {
                SearchPattern::VerticalAscent(VerticalAscentPattern::new(origin, lawnmower.num_legs, 10.0))
            }
            SearchAlgorithm::Random => {
                SearchPattern::Random(RandomPattern::new(origin, area_size_m, lawnmower.patrol_altitude))
            }
        }
    }

    pub fn next_waypoint(&mut self) -> Option<Position> {
        match self {
            SearchPattern::Lawnmower(p) => p.next_waypoint(),
            SearchPattern::VerticalAscent(p) => p.next_waypoint(),
            SearchPattern::Random(p) => Some(p.next_waypoint()),
        }
    }
}

/// Orbit flight strategy: circles `center` at fixed `radius`/`altitude_offset`,
/// advancing by `speed`-derived angular step each call. Used by
/// ROLE_EMERGENCY_EYES to hold an overwatch pattern above a point of interest.
pub struct OrbitStrategy {
    center: Position,
    config: OrbitConfig,
    angle_rad: f64,
}

impl OrbitStrategy {
    pub fn new(center: Position, config: OrbitConfig) -> Self {
        Self { center, config, angle_rad: 0.0 }
    }

    /// Advance the orbit by `dt` seconds and return the next point on the
    /// circle. `speed` is linear (m/s); angular step is `speed * dt / radius`.
    pub fn next_waypoint(&mut self, dt: f64) -> Position {
        let angular_step = if self.config.radius > 0.0 { self.config.speed * dt / self.config.radius } else { 0.0 };
        self.angle_rad = (self.angle_rad + angular_step) % std::f64::consts::TAU;
        Position::new(
            self.center.x + self.config.radius * self.angle_rad.cos(),
            self.center.y + self.config.radius * self.angle_rad.sin(),
            self.center.z + self.config.altitude_offset,
        )
    }
}

/// Precision-hover approach: fly directly to `target + altitude_offset` and
/// hold. Used by DELIVERING to stage the payload drop above the target.
pub fn precision_hover_point(target: Position, config: PrecisionHoverConfig) -> Position {
    target.with_altitude(target.z + config.altitude_offset)
}

/// Direct flight strategy: fly straight to `target` with no altitude
/// adjustment, the simplest of the three `strategies.flight.algorithm`
/// options.
pub fn direct_point(target: Position) -> Position {
    target
}

/// Dispatches the approach point for DELIVERING/overwatch behaviors on the
/// configured `FlightAlgorithm`. `Orbit` needs a live `OrbitStrategy` to
/// advance, so it is handled by the caller directly; this covers the two
/// single-shot algorithms.
pub fn approach_point(algorithm: FlightAlgorithm, target: Position, precision_hover: PrecisionHoverConfig) -> Position {
    match algorithm {
        FlightAlgorithm::PrecisionHover => precision_hover_point(target, precision_hover),
        FlightAlgorithm::Direct => direct_point(target),
        FlightAlgorithm::Orbit => target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lawnmower_alternates_direction_and_terminates() {
        let cfg = LawnmowerConfig { patrol_altitude: 40.0, spacing: 10.0, leg_length: 100.0, num_legs: 3 };
        let mut pattern = LawnmowerPattern::new(Position::new(0.0, 0.0, 0.0), cfg);
        let a = pattern.next_waypoint().unwrap();
        let b = pattern.next_waypoint().unwrap();
        let c = pattern.next_waypoint().unwrap();
        assert!(pattern.next_waypoint().is_none());
        assert_eq!(a.x, 100.0);
        assert_eq!(b.x, 0.0);
        assert_eq!(c.x, 100.0);
        assert_eq!(b.y, 10.0);
    }

    #[test]
    fn orbit_stays_on_circle() {
        let cfg = OrbitConfig { radius: 50.0, speed: 5.0, altitude_offset: 20.0 };
        let mut orbit = OrbitStrategy::new(Position::new(0.0, 0.0, 0.0), cfg);
        let p = orbit.next_waypoint(1.0);
        let r = (p.x * p.x + p.y * p.y).sqrt();
        assert!((r - 50.0).abs() < 1e-9);
        assert_eq!(p.z, 20.0);
    }

    #[test]
    fn precision_hover_adds_altitude_offset() {
        let target = Position::new(10.0, 10.0, 5.0);
        let cfg = PrecisionHoverConfig { altitude_offset: 2.0 };
        let p = precision_hover_point(target, cfg);
        assert_eq!(p.z, 7.0);
    }
}
