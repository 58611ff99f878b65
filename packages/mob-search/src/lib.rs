//! The probabilistic search grid: a fixed-resolution N×N field of
//! target-presence probability over a square search area, updated by
//! Bayesian no-detection observations and evolved by drift advection.

use mob_domain::Position;
use tracing::warn;

/// N×N probability grid over a square area of side `area_size_m`, centered
/// at `area_center`. Cell geometry is fixed at construction.
pub struct ProbabilityGrid {
    n: usize,
    cell_edge: f64,
    area_size_m: f64,
    area_center: (f64, f64),
    search_altitude: f64,
    r_max: f64,
    h_ref: f64,
    miss_probability: f64,
    drift_x_m_s: f64,
    drift_y_m_s: f64,
    cells: Vec<f64>,
    /// Fractional drift remainder carried across `evolve_map` calls so slow
    /// drift below one cell per call is not silently lost.
    drift_carry: (f64, f64),
}

pub struct GridParams {
    pub grid_size: usize,
    pub search_area_size_m: f64,
    pub area_center: (f64, f64),
    pub search_altitude: f64,
    pub r_max: f64,
    pub h_ref: f64,
    pub miss_probability: f64,
    pub drift_x_m_s: f64,
    pub drift_y_m_s: f64,
}

impl ProbabilityGrid {
    pub fn new(params: GridParams) -> Self {
        let n = params.grid_size.max(1);
        let mut grid = Self {
            n,
            cell_edge: params.search_area_size_m / n as f64,
            area_size_m: params.search_area_size_m,
            area_center: params.area_center,
            search_altitude: params.search_altitude,
            r_max: params.r_max,
            h_ref: params.h_ref,
            miss_probability: params.miss_probability,
            drift_x_m_s: params.drift_x_m_s,
            drift_y_m_s: params.drift_y_m_s,
            cells: vec![0.0; n * n],
            drift_carry: (0.0, 0.0),
        };
        grid.initialize_map();
        grid
    }

    pub fn grid_size(&self) -> usize {
        self.n
    }

    /// Sum of all cells. Invariant: in (0, 1] after any public operation on a
    /// non-collapsed grid.
    pub fn sum(&self) -> f64 {
        self.cells.iter().sum()
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Uniform prior. Idempotent.
    pub fn initialize_map(&mut self) {
        let uniform = 1.0 / (self.n * self.n) as f64;
        self.cells.iter_mut().for_each(|c| *c = uniform);
        self.drift_carry = (0.0, 0.0);
    }

    fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let half = self.area_size_m / 2.0;
        let x = -half + self.cell_edge / 2.0 + col as f64 * self.cell_edge;
        let y = -half + self.cell_edge / 2.0 + row as f64 * self.cell_edge;
        (x + self.area_center.0, y + self.area_center.1)
    }

    /// Returns the world-space center of the maximum-probability cell (ties
    /// broken by lowest row-major index), then suppresses that cell by ×0.1
    /// so repeated calls explore new areas. Not idempotent by design.
    pub fn get_next_search_waypoint(&mut self) -> Position {
        let (idx, _) = self
            .cells
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ib.cmp(ia))
            })
            .expect("grid is never empty");

        let row = idx / self.n;
        let col = idx % self.n;
        let (x, y) = self.cell_center(row, col);

        self.cells[idx] *= 0.1;

        Position::new(x, y, self.search_altitude)
    }

    /// Bayesian update from a sensor observation at `drone_pos`/`altitude`.
    /// `has_detection = false` multiplies every cell within the sensor's
    /// effective radius by `miss_probability` and renormalizes; re-seeds a
    /// uniform prior if the grid would collapse to zero. A detection
    /// observation locks the grid onto `drone_pos` via `confirm_target_at`.
    pub fn update_map(&mut self, drone_pos: Position, altitude: f64, has_detection: bool) {
        if has_detection {
            self.confirm_target_at(drone_pos);
            return;
        }

        let sensor_radius = self.r_max * altitude / (altitude + self.h_ref);
        let radius_sq = sensor_radius * sensor_radius;

        for row in 0..self.n {
            for col in 0..self.n {
                let (cx, cy) = self.cell_center(row, col);
                let dx = cx - drone_pos.x;
                let dy = cy - drone_pos.y;
                if dx * dx + dy * dy < radius_sq {
                    self.cells[row * self.n + col] *= self.miss_probability;
                }
            }
        }

        let total: f64 = self.cells.iter().sum();
        if total > 0.0 {
            self.cells.iter_mut().for_each(|c| *c /= total);
        } else {
            warn!("probability grid collapsed to zero, re-initializing to uniform prior");
            self.initialize_map();
        }
    }

    /// Drift advection: translate the grid by the configured drift rate,
    /// wrapping cyclically (the grid is torus-closed). The fractional
    /// remainder of the shift is carried to the next call rather than
    /// truncated, so slow drift is not lost across many small steps.
    pub fn evolve_map(&mut self, dt: f64) {
        let shift_x = self.drift_x_m_s * dt / self.cell_edge + self.drift_carry.0;
        let shift_y = self.drift_y_m_s * dt / self.cell_edge + self.drift_carry.1;

        let whole_x = shift_x.trunc();
        let whole_y = shift_y.trunc();
        self.drift_carry = (shift_x - whole_x, shift_y - whole_y);

        let dx = whole_x as i64;
        let dy = whole_y as i64;
        if dx == 0 && dy == 0 {
            return;
        }

        let n = self.n as i64;
        let mut next = vec![0.0; self.n * self.n];
        for row in 0..self.n {
            for col in 0..self.n {
                let src_row = ((row as i64 - dy).rem_euclid(n)) as usize;
                let src_col = ((col as i64 - dx).rem_euclid(n)) as usize;
                next[row * self.n + col] = self.cells[src_row * self.n + src_col];
            }
        }
        self.cells = next;
    }

    /// Zero every cell, lock probability 1.0 onto the cell containing `pos`
    /// (clamped to grid bounds).
    pub fn confirm_target_at(&mut self, pos: Position) {
        self.cells.iter_mut().for_each(|c| *c = 0.0);

        let half = self.area_size_m / 2.0;
        let col = ((pos.x - self.area_center.0 + half) / self.cell_edge) as i64;
        let row = ((pos.y - self.area_center.1 + half) / self.cell_edge) as i64;
        let col = col.clamp(0, self.n as i64 - 1) as usize;
        let row = row.clamp(0, self.n as i64 - 1) as usize;

        self.cells[row * self.n + col] = 1.0;
        self.drift_carry = (0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> GridParams {
        GridParams {
            grid_size: 100,
            search_area_size_m: 2000.0,
            area_center: (0.0, 0.0),
            search_altitude: 100.0,
            r_max: 500.0,
            h_ref: 50.0,
            miss_probability: 0.1,
            drift_x_m_s: 0.5,
            drift_y_m_s: 0.2,
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut grid = ProbabilityGrid::new(test_params());
        let before = grid.cells().to_vec();
        grid.initialize_map();
        assert_eq!(before, grid.cells());
    }

    #[test]
    fn sum_stays_in_unit_range_after_updates() {
        let mut grid = ProbabilityGrid::new(test_params());
        for i in 0..20 {
            let angle = i as f64 * std::f64::consts::TAU / 20.0;
            let pos = Position::new(600.0 * angle.cos(), 600.0 * angle.sin(), 0.0);
            grid.update_map(pos, 100.0, false);
            grid.evolve_map(1.0);
        }
        let total = grid.sum();
        assert!(total > 0.0 && total <= 1.0 + 1e-9, "sum={total}");
        assert!(grid.cells().iter().all(|&c| c >= 0.0));
    }

    #[test]
    fn confirm_then_waypoint_returns_confirmed_cell() {
        let mut grid = ProbabilityGrid::new(test_params());
        let target = Position::new(120.0, 80.0, 0.0);
        grid.confirm_target_at(target);
        let wp = grid.get_next_search_waypoint();
        // same cell => within half a cell edge of the target center
        assert!((wp.x - target.x).abs() <= grid.cell_edge);
        assert!((wp.y - target.y).abs() <= grid.cell_edge);
    }

    #[test]
    fn miss_probability_one_is_identity_modulo_renormalization() {
        let mut params = test_params();
        params.miss_probability = 1.0;
        let mut grid = ProbabilityGrid::new(params);
        let before = grid.cells().to_vec();
        grid.update_map(Position::new(0.0, 0.0, 0.0), 100.0, false);
        for (a, b) in before.iter().zip(grid.cells()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_drift_evolve_is_identity() {
        let mut params = test_params();
        params.drift_x_m_s = 0.0;
        params.drift_y_m_s = 0.0;
        let mut grid = ProbabilityGrid::new(params);
        let before = grid.cells().to_vec();
        grid.evolve_map(37.0);
        assert_eq!(before, grid.cells());
    }

    #[test]
    fn waypoint_stays_within_configured_area() {
        let mut grid = ProbabilityGrid::new(test_params());
        for _ in 0..50 {
            let wp = grid.get_next_search_waypoint();
            assert!(wp.x.abs() <= 1000.0 + 1e-6);
            assert!(wp.y.abs() <= 1000.0 + 1e-6);
        }
    }
}
