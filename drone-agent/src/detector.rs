//! Narrow interface onto the external detection subsystem (thermal/visual
//! blob detection, sensor fusion). Out of scope per the kernel's mandate; the
//! mission agent only ever calls `scan` and treats the result opaquely.

use async_trait::async_trait;
use mob_domain::{Detection, Position};

#[async_trait]
pub trait Detector: Send + Sync {
    /// Perform a point scan from `drone_pos` at `altitude_m`. `None` means no
    /// detection this scan; `Some` carries whatever confidence/metadata the
    /// detector produced, person-flagged or not.
    async fn scan(&mut self, drone_pos: Position, altitude_m: f64) -> Option<Detection>;
}
