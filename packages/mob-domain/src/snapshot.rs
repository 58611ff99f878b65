use serde::Serialize;

use crate::detection::Detection;
use crate::phase::MissionPhase;
use crate::telemetry::Telemetry;

/// One row of the optional per-drone CSV snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub timestamp: u64,
    pub mission_state: MissionPhase,
    pub drone_id: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
    pub battery: f64,
    pub drone_state: String,
    pub detection_count: usize,
    pub best_det_source: String,
    pub best_det_confidence: f64,
    pub best_det_img_x: f64,
    pub best_det_img_y: f64,
    pub best_det_track_id: String,
}

impl SnapshotRow {
    pub fn new(
        now_ms: u64,
        drone_id: &str,
        mission_state: MissionPhase,
        telemetry: &Telemetry,
        detections: &[Detection],
    ) -> Self {
        let best = detections
            .iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));

        Self {
            timestamp: now_ms,
            mission_state,
            drone_id: drone_id.to_string(),
            pos_x: telemetry.position.x,
            pos_y: telemetry.position.y,
            pos_z: telemetry.position.z,
            battery: telemetry.battery_pct,
            drone_state: format!("{:?}", telemetry.vehicle_mode),
            detection_count: detections.len(),
            best_det_source: best.map(|d| d.source.clone()).unwrap_or_default(),
            best_det_confidence: best.map(|d| d.confidence).unwrap_or(0.0),
            best_det_img_x: best.map(|d| d.image_x).unwrap_or(0.0),
            best_det_img_y: best.map(|d| d.image_y).unwrap_or(0.0),
            best_det_track_id: best
                .and_then(|d| d.metadata.get("track_id").cloned())
                .unwrap_or_default(),
        }
    }
}
