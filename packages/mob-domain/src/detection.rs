use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Output of the external detection subsystem. Consumed opaquely by the state
/// machine — the kernel never inspects `metadata` beyond forwarding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub image_x: f64,
    pub image_y: f64,
    pub world_position: Option<Position>,
    pub confidence: f64,
    pub is_person: bool,
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Detection {
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.is_person && self.confidence >= threshold
    }
}
