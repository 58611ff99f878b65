//! Optional per-drone CSV telemetry snapshot. Append-only; a write failure
//! disables further snapshotting for the process lifetime rather than
//! propagating, since this is a best-effort side channel, never load-bearing.

use std::fs::OpenOptions;

use mob_domain::{Detection, MissionPhase, SnapshotRow, Telemetry};
use tracing::warn;

pub struct SnapshotWriter {
    writer: Option<csv::Writer<std::fs::File>>,
}

impl SnapshotWriter {
    pub fn open(path: Option<&str>) -> Self {
        let writer = path.and_then(|path| {
            let needs_header = !std::path::Path::new(path).exists();
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(csv::WriterBuilder::new().has_headers(needs_header).from_writer(file)),
                Err(e) => {
                    warn!(path, error = %e, "could not open CSV snapshot file, snapshotting disabled");
                    None
                }
            }
        });
        Self { writer }
    }

    pub fn record(&mut self, drone_id: &str, phase: MissionPhase, telemetry: &Telemetry, detections: &[Detection]) {
        let Some(writer) = self.writer.as_mut() else { return };
        let row = SnapshotRow::new(mob_domain::now_ms(), drone_id, phase, telemetry, detections);
        if let Err(e) = writer.serialize(&row).and_then(|_| writer.flush().map_err(csv::Error::from)) {
            warn!(error = %e, "CSV snapshot write failed, disabling further snapshotting");
            self.writer = None;
        }
    }
}
