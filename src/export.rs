//! History export.
//!
//! CSV (one row per event, oldest first) and JSON (array of tagged events).

use std::io::Write;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::detect::DetectionEvent;
use crate::history::DetectionHistory;

#[derive(Debug, Serialize)]
struct ExportRow {
    kind: &'static str,
    timestamp: String,
    /// Space-separated zone ids; empty for object events.
    zones: String,
    confidence: String,
    /// `x y width height`; empty for motion events.
    bbox: String,
}

impl ExportRow {
    fn from_event(event: &DetectionEvent) -> Self {
        let zones = event
            .zones()
            .map(|zones| {
                zones
                    .iter()
                    .map(|z| z.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let bbox = event
            .bbox()
            .map(|b| format!("{} {} {} {}", b.x, b.y, b.width, b.height))
            .unwrap_or_default();
        Self {
            kind: event.kind().as_str(),
            timestamp: event.timestamp().to_rfc3339(),
            zones,
            confidence: format!("{:.4}", event.confidence()),
            bbox,
        }
    }
}

/// Write the history as CSV with a header row. Returns the number of rows.
pub fn export_history_csv<W: Write>(history: &DetectionHistory, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for event in history.iter() {
        csv.serialize(ExportRow::from_event(event))?;
        rows += 1;
    }
    if rows == 0 {
        // serde-driven headers are only written with the first record
        csv.write_record(["kind", "timestamp", "zones", "confidence", "bbox"])?;
    }
    csv.flush()
        .map_err(|e| anyhow!("failed to flush CSV export: {}", e))?;
    Ok(rows)
}

pub fn export_history_json(history: &DetectionHistory) -> Result<String> {
    let events: Vec<&DetectionEvent> = history.iter().collect();
    Ok(serde_json::to_string_pretty(&events)?)
}
