//! Motion Sentinel
//!
//! Frame-differencing motion analysis for small security-monitoring setups.
//!
//! # Architecture
//!
//! A single stateful analyzer sits at the center:
//!
//! 1. **Projection**: every frame is reduced to an 8-bit luma plane.
//! 2. **Differencing**: the projection is compared against the previous one.
//! 3. **Decision**: global mean or regional (connected component) change
//!    against sensitivity-derived thresholds.
//! 4. **Zoning**: change is mapped onto a fixed 3x3 grid (zones 0..=8).
//! 5. **History**: detection events land in a bounded FIFO used for statistics.
//!
//! Everything around the analyzer (object classifiers, alert transport,
//! vehicle records, frame sources) is a collaborator behind a trait.
//!
//! # Module Structure
//!
//! - `frame`: Frame container, channel order, luma projection, frame faults
//! - `motion`: Thresholds, zones, `MotionAnalyzer`
//! - `history`: Bounded detection history and statistics
//! - `detect`: Detection events and the object classifier seam
//! - `monitor`: `SecurityMonitor`, the per-frame pipeline
//! - `ingest`: Frame sources and the frame loop
//! - `storage`: Vehicle sighting records and operator accounts (SQLite / in-memory)
//! - `gesture`: Hand gesture classification from landmark points
//! - `alert`, `export`, `tracking`, `config`

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};

pub mod alert;
pub mod config;
pub mod detect;
pub mod export;
pub mod frame;
pub mod gesture;
pub mod history;
pub mod ingest;
pub mod monitor;
pub mod motion;
pub mod storage;
pub mod tracking;

pub use alert::{AlertPayload, AlertSettings, LogNotifier, Notifier};
pub use detect::{
    BackendRegistry, BoundingBox, DetectionCapability, DetectionEvent, DetectorBackend, EventKind,
    ObjectClass, ObjectDetection, ScriptedBackend,
};
pub use frame::{ChannelOrder, Frame, FrameFault};
pub use history::{DetectionHistory, HistoryStats, DEFAULT_HISTORY_CAPACITY};
pub use ingest::{FrameLoop, FrameSource, ImageDirSource, PauseSwitch, SyntheticSource};
pub use monitor::{FrameOutcome, SecurityMonitor};
pub use motion::{
    AnalyzerConfig, DetectionMode, MotionAnalyzer, MotionRegion, MotionReport, Thresholds,
    ZoneSet, DEFAULT_SENSITIVITY,
};
pub use gesture::{FingerStates, Gesture, HandLandmarks, HandReading, Landmark};
pub use storage::{
    InMemoryUserStore, InMemoryVehicleStore, NewVehicleRecord, SearchField, SqliteUserStore,
    SqliteVehicleStore, UserAccount, UserStore, VehicleRecord, VehicleRecordStore,
};
pub use tracking::{Direction, VehicleAnalysis, VehicleColor, VehicleTracker};

/// URI for a private shared-cache in-memory SQLite database.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:motion_sentinel_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}
