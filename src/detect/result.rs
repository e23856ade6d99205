use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::motion::ZoneSet;

/// Pixel-space bounding box (top-left corner plus size).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Saturates at `u32::MAX` for boxes reaching past the coordinate range.
    pub fn center(&self) -> (u32, u32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }
}

/// Object classes produced by external classifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Vehicle,
    Person,
}

/// One classifier hit on a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub class: ObjectClass,
    /// 0..=1
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Motion,
    Vehicle,
    Person,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Motion => "motion",
            EventKind::Vehicle => "vehicle",
            EventKind::Person => "person",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable detection record kept in the history.
///
/// Timestamps are local wall-clock time at creation; hourly statistics key
/// on their hour of day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionEvent {
    Motion {
        zones: ZoneSet,
        timestamp: DateTime<Local>,
    },
    Vehicle {
        confidence: f32,
        bbox: BoundingBox,
        timestamp: DateTime<Local>,
    },
    Person {
        confidence: f32,
        bbox: BoundingBox,
        timestamp: DateTime<Local>,
    },
}

impl DetectionEvent {
    pub fn motion(zones: ZoneSet, timestamp: DateTime<Local>) -> Self {
        DetectionEvent::Motion { zones, timestamp }
    }

    pub fn from_object(detection: &ObjectDetection, timestamp: DateTime<Local>) -> Self {
        let confidence = detection.confidence.clamp(0.0, 1.0);
        match detection.class {
            ObjectClass::Vehicle => DetectionEvent::Vehicle {
                confidence,
                bbox: detection.bbox,
                timestamp,
            },
            ObjectClass::Person => DetectionEvent::Person {
                confidence,
                bbox: detection.bbox,
                timestamp,
            },
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            DetectionEvent::Motion { .. } => EventKind::Motion,
            DetectionEvent::Vehicle { .. } => EventKind::Vehicle,
            DetectionEvent::Person { .. } => EventKind::Person,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        match self {
            DetectionEvent::Motion { timestamp, .. }
            | DetectionEvent::Vehicle { timestamp, .. }
            | DetectionEvent::Person { timestamp, .. } => *timestamp,
        }
    }

    /// Motion is certain once declared, so it reports 1.0.
    pub fn confidence(&self) -> f32 {
        match self {
            DetectionEvent::Motion { .. } => 1.0,
            DetectionEvent::Vehicle { confidence, .. }
            | DetectionEvent::Person { confidence, .. } => *confidence,
        }
    }

    pub fn zones(&self) -> Option<ZoneSet> {
        match self {
            DetectionEvent::Motion { zones, .. } => Some(*zones),
            _ => None,
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            DetectionEvent::Motion { .. } => None,
            DetectionEvent::Vehicle { bbox, .. } | DetectionEvent::Person { bbox, .. } => {
                Some(*bbox)
            }
        }
    }
}
