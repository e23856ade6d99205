//! Per-frame pipeline.
//!
//! `SecurityMonitor` owns one motion analyzer, the classifier registry and the
//! detection history of a single stream. For each frame it:
//!
//! 1. runs motion analysis (a `Motion` event when motion is found),
//! 2. runs registered classifiers (one event per vehicle/person hit),
//! 3. outlines hits on the annotated frame,
//! 4. records all events of the frame into the history.

use chrono::{DateTime, Local};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::{BackendRegistry, BoundingBox, DetectionEvent, ObjectClass};
use crate::frame::{Frame, FrameFault};
use crate::history::{DetectionHistory, HistoryStats};
use crate::motion::{AnalyzerConfig, MotionAnalyzer, Thresholds, ZoneSet};

const VEHICLE_RGB: [u8; 3] = [0, 255, 0];
const PERSON_RGB: [u8; 3] = [0, 0, 255];

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    /// Events produced by this frame, in the order they were recorded.
    pub events: Vec<DetectionEvent>,
    pub annotated: Frame,
    pub motion_detected: bool,
    pub zones: ZoneSet,
    pub fault: Option<FrameFault>,
}

impl FrameOutcome {
    pub fn has_detections(&self) -> bool {
        !self.events.is_empty()
    }
}

pub struct SecurityMonitor {
    analyzer: MotionAnalyzer,
    registry: BackendRegistry,
    history: DetectionHistory,
}

impl SecurityMonitor {
    pub fn new(config: AnalyzerConfig, history_capacity: usize) -> Self {
        Self::with_registry(config, history_capacity, BackendRegistry::new())
    }

    pub fn with_registry(
        config: AnalyzerConfig,
        history_capacity: usize,
        registry: BackendRegistry,
    ) -> Self {
        Self {
            analyzer: MotionAnalyzer::new(config),
            registry,
            history: DetectionHistory::new(history_capacity),
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: i32) {
        self.analyzer.set_sensitivity(sensitivity);
    }

    pub fn thresholds(&self) -> Thresholds {
        self.analyzer.thresholds()
    }

    pub fn analyzer(&self) -> &MotionAnalyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut MotionAnalyzer {
        &mut self.analyzer
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BackendRegistry {
        &mut self.registry
    }

    pub fn history(&self) -> &DetectionHistory {
        &self.history
    }

    pub fn statistics(&self) -> HistoryStats {
        self.history.statistics()
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        self.process_frame_at(frame, Local::now())
    }

    /// Process a frame with an explicit event timestamp.
    pub fn process_frame_at(&mut self, frame: &Frame, at: DateTime<Local>) -> FrameOutcome {
        let report = self.analyzer.analyze(frame);
        let mut annotated = report.annotated;
        let mut events = Vec::new();

        if report.motion_detected {
            events.push(DetectionEvent::motion(report.zones, at));
        }

        // Classifiers are not run on frames the analyzer rejected.
        if report.fault.is_none() {
            for detection in self.registry.detect_all(frame) {
                let rgb = match detection.class {
                    ObjectClass::Vehicle => VEHICLE_RGB,
                    ObjectClass::Person => PERSON_RGB,
                };
                outline(&mut annotated, detection.bbox, rgb);
                events.push(DetectionEvent::from_object(&detection, at));
            }
        }

        if !events.is_empty() {
            log::debug!(
                "frame produced {} event(s), motion zones {:?}",
                events.len(),
                report.zones
            );
            self.history.record(events.iter().cloned());
        }

        FrameOutcome {
            events,
            annotated,
            motion_detected: report.motion_detected,
            zones: report.zones,
            fault: report.fault,
        }
    }

    /// Record events produced elsewhere (e.g. an upstream classifier service).
    pub fn record_detections(&mut self, events: Vec<DetectionEvent>) -> usize {
        self.history.record(events)
    }
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self::with_registry(
            AnalyzerConfig::default(),
            crate::history::DEFAULT_HISTORY_CAPACITY,
            BackendRegistry::new(),
        )
    }
}

fn outline(frame: &mut Frame, bbox: BoundingBox, rgb: [u8; 3]) {
    if bbox.width == 0 || bbox.height == 0 {
        return;
    }
    let color = frame.order().encode(rgb);
    let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height);
    draw_hollow_rect_mut(frame.pixels_mut(), rect, color);
}
