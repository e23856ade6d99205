use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::ObjectDetection;
use crate::frame::Frame;

enum ScriptStep {
    Detections(Vec<ObjectDetection>),
    Failure(String),
}

/// Deterministic backend that replays queued results, one step per frame.
///
/// Once the script runs out every frame yields no detections. Used for tests
/// and demos where no real classifier is available.
pub struct ScriptedBackend {
    name: &'static str,
    capabilities: Vec<DetectionCapability>,
    script: VecDeque<ScriptStep>,
    frames_seen: u64,
}

impl ScriptedBackend {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            capabilities: Vec::new(),
            script: VecDeque::new(),
            frames_seen: 0,
        }
    }

    pub fn with_capability(mut self, capability: DetectionCapability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn push_detections(&mut self, detections: Vec<ObjectDetection>) {
        self.script.push_back(ScriptStep::Detections(detections));
    }

    pub fn push_failure(&mut self, message: &str) {
        self.script.push_back(ScriptStep::Failure(message.to_string()));
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectDetection>> {
        self.frames_seen += 1;
        match self.script.pop_front() {
            Some(ScriptStep::Detections(detections)) => Ok(detections
                .into_iter()
                .filter(|d| d.bbox.x < frame.width() && d.bbox.y < frame.height())
                .collect()),
            Some(ScriptStep::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, ObjectClass};
    use crate::frame::ChannelOrder;

    #[test]
    fn replays_script_then_goes_quiet() {
        let mut backend = ScriptedBackend::new("scripted").with_capability(DetectionCapability::Vehicle);
        backend.push_detections(vec![ObjectDetection {
            class: ObjectClass::Vehicle,
            confidence: 0.85,
            bbox: BoundingBox::new(1, 1, 2, 2),
        }]);
        backend.push_failure("boom");
        let frame = Frame::filled(10, 10, ChannelOrder::Rgb, [0, 0, 0]);

        assert_eq!(backend.detect(&frame).unwrap().len(), 1);
        assert!(backend.detect(&frame).is_err());
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.frames_seen(), 3);
        assert!(backend.supports(DetectionCapability::Vehicle));
        assert!(!backend.supports(DetectionCapability::Person));
    }

    #[test]
    fn drops_boxes_outside_the_frame() {
        let mut backend = ScriptedBackend::new("scripted");
        backend.push_detections(vec![ObjectDetection {
            class: ObjectClass::Person,
            confidence: 0.9,
            bbox: BoundingBox::new(50, 50, 2, 2),
        }]);
        let frame = Frame::filled(10, 10, ChannelOrder::Rgb, [0, 0, 0]);
        assert!(backend.detect(&frame).unwrap().is_empty());
    }
}
