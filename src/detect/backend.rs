use anyhow::Result;

use crate::detect::result::{ObjectClass, ObjectDetection};
use crate::frame::Frame;

/// Object classes a backend can find.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectionCapability {
    Vehicle,
    Person,
}

impl DetectionCapability {
    pub fn class(self) -> ObjectClass {
        match self {
            DetectionCapability::Vehicle => ObjectClass::Vehicle,
            DetectionCapability::Person => ObjectClass::Person,
        }
    }
}

/// Object classifier backend trait.
///
/// Classifiers (cascades, neural detectors, remote services) live outside this
/// crate. A backend sees each frame read-only, once per call, and returns
/// pixel-space detections. Errors are per-frame: the monitor logs them and
/// keeps going.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
