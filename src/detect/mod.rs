//! Detection events and the object classifier seam.
//!
//! The motion analyzer produces `Motion` events on its own. Vehicle and
//! person events come from classifier backends registered in a
//! `BackendRegistry`; they all end up as `DetectionEvent`s in one history.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::ScriptedBackend;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, DetectionEvent, EventKind, ObjectClass, ObjectDetection};
