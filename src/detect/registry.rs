use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::ObjectDetection;
use crate::frame::Frame;

use super::backend::{DetectionCapability, DetectorBackend};

/// Thread-safe registry of object classifier backends.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        log::info!("registered classifier backend '{}'", name);
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Warm up every backend; the first failure is returned.
    pub fn warm_up_all(&self) -> Result<()> {
        for name in self.list() {
            if let Some(backend) = self.get(&name) {
                let mut guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
                guard
                    .warm_up()
                    .map_err(|e| anyhow!("backend '{}' warm-up failed: {}", name, e))?;
            }
        }
        Ok(())
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Prefers the default backend when it supports the capability.
    pub fn backend_for_capability(
        &self,
        capability: DetectionCapability,
    ) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        if let Some(default_backend) = self.default_backend() {
            let supports = {
                let guard = default_backend
                    .lock()
                    .map_err(|_| anyhow!("default backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(default_backend);
            }
        }

        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }

    /// Run one capable backend and keep only detections of that capability's class.
    pub fn detect_with_capability(
        &self,
        capability: DetectionCapability,
        frame: &Frame,
    ) -> Result<Vec<ObjectDetection>> {
        let backend = self.backend_for_capability(capability)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        let class = capability.class();
        Ok(guard
            .detect(frame)?
            .into_iter()
            .filter(|d| d.class == class)
            .collect())
    }

    /// Run every backend once, in name order, and collect all detections.
    ///
    /// A failing backend is logged and skipped; the others still run.
    pub fn detect_all(&self, frame: &Frame) -> Vec<ObjectDetection> {
        let mut out = Vec::new();
        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let result = match backend.lock() {
                Ok(mut guard) => guard.detect(frame),
                Err(_) => Err(anyhow!("backend lock poisoned")),
            };
            match result {
                Ok(detections) => out.extend(detections),
                Err(e) => log::warn!("classifier '{}' failed on frame: {}", name, e),
            }
        }
        out
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
