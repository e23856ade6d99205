//! Frame-differencing motion analysis.
//!
//! `MotionAnalyzer` keeps exactly one piece of stream state: the luma
//! projection of the previous frame. Each call:
//!
//! 1. projects the frame to luma (optionally Gaussian-blurred),
//! 2. on the first call stores the projection as the baseline and reports
//!    no motion,
//! 3. otherwise differences against the previous projection and decides
//!    motion globally (mean delta) or regionally (connected components),
//! 4. maps the change onto the 3x3 zone grid,
//! 5. replaces the stored projection with the current one.
//!
//! Bad input never aborts the caller's frame loop. The report carries a
//! `FrameFault` instead, with no motion and the input frame echoed back.
//!
//! An analyzer holds per-stream state and is not shared across streams.

mod regions;
mod thresholds;
pub mod zones;

use image::GrayImage;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameFault};

pub use regions::MotionRegion;
pub use thresholds::{Thresholds, DEFAULT_SENSITIVITY, MAX_SENSITIVITY, MIN_SENSITIVITY};
pub use zones::{zone_for_point, ZoneSet, ZONE_COUNT};

use zones::cell_bounds;

use regions::{absolute_difference, changed_regions};

const MARKER_RGB: [u8; 3] = [0, 255, 0];
const DEFAULT_DILATE_RADIUS: u8 = 2;

/// Granularity of the motion decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Motion iff the mean delta over the frame exceeds the threshold. Zones
    /// are the grid cells whose own mean delta exceeds it.
    #[default]
    Global,
    /// Motion iff at least one connected changed region reaches the minimum
    /// area. Zones are the cells containing each region's center.
    Regional,
}

impl std::str::FromStr for DetectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(DetectionMode::Global),
            "regional" => Ok(DetectionMode::Regional),
            other => Err(anyhow::anyhow!(
                "unknown detection mode '{}' (expected global|regional)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
    pub mode: DetectionMode,
    pub sensitivity: i32,
    /// Gaussian blur sigma applied to the projection; `None` disables blurring.
    pub blur_sigma: Option<f32>,
    /// Mask dilation radius (pixels, L-infinity) in regional mode.
    pub dilate_radius: u8,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Global,
            sensitivity: DEFAULT_SENSITIVITY,
            blur_sigma: None,
            dilate_radius: DEFAULT_DILATE_RADIUS,
        }
    }
}

/// Per-frame analyzer output.
#[derive(Clone, Debug)]
pub struct MotionReport {
    pub motion_detected: bool,
    /// Copy of the input with markers over the detected change.
    pub annotated: Frame,
    pub zones: ZoneSet,
    /// Surviving regions (regional mode only).
    pub regions: Vec<MotionRegion>,
    /// Set when the frame was skipped.
    pub fault: Option<FrameFault>,
}

impl MotionReport {
    fn quiet(frame: &Frame, fault: Option<FrameFault>) -> Self {
        Self {
            motion_detected: false,
            annotated: frame.clone(),
            zones: ZoneSet::empty(),
            regions: Vec::new(),
            fault,
        }
    }
}

pub struct MotionAnalyzer {
    mode: DetectionMode,
    blur_sigma: Option<f32>,
    dilate_radius: u8,
    thresholds: Thresholds,
    previous: Option<GrayImage>,
}

impl MotionAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            mode: config.mode,
            blur_sigma: config.blur_sigma.filter(|s| s.is_finite() && *s > 0.0),
            dilate_radius: config.dilate_radius,
            thresholds: Thresholds::from_sensitivity(config.sensitivity),
            previous: None,
        }
    }

    /// Recompute both thresholds from a 0..=100 sensitivity (clamped).
    pub fn set_sensitivity(&mut self, sensitivity: i32) {
        self.thresholds = Thresholds::from_sensitivity(sensitivity);
        log::debug!(
            "sensitivity={:?} motion_threshold={} min_motion_area={}",
            self.thresholds.sensitivity,
            self.thresholds.motion_threshold,
            self.thresholds.min_motion_area
        );
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DetectionMode) {
        self.mode = mode;
    }

    /// True once a baseline projection exists.
    pub fn is_warm(&self) -> bool {
        self.previous.is_some()
    }

    /// Drop the baseline; the next frame is a cold start again.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Analyze one frame. Never fails: faults are reported on the result.
    pub fn analyze(&mut self, frame: &Frame) -> MotionReport {
        match self.try_analyze(frame) {
            Ok(report) => report,
            Err(fault) => {
                log::warn!("motion analysis skipped frame: {}", fault);
                MotionReport::quiet(frame, Some(fault))
            }
        }
    }

    fn try_analyze(&mut self, frame: &Frame) -> Result<MotionReport, FrameFault> {
        if frame.is_empty() {
            return Err(FrameFault::Empty {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let current = self.project(frame);
        let Some(previous) = self.previous.take() else {
            log::debug!(
                "motion baseline established ({}x{})",
                frame.width(),
                frame.height()
            );
            self.previous = Some(current);
            return Ok(MotionReport::quiet(frame, None));
        };

        if previous.dimensions() != current.dimensions() {
            let fault = FrameFault::ResolutionChanged {
                previous: previous.dimensions(),
                current: current.dimensions(),
            };
            // Re-baseline on the new resolution.
            self.previous = Some(current);
            return Err(fault);
        }

        let delta = absolute_difference(&previous, &current);
        self.previous = Some(current);
        let mut annotated = frame.clone();

        let (motion_detected, zones, regions) = match self.mode {
            DetectionMode::Global => {
                let zones = self.global_zones(&delta);
                let motion = zones.is_some();
                let zones = zones.unwrap_or_default();
                for zone in zones.iter() {
                    let (x0, y0, x1, y1) = cell_bounds(zone, delta.width(), delta.height());
                    mark(&mut annotated, x0, y0, x1 - x0, y1 - y0);
                }
                (motion, zones, Vec::new())
            }
            DetectionMode::Regional => {
                let regions = changed_regions(
                    &delta,
                    self.thresholds.motion_threshold,
                    self.thresholds.min_motion_area,
                    self.dilate_radius,
                );
                for region in &regions {
                    mark(&mut annotated, region.x, region.y, region.width, region.height);
                }
                let zones: ZoneSet = regions.iter().map(|r| r.zone).collect();
                (!regions.is_empty(), zones, regions)
            }
        };

        Ok(MotionReport {
            motion_detected,
            annotated,
            zones,
            regions,
            fault: None,
        })
    }

    fn project(&self, frame: &Frame) -> GrayImage {
        let gray = frame.luma();
        match self.blur_sigma {
            Some(sigma) => gaussian_blur_f32(&gray, sigma),
            None => gray,
        }
    }

    /// `None` when the frame-wide mean does not exceed the threshold.
    fn global_zones(&self, delta: &GrayImage) -> Option<ZoneSet> {
        let threshold = self.thresholds.motion_threshold as f64;
        if mean(delta, 0, 0, delta.width(), delta.height()) <= threshold {
            return None;
        }
        let (width, height) = delta.dimensions();
        let zones = (0..ZONE_COUNT)
            .filter(|zone| {
                let (x0, y0, x1, y1) = cell_bounds(*zone, width, height);
                mean(delta, x0, y0, x1, y1) > threshold
            })
            .collect();
        Some(zones)
    }
}

impl Default for MotionAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

/// Arithmetic mean over `[x0, x1) x [y0, y1)`; 0.0 for an empty window.
fn mean(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
    let count = (x1.saturating_sub(x0) as u64) * (y1.saturating_sub(y0) as u64);
    if count == 0 {
        return 0.0;
    }
    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += img.get_pixel(x, y)[0] as u64;
        }
    }
    sum as f64 / count as f64
}

fn mark(frame: &mut Frame, x: u32, y: u32, width: u32, height: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let color = frame.order().encode(MARKER_RGB);
    let rect = Rect::at(x as i32, y as i32).of_size(width, height);
    draw_hollow_rect_mut(frame.pixels_mut(), rect, color);
}
