use serde::Serialize;

pub const DEFAULT_SENSITIVITY: i32 = 75;
pub const MIN_SENSITIVITY: i32 = 0;
pub const MAX_SENSITIVITY: i32 = 100;

/// Thresholds derived from a 0..=100 sensitivity dial.
///
/// Higher sensitivity lowers both cutoffs, so motion is declared more readily.
/// - `motion_threshold`: intensity delta on the 0..=255 luma scale. Pixel and
///   mean comparisons against it are strict (`>`).
/// - `min_motion_area`: smallest changed region, in pixels, that counts as
///   motion. Only the regional detection mode consults it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    /// Dial value the thresholds came from; `None` for explicit thresholds.
    pub sensitivity: Option<i32>,
    pub motion_threshold: u8,
    pub min_motion_area: u32,
}

impl Thresholds {
    /// `motion_threshold = round(50 - s * 0.4)`, `min_motion_area = round(1000 - s * 8)`.
    ///
    /// Sensitivity outside 0..=100 is clamped into range (and logged).
    pub fn from_sensitivity(sensitivity: i32) -> Self {
        let clamped = sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        if clamped != sensitivity {
            log::warn!(
                "sensitivity {} outside {}..={}, clamped to {}",
                sensitivity,
                MIN_SENSITIVITY,
                MAX_SENSITIVITY,
                clamped
            );
        }
        let s = clamped as f64;
        Self {
            sensitivity: Some(clamped),
            motion_threshold: (50.0 - s * 0.4).round() as u8,
            min_motion_area: (1000.0 - s * 8.0).round() as u32,
        }
    }

    /// Explicit thresholds, bypassing the sensitivity mapping (calibration, tests).
    pub fn custom(motion_threshold: u8, min_motion_area: u32) -> Self {
        Self {
            sensitivity: None,
            motion_threshold,
            min_motion_area,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from_sensitivity(DEFAULT_SENSITIVITY)
    }
}
