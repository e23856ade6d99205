use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::alert::{AlertSettings, DEFAULT_ALERT_COOLDOWN_SECS, DEFAULT_ALERT_ENDPOINT};
use crate::frame::ChannelOrder;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::motion::{
    AnalyzerConfig, DetectionMode, DEFAULT_SENSITIVITY, MAX_SENSITIVITY, MIN_SENSITIVITY,
};

const DEFAULT_DB_PATH: &str = "security_system.db";
const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_DILATE_RADIUS: u8 = 2;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    db_path: Option<String>,
    history_capacity: Option<usize>,
    motion: Option<MotionConfigFile>,
    source: Option<SourceConfigFile>,
    alert: Option<AlertConfigFile>,
    stats_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    sensitivity: Option<i32>,
    mode: Option<DetectionMode>,
    blur_sigma: Option<f32>,
    dilate_radius: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    channel_order: Option<ChannelOrder>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    enabled: Option<bool>,
    endpoint: Option<String>,
    service_id: Option<String>,
    template_id: Option<String>,
    user_id: Option<String>,
    cooldown_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub db_path: String,
    pub history_capacity: usize,
    pub motion: AnalyzerConfig,
    pub source: SourceSettings,
    pub alert: AlertSettings,
    pub stats_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub uri: String,
    pub target_fps: u32,
    pub channel_order: ChannelOrder,
}

impl SentinelConfig {
    /// Defaults, then the file named by `SENTINEL_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        log::debug!("loaded config: {:?}", cfg);
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let motion = file.motion.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            history_capacity: file.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),
            motion: AnalyzerConfig {
                mode: motion.mode.unwrap_or_default(),
                sensitivity: motion.sensitivity.unwrap_or(DEFAULT_SENSITIVITY),
                blur_sigma: motion.blur_sigma,
                dilate_radius: motion.dilate_radius.unwrap_or(DEFAULT_DILATE_RADIUS),
            },
            source: SourceSettings {
                uri: source.uri.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                channel_order: source.channel_order.unwrap_or_default(),
            },
            alert: AlertSettings {
                enabled: alert.enabled.unwrap_or(false),
                endpoint: alert
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_ALERT_ENDPOINT.to_string()),
                service_id: alert.service_id.unwrap_or_default(),
                template_id: alert.template_id.unwrap_or_default(),
                user_id: alert.user_id.unwrap_or_default(),
                cooldown_secs: alert.cooldown_secs.unwrap_or(DEFAULT_ALERT_COOLDOWN_SECS),
            },
            stats_interval: Duration::from_secs(
                file.stats_interval_secs
                    .unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTINEL_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(sensitivity) = std::env::var("SENTINEL_SENSITIVITY") {
            self.motion.sensitivity = sensitivity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_SENSITIVITY must be an integer"))?;
        }
        if let Ok(mode) = std::env::var("SENTINEL_MODE") {
            if !mode.trim().is_empty() {
                self.motion.mode = mode.parse()?;
            }
        }
        if let Ok(capacity) = std::env::var("SENTINEL_HISTORY_CAPACITY") {
            self.history_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_HISTORY_CAPACITY must be a positive integer"))?;
        }
        if let Ok(uri) = std::env::var("SENTINEL_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(endpoint) = std::env::var("SENTINEL_ALERT_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.alert.endpoint = endpoint;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let clamped = self.motion.sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY);
        if clamped != self.motion.sensitivity {
            log::warn!(
                "sensitivity {} outside {}..={}, using {}",
                self.motion.sensitivity,
                MIN_SENSITIVITY,
                MAX_SENSITIVITY,
                clamped
            );
            self.motion.sensitivity = clamped;
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("history capacity must be greater than zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("target fps must be greater than zero"));
        }
        if let Some(sigma) = self.motion.blur_sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                log::warn!("ignoring non-positive blur sigma {}", sigma);
                self.motion.blur_sigma = None;
            }
        }
        self.alert.validate()?;
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.source.target_fps))
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::from_file(SentinelConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut cfg = SentinelConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.db_path, "security_system.db");
        assert_eq!(cfg.motion.sensitivity, 75);
        assert_eq!(cfg.motion.mode, DetectionMode::Global);
        assert_eq!(cfg.history_capacity, 1000);
        assert_eq!(cfg.source.uri, "stub://camera");
        assert_eq!(cfg.frame_interval(), Duration::from_millis(100));
        assert!(!cfg.alert.enabled);
    }

    #[test]
    fn out_of_range_sensitivity_is_clamped() {
        let mut cfg = SentinelConfig::default();
        cfg.motion.sensitivity = 101;
        cfg.validate().unwrap();
        assert_eq!(cfg.motion.sensitivity, 100);

        cfg.motion.sensitivity = -5;
        cfg.validate().unwrap();
        assert_eq!(cfg.motion.sensitivity, 0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = SentinelConfig::default();
        cfg.history_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SentinelConfig::default();
        cfg.source.target_fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_blur_is_dropped() {
        let mut cfg = SentinelConfig::default();
        cfg.motion.blur_sigma = Some(-1.0);
        cfg.validate().unwrap();
        assert!(cfg.motion.blur_sigma.is_none());
    }
}
