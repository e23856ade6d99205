//! Alert payloads and notifiers.
//!
//! An alert bundles the detection lines of one frame, the annotated frame as
//! a PNG data URI and a wall-clock timestamp into the JSON body expected by
//! EmailJS-style template mail endpoints. Delivery goes through a `Notifier`.

use std::io::Cursor;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Local};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::detect::DetectionEvent;
use crate::frame::Frame;

pub const DEFAULT_ALERT_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 60;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub user_id: String,
    /// Minimum spacing between two sent alerts.
    pub cooldown_secs: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_ALERT_ENDPOINT.to_string(),
            service_id: String::new(),
            template_id: String::new(),
            user_id: String::new(),
            cooldown_secs: DEFAULT_ALERT_COOLDOWN_SECS,
        }
    }
}

impl AlertSettings {
    /// All three template identifiers are required to send anything.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        for (name, value) in [
            ("service_id", &self.service_id),
            ("template_id", &self.template_id),
            ("user_id", &self.user_id),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("alerts enabled but {} is empty", name));
            }
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(anyhow!("alert endpoint must be an http(s) URL"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateParams {
    pub detection_results: String,
    pub image: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub service_id: String,
    pub template_id: String,
    pub user_id: String,
    pub template_params: TemplateParams,
}

impl AlertPayload {
    pub fn build(
        events: &[DetectionEvent],
        image_data_uri: String,
        settings: &AlertSettings,
        now: DateTime<Local>,
    ) -> Self {
        let detection_results = events
            .iter()
            .map(describe_event)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            service_id: settings.service_id.clone(),
            template_id: settings.template_id.clone(),
            user_id: settings.user_id.clone(),
            template_params: TemplateParams {
                detection_results,
                image: image_data_uri,
                timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            },
        }
    }

    /// Build from an annotated frame, encoding it as a PNG data URI.
    pub fn from_frame(
        events: &[DetectionEvent],
        frame: &Frame,
        settings: &AlertSettings,
        now: DateTime<Local>,
    ) -> Result<Self> {
        Ok(Self::build(events, encode_png_data_uri(frame)?, settings, now))
    }
}

/// One human-readable line per event.
pub fn describe_event(event: &DetectionEvent) -> String {
    match event {
        DetectionEvent::Vehicle { confidence, .. } => {
            format!("Vehicle detected - Confidence: {}", percent(*confidence))
        }
        DetectionEvent::Person { confidence, .. } => {
            format!("Person detected - Confidence: {}", percent(*confidence))
        }
        DetectionEvent::Motion { zones, .. } => {
            format!("Motion detected in zones: {:?}", zones.to_vec())
        }
    }
}

fn percent(confidence: f32) -> String {
    format!("{:.2}%", f64::from(confidence) * 100.0)
}

/// `data:image/png;base64,...` for the frame in RGB order.
pub fn encode_png_data_uri(frame: &Frame) -> Result<String> {
    let mut png = Cursor::new(Vec::new());
    frame
        .to_rgb()
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| anyhow!("failed to encode alert frame as PNG: {}", e))?;
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png.into_inner())
    ))
}

/// Alert delivery.
///
/// `Ok(true)` means the endpoint accepted the alert, `Ok(false)` that it
/// answered with anything else. Transport failures are errors.
pub trait Notifier: Send {
    fn name(&self) -> &'static str;

    fn send(&mut self, payload: &AlertPayload) -> Result<bool>;
}

/// Writes alerts to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: u64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&mut self, payload: &AlertPayload) -> Result<bool> {
        self.sent += 1;
        log::info!(
            "alert #{} at {}: {}",
            self.sent,
            payload.template_params.timestamp,
            payload.template_params.detection_results.replace('\n', "; ")
        );
        Ok(true)
    }
}

/// POSTs the payload as JSON. Only HTTP 200 counts as delivered.
#[cfg(feature = "alert-webhook")]
pub struct WebhookNotifier {
    endpoint: String,
    agent: ureq::Agent,
}

#[cfg(feature = "alert-webhook")]
impl WebhookNotifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.to_string(),
            agent,
        }
    }
}

#[cfg(feature = "alert-webhook")]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(&mut self, payload: &AlertPayload) -> Result<bool> {
        match self.agent.post(&self.endpoint).send_json(payload) {
            Ok(response) => Ok(response.status() == 200),
            Err(ureq::Error::Status(code, _)) => {
                log::warn!("alert endpoint {} answered {}", self.endpoint, code);
                Ok(false)
            }
            Err(e) => Err(anyhow!("alert delivery to {} failed: {}", self.endpoint, e)),
        }
    }
}

/// Enforces a minimum spacing between alerts.
#[derive(Debug)]
pub struct AlertThrottle {
    cooldown: Duration,
    last_sent: Option<Instant>,
}

impl AlertThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: None,
        }
    }

    /// True when an alert may go out at `now`; arms the cooldown if so.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let ready = match self.last_sent {
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
            None => true,
        };
        if ready {
            self.last_sent = Some(now);
        }
        ready
    }
}
