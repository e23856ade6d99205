//! sentineld - motion sentinel daemon
//!
//! This daemon:
//! 1. Loads configuration (file + env overrides)
//! 2. Pulls frames from the configured source (image directory or stub://)
//! 3. Runs motion analysis and registered classifiers on every frame
//! 4. Keeps a bounded detection history and logs periodic statistics
//! 5. Sends throttled alerts for frames with detections
//! 6. Exports the history on shutdown when asked to

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use motion_sentinel::alert::{AlertPayload, AlertThrottle, LogNotifier, Notifier};
use motion_sentinel::config::SentinelConfig;
use motion_sentinel::export::{export_history_csv, export_history_json};
use motion_sentinel::ingest::open_source;
use motion_sentinel::{
    BackendRegistry, BoundingBox, DetectionCapability, DetectionEvent, FrameLoop, ObjectClass,
    ObjectDetection, ScriptedBackend, SecurityMonitor, VehicleTracker,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (.toml or .json); overrides SENTINEL_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Register a scripted classifier that reports a vehicle every N frames.
    #[arg(long, value_name = "N")]
    demo_vehicle_every: Option<u64>,
    /// Write the detection history as CSV on shutdown.
    #[arg(long)]
    export_csv: Option<PathBuf>,
    /// Write the detection history as JSON on shutdown.
    #[arg(long)]
    export_json: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !is_tty);

    if let Some(path) = &args.config {
        std::env::set_var("SENTINEL_CONFIG", path);
    }
    let cfg = {
        let _stage = ui.stage("Load config");
        SentinelConfig::load()?
    };
    log::info!(
        "mode={:?} sensitivity={} history_capacity={} source={}",
        cfg.motion.mode,
        cfg.motion.sensitivity,
        cfg.history_capacity,
        cfg.source.uri
    );

    let mut registry = BackendRegistry::new();
    if let Some(every) = args.demo_vehicle_every {
        registry.register(demo_backend(every, args.max_frames.unwrap_or(1_000))?);
    }
    registry.warm_up_all()?;

    let source = {
        let _stage = ui.stage("Open frame source");
        open_source(&cfg.source.uri, cfg.source.channel_order)?
    };
    let monitor = SecurityMonitor::with_registry(cfg.motion.clone(), cfg.history_capacity, registry);
    let mut frame_loop = FrameLoop::new(source, monitor).with_frame_interval(cfg.frame_interval());

    let running = frame_loop.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let mut notifier = build_notifier(&cfg);
    let mut throttle = AlertThrottle::new(Duration::from_secs(cfg.alert.cooldown_secs));
    let mut tracker = VehicleTracker::default();
    let pause = frame_loop.pause_switch();
    let max_frames = args.max_frames;
    let stop = frame_loop.running_flag();
    let mut status = ui.monitor_status(&cfg.source.uri);
    let mut frames = 0u64;
    let mut events = 0u64;
    let mut last_stats = Instant::now();

    log::info!("sentineld running. Ctrl-C to stop");
    frame_loop.run(|monitor, outcome| {
        frames += 1;
        events += outcome.events.len() as u64;
        status.update(frames, events, pause.is_paused());

        if let Some(fault) = &outcome.fault {
            log::debug!("frame {} skipped: {}", frames, fault);
        }

        for event in &outcome.events {
            if let DetectionEvent::Vehicle { bbox, confidence, .. } = event {
                let analysis = tracker.analyze(&outcome.annotated, *bbox, Instant::now());
                log::info!(
                    "vehicle {} conf={:.2} color={:?} speed={:.1}km/h direction={}",
                    analysis.id,
                    confidence,
                    analysis.color,
                    analysis.speed_kmh,
                    analysis.direction
                );
            }
        }

        if cfg.alert.enabled && outcome.has_detections() && throttle.try_acquire(Instant::now()) {
            match AlertPayload::from_frame(&outcome.events, &outcome.annotated, &cfg.alert, Local::now())
                .and_then(|payload| notifier.send(&payload))
            {
                Ok(true) => log::info!("alert sent via {}", notifier.name()),
                Ok(false) => log::warn!("alert rejected by {}", notifier.name()),
                Err(e) => log::error!("alert failed: {}", e),
            }
        }

        if last_stats.elapsed() >= cfg.stats_interval {
            let stats = monitor.statistics();
            log::info!(
                "history: total={} motion={} vehicles={} persons={} busiest_hour={:?}",
                stats.total_detections,
                stats.motion_events,
                stats.vehicle_count,
                stats.person_count,
                stats.busiest_hour()
            );
            last_stats = Instant::now();
        }

        if max_frames.is_some_and(|max| frames >= max) {
            stop.store(false, Ordering::SeqCst);
        }
    })?;
    status.finish(frames, events);

    let monitor = frame_loop.into_monitor();
    if let Some(path) = &args.export_csv {
        let _stage = ui.stage("Export history (csv)");
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow!("failed to create {}: {}", path.display(), e))?;
        let rows = export_history_csv(monitor.history(), file)?;
        log::info!("wrote {} rows to {}", rows, path.display());
    }
    if let Some(path) = &args.export_json {
        let _stage = ui.stage("Export history (json)");
        std::fs::write(path, export_history_json(monitor.history())?)
            .map_err(|e| anyhow!("failed to write {}: {}", path.display(), e))?;
    }

    println!("{}", serde_json::to_string_pretty(&monitor.statistics())?);
    Ok(())
}

#[cfg(feature = "alert-webhook")]
fn build_notifier(cfg: &SentinelConfig) -> Box<dyn Notifier> {
    if cfg.alert.enabled {
        Box::new(motion_sentinel::alert::WebhookNotifier::new(
            &cfg.alert.endpoint,
            Duration::from_secs(10),
        ))
    } else {
        Box::new(LogNotifier::new())
    }
}

#[cfg(not(feature = "alert-webhook"))]
fn build_notifier(cfg: &SentinelConfig) -> Box<dyn Notifier> {
    if cfg.alert.enabled {
        log::warn!(
            "alert-webhook feature disabled; alerts for {} are logged only",
            cfg.alert.endpoint
        );
    }
    Box::new(LogNotifier::new())
}

fn demo_backend(every: u64, frames: u64) -> Result<ScriptedBackend> {
    if every == 0 {
        return Err(anyhow!("--demo-vehicle-every must be greater than zero"));
    }
    let mut backend = ScriptedBackend::new("demo-vehicles").with_capability(DetectionCapability::Vehicle);
    for frame in 1..=frames {
        if frame % every == 0 {
            backend.push_detections(vec![ObjectDetection {
                class: ObjectClass::Vehicle,
                confidence: 0.85,
                bbox: BoundingBox::new(40, 200, 120, 60),
            }]);
        } else {
            backend.push_detections(Vec::new());
        }
    }
    Ok(backend)
}
