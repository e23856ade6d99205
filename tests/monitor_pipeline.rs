use anyhow::Result;
use chrono::{Local, TimeZone};

use motion_sentinel::alert::AlertPayload;
use motion_sentinel::export::export_history_csv;
use motion_sentinel::ingest::SyntheticConfig;
use motion_sentinel::{
    AlertSettings, AnalyzerConfig, BackendRegistry, BoundingBox, ChannelOrder,
    DetectionCapability, EventKind, Frame, FrameLoop, ObjectClass, ObjectDetection,
    ScriptedBackend, SecurityMonitor, SyntheticSource,
};

fn vehicle(x: u32) -> ObjectDetection {
    ObjectDetection {
        class: ObjectClass::Vehicle,
        confidence: 0.85,
        bbox: BoundingBox::new(x, 5, 12, 8),
    }
}

#[test]
fn synthetic_stream_through_frame_loop() -> Result<()> {
    let source = SyntheticSource::new(SyntheticConfig {
        width: 90,
        height: 60,
        square_size: 12,
        square_step: 6,
        scene_period: 5,
        max_frames: Some(12),
        ..SyntheticConfig::default()
    });
    let mut backend =
        ScriptedBackend::new("scripted-cars").with_capability(DetectionCapability::Vehicle);
    for i in 0..12 {
        if i % 4 == 3 {
            backend.push_detections(vec![vehicle(i * 2)]);
        } else {
            backend.push_detections(Vec::new());
        }
    }
    backend.push_failure("never reached");
    let mut registry = BackendRegistry::new();
    registry.register(backend);

    let monitor = SecurityMonitor::with_registry(AnalyzerConfig::default(), 100, registry);
    let mut frame_loop = FrameLoop::new(Box::new(source), monitor);
    let mut motion_frames = 0;
    let stats = frame_loop.run(|_, outcome| {
        if outcome.motion_detected {
            motion_frames += 1;
        }
    })?;

    assert_eq!(stats.frames_processed, 12);
    assert_eq!(stats.faults, 0);
    // background flips at frames 5 and 10
    assert_eq!(motion_frames, 2);

    let history = frame_loop.monitor().statistics();
    assert_eq!(history.count(EventKind::Vehicle), 3);
    assert_eq!(history.count(EventKind::Motion), 2);
    assert_eq!(history.total_detections, stats.events);
    assert_eq!(
        history.hourly_activity.iter().sum::<u64>(),
        history.total_detections
    );
    Ok(())
}

#[test]
fn detections_feed_alert_and_export() -> Result<()> {
    let at = Local
        .with_ymd_and_hms(2024, 10, 2, 7, 15, 0)
        .earliest()
        .unwrap();
    let mut backend = ScriptedBackend::new("cars").with_capability(DetectionCapability::Vehicle);
    backend.push_detections(Vec::new());
    backend.push_detections(vec![vehicle(10)]);
    let mut registry = BackendRegistry::new();
    registry.register(backend);
    let mut monitor = SecurityMonitor::with_registry(AnalyzerConfig::default(), 10, registry);

    monitor.process_frame_at(&Frame::filled(60, 30, ChannelOrder::Bgr, [0, 0, 0]), at);
    let outcome =
        monitor.process_frame_at(&Frame::filled(60, 30, ChannelOrder::Bgr, [255, 255, 255]), at);
    assert_eq!(outcome.events.len(), 2);

    let settings = AlertSettings {
        enabled: true,
        service_id: "svc".into(),
        template_id: "tpl".into(),
        user_id: "uid".into(),
        ..AlertSettings::default()
    };
    let payload = AlertPayload::from_frame(&outcome.events, &outcome.annotated, &settings, at)?;
    assert_eq!(
        payload.template_params.detection_results,
        "Motion detected in zones: [0, 1, 2, 3, 4, 5, 6, 7, 8]\nVehicle detected - Confidence: 85.00%"
    );
    assert!(payload
        .template_params
        .image
        .starts_with("data:image/png;base64,"));
    assert_eq!(payload.template_params.timestamp, "2024-10-02 07:15:00");

    let mut csv = Vec::new();
    assert_eq!(export_history_csv(monitor.history(), &mut csv)?, 2);
    let text = String::from_utf8(csv)?;
    assert_eq!(text.lines().count(), 3);
    Ok(())
}

#[test]
fn frame_loop_survives_a_corrupt_image() -> Result<()> {
    use image::{Rgb, RgbImage};
    use motion_sentinel::ingest::open_source;

    let dir = tempfile::tempdir()?;
    RgbImage::from_pixel(30, 30, Rgb([0, 0, 0])).save(dir.path().join("a.png"))?;
    std::fs::write(dir.path().join("b.png"), b"garbage")?;
    RgbImage::from_pixel(30, 30, Rgb([255, 255, 255])).save(dir.path().join("c.png"))?;

    let path = dir.path().to_str().expect("utf-8 path");
    let source = open_source(path, ChannelOrder::Rgb)?;
    let mut frame_loop = FrameLoop::new(source, SecurityMonitor::default());
    let mut motion = Vec::new();
    let stats = frame_loop.run(|_, outcome| motion.push(outcome.motion_detected))?;

    assert_eq!(stats.frames_processed, 2);
    // c.png is compared against a.png
    assert_eq!(motion, vec![false, true]);
    assert_eq!(frame_loop.source().stats().frames_skipped, 1);
    Ok(())
}
