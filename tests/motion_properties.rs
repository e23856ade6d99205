use chrono::{Duration, Local, TimeZone};

use motion_sentinel::motion::zones::cell_bounds;
use motion_sentinel::{
    AnalyzerConfig, ChannelOrder, DetectionEvent, DetectionHistory, DetectionMode, Frame,
    FrameFault, MotionAnalyzer, Thresholds, ZoneSet,
};

const RESOLUTIONS: [(u32, u32); 4] = [(30, 30), (64, 48), (97, 61), (320, 240)];

fn flat(width: u32, height: u32, level: u8) -> Frame {
    Frame::filled(width, height, ChannelOrder::Rgb, [level, level, level])
}

fn analyzer(mode: DetectionMode) -> MotionAnalyzer {
    MotionAnalyzer::new(AnalyzerConfig {
        mode,
        ..AnalyzerConfig::default()
    })
}

fn zones(ids: &[u8]) -> ZoneSet {
    ids.iter().copied().collect()
}

#[test]
fn thresholds_are_monotonic_in_sensitivity() {
    let mut prev = Thresholds::from_sensitivity(0);
    for s in 1..=100 {
        let next = Thresholds::from_sensitivity(s);
        assert!(next.motion_threshold <= prev.motion_threshold, "threshold at {s}");
        assert!(next.min_motion_area <= prev.min_motion_area, "area at {s}");
        prev = next;
    }
    let default = Thresholds::default();
    assert_eq!((default.motion_threshold, default.min_motion_area), (20, 400));
}

#[test]
fn first_frame_is_quiet_in_both_modes() {
    for mode in [DetectionMode::Global, DetectionMode::Regional] {
        let mut analyzer = analyzer(mode);
        let report = analyzer.analyze(&flat(64, 48, 200));
        assert!(!report.motion_detected);
        assert!(report.zones.is_empty());
        assert!(report.fault.is_none());
    }
}

#[test]
fn identical_frames_never_move_even_at_zero_threshold() {
    for mode in [DetectionMode::Global, DetectionMode::Regional] {
        let mut analyzer = analyzer(mode);
        analyzer.set_thresholds(Thresholds::custom(0, 0));
        let frame = flat(64, 48, 128);
        analyzer.analyze(&frame);
        let report = analyzer.analyze(&frame);
        assert!(!report.motion_detected, "{mode:?}");
        assert!(report.zones.is_empty());
        assert_eq!(report.annotated, frame);
    }
}

#[test]
fn black_then_white_lights_every_zone() {
    for (w, h) in RESOLUTIONS {
        let mut analyzer = MotionAnalyzer::default();
        analyzer.analyze(&flat(w, h, 0));
        let report = analyzer.analyze(&flat(w, h, 255));
        assert!(report.motion_detected, "{w}x{h}");
        assert_eq!(report.zones, ZoneSet::all(), "{w}x{h}");
        assert_eq!(report.zones.to_vec(), (0..9).collect::<Vec<u8>>());
    }
}

#[test]
fn corner_change_maps_to_corner_zone_at_any_resolution() {
    for (w, h) in RESOLUTIONS {
        for (zone, mode) in [
            (0u8, DetectionMode::Global),
            (8, DetectionMode::Global),
            (0, DetectionMode::Regional),
            (8, DetectionMode::Regional),
        ] {
            let mut analyzer = analyzer(mode);
            analyzer.set_thresholds(Thresholds::custom(20, 1));
            analyzer.analyze(&flat(w, h, 0));

            let (x0, y0, x1, y1) = cell_bounds(zone, w, h);
            let mut changed = flat(w, h, 0);
            changed.fill_rect(x0, y0, x1 - x0, y1 - y0, [255, 255, 255]);
            let report = analyzer.analyze(&changed);

            assert!(report.motion_detected, "{w}x{h} {mode:?} zone {zone}");
            assert_eq!(report.zones, zones(&[zone]), "{w}x{h} {mode:?}");
        }
    }
}

#[test]
fn regional_mode_ignores_regions_below_min_area() {
    let mut analyzer = MotionAnalyzer::new(AnalyzerConfig {
        mode: DetectionMode::Regional,
        dilate_radius: 0,
        ..AnalyzerConfig::default()
    });
    // default min area: 400 pixels
    analyzer.analyze(&flat(200, 200, 0));

    let mut small = flat(200, 200, 0);
    small.fill_rect(10, 10, 10, 10, [255, 255, 255]);
    assert!(!analyzer.analyze(&small).motion_detected);

    let mut large = flat(200, 200, 0);
    large.fill_rect(150, 150, 25, 25, [255, 255, 255]);
    let report = analyzer.analyze(&large);
    assert!(report.motion_detected);
    assert_eq!(report.zones, zones(&[8]));
    assert_eq!(report.regions.len(), 1);
    assert_eq!(report.regions[0].area, 625);
}

#[test]
fn faults_are_reported_not_raised() {
    let mut analyzer = MotionAnalyzer::default();
    let empty = Frame::from_raw(0, 10, ChannelOrder::Rgb, Vec::new()).unwrap();
    let report = analyzer.analyze(&empty);
    assert!(!report.motion_detected);
    assert!(matches!(report.fault, Some(FrameFault::Empty { .. })));
    assert!(!analyzer.is_warm());

    analyzer.analyze(&flat(40, 30, 0));
    let report = analyzer.analyze(&flat(80, 60, 255));
    assert!(matches!(report.fault, Some(FrameFault::ResolutionChanged { .. })));
    assert!(!report.motion_detected);

    // new resolution became the baseline
    let report = analyzer.analyze(&flat(80, 60, 255));
    assert!(report.fault.is_none());
    assert!(!report.motion_detected);
}

#[test]
fn malformed_buffers_are_rejected_before_analysis() {
    assert!(matches!(
        Frame::from_raw(4, 4, ChannelOrder::Rgb, vec![0; 10]),
        Err(FrameFault::ShapeMismatch {
            expected: 48,
            actual: 10
        })
    ));
}

#[test]
fn history_keeps_most_recent_thousand() {
    let base = Local
        .with_ymd_and_hms(2024, 7, 1, 0, 0, 0)
        .earliest()
        .unwrap();
    let mut history = DetectionHistory::default();
    for i in 0..1005 {
        history.record([DetectionEvent::motion(
            zones(&[4]),
            base + Duration::minutes(i),
        )]);
    }
    assert_eq!(history.len(), 1000);
    let first = history.iter().next().unwrap().timestamp();
    let last = history.latest().unwrap().timestamp();
    assert_eq!(first, base + Duration::minutes(5));
    assert_eq!(last, base + Duration::minutes(1004));

    let stats = history.statistics();
    assert_eq!(stats.total_detections, 1000);
    assert_eq!(stats.hourly_activity.iter().sum::<u64>(), stats.total_detections);
    assert_eq!(stats.last_detection, Some(last));
}

#[test]
fn empty_history_statistics_are_zeroed() {
    let stats = DetectionHistory::new(5).statistics();
    assert_eq!(stats.total_detections, 0);
    assert_eq!(stats.motion_events + stats.vehicle_count + stats.person_count, 0);
    assert!(stats.hourly_activity.iter().all(|&n| n == 0));
    assert!(stats.last_detection.is_none());
}
