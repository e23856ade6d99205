//! Vehicle tracking arithmetic.
//!
//! Vehicles are keyed by a caller-supplied id. The tracker remembers the last
//! centre and instant per id and derives speed (km/h) and heading from the
//! next sighting. There is no association across ids: a vehicle whose box
//! moves gets a new id from `analyze`, so matching is left to the caller.
//!
//! Sightings older than `max_age` are dropped on every update, and at most
//! `max_tracked` ids are kept (oldest sighting evicted first).

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detect::BoundingBox;
use crate::frame::Frame;

/// Ground distance covered by one pixel, uncalibrated.
pub const DEFAULT_METERS_PER_PIXEL: f64 = 0.1;

/// Sightings not refreshed within this window are forgotten.
pub const DEFAULT_SIGHTING_MAX_AGE: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_TRACKED: usize = 256;

const MPS_TO_KMH: f64 = 3.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleColor {
    Red,
    Blue,
    Green,
    White,
    Black,
    Unknown,
}

/// Inclusive HSV box on the 0..180 hue / 0..255 saturation-value scale.
struct HsvRange {
    color: VehicleColor,
    lower: [u8; 3],
    upper: [u8; 3],
}

const COLOR_RANGES: [HsvRange; 5] = [
    HsvRange {
        color: VehicleColor::Red,
        lower: [0, 50, 50],
        upper: [10, 255, 255],
    },
    HsvRange {
        color: VehicleColor::Blue,
        lower: [110, 50, 50],
        upper: [130, 255, 255],
    },
    HsvRange {
        color: VehicleColor::Green,
        lower: [50, 50, 50],
        upper: [70, 255, 255],
    },
    HsvRange {
        color: VehicleColor::White,
        lower: [0, 0, 200],
        upper: [180, 30, 255],
    },
    HsvRange {
        color: VehicleColor::Black,
        lower: [0, 0, 0],
        upper: [180, 255, 30],
    },
];

impl HsvRange {
    fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleAnalysis {
    pub id: String,
    pub bbox: BoundingBox,
    pub color: VehicleColor,
    /// km/h; 0.0 on first sighting.
    pub speed_kmh: f64,
    pub direction: Direction,
    pub position: (u32, u32),
}

#[derive(Clone, Copy, Debug)]
struct Sighting {
    center: (u32, u32),
    at: Instant,
}

#[derive(Debug)]
pub struct VehicleTracker {
    meters_per_pixel: f64,
    max_age: Duration,
    max_tracked: usize,
    last_seen: HashMap<String, Sighting>,
}

impl VehicleTracker {
    pub fn new(meters_per_pixel: f64) -> Self {
        Self {
            meters_per_pixel,
            max_age: DEFAULT_SIGHTING_MAX_AGE,
            max_tracked: DEFAULT_MAX_TRACKED,
            last_seen: HashMap::new(),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Upper bound on remembered ids; at least one is always kept.
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    pub fn meters_per_pixel(&self) -> f64 {
        self.meters_per_pixel
    }

    pub fn tracked(&self) -> usize {
        self.last_seen.len()
    }

    pub fn forget(&mut self, id: &str) {
        self.last_seen.remove(id);
    }

    /// Heading from the previous centre of `id`. Does not update state.
    pub fn direction(&self, id: &str, center: (u32, u32)) -> Direction {
        let Some(prev) = self.last_seen.get(id) else {
            return Direction::Unknown;
        };
        let dx = center.0 as i64 - prev.center.0 as i64;
        let dy = center.1 as i64 - prev.center.1 as i64;
        if dx.abs() > dy.abs() {
            if dx > 0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if dy > 0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    /// Speed in km/h since the previous sighting of `id`, then remember this one.
    ///
    /// A zero or negative time delta yields 0.0.
    pub fn estimate_speed(&mut self, id: &str, bbox: BoundingBox, at: Instant) -> f64 {
        let center = bbox.center();
        let previous = self
            .last_seen
            .insert(id.to_string(), Sighting { center, at });
        self.prune(at);
        let Some(prev) = previous else {
            return 0.0;
        };
        let elapsed = at.saturating_duration_since(prev.at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let dx = center.0 as f64 - prev.center.0 as f64;
        let dy = center.1 as f64 - prev.center.1 as f64;
        let meters = dx.hypot(dy) * self.meters_per_pixel;
        meters / elapsed * MPS_TO_KMH
    }

    /// Drop stale sightings, then the oldest ones beyond `max_tracked`.
    fn prune(&mut self, now: Instant) {
        let max_age = self.max_age;
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(seen.at) <= max_age);
        while self.last_seen.len() > self.max_tracked {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|(_, seen)| seen.at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.last_seen.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Colour, speed and heading for one vehicle box.
    ///
    /// Heading is taken against the previous sighting before the speed
    /// estimate records the new one.
    pub fn analyze(&mut self, frame: &Frame, bbox: BoundingBox, at: Instant) -> VehicleAnalysis {
        let id = format!("vehicle_{}_{}", bbox.x, bbox.y);
        let position = bbox.center();
        let color = dominant_color(frame, bbox);
        let direction = self.direction(&id, position);
        let speed_kmh = self.estimate_speed(&id, bbox, at);
        VehicleAnalysis {
            id,
            bbox,
            color,
            speed_kmh,
            direction,
            position,
        }
    }
}

impl Default for VehicleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_METERS_PER_PIXEL)
    }
}

/// Colour range covering the most pixels inside `bbox` (clipped to the frame).
pub fn dominant_color(frame: &Frame, bbox: BoundingBox) -> VehicleColor {
    let x1 = bbox.x.saturating_add(bbox.width).min(frame.width());
    let y1 = bbox.y.saturating_add(bbox.height).min(frame.height());
    let mut counts = [0u64; COLOR_RANGES.len()];
    for y in bbox.y..y1 {
        for x in bbox.x..x1 {
            let rgb = frame.order().decode(*frame.pixels().get_pixel(x, y));
            let hsv = rgb_to_hsv(rgb);
            for (count, range) in counts.iter_mut().zip(COLOR_RANGES.iter()) {
                if range.contains(hsv) {
                    *count += 1;
                }
            }
        }
    }

    let mut best = VehicleColor::Unknown;
    let mut best_count = 0;
    for (count, range) in counts.iter().zip(COLOR_RANGES.iter()) {
        if *count > best_count {
            best_count = *count;
            best = range.color;
        }
    }
    best
}

/// RGB to HSV with hue halved into 0..180 and S, V in 0..=255.
fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0
    }
    [
        (h / 2.0).round().min(180.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;

    #[test]
    fn first_sighting_has_zero_speed_and_unknown_heading() {
        let mut tracker = VehicleTracker::default();
        let bbox = BoundingBox::new(10, 10, 20, 20);
        assert_eq!(tracker.direction("car", bbox.center()), Direction::Unknown);
        assert_eq!(tracker.estimate_speed("car", bbox, Instant::now()), 0.0);
        assert_eq!(tracker.tracked(), 1);
    }

    #[test]
    fn speed_converts_pixels_per_second_to_kmh() {
        let mut tracker = VehicleTracker::default();
        let t0 = Instant::now();
        tracker.estimate_speed("car", BoundingBox::new(0, 0, 10, 10), t0);
        // 100 px in 1 s at 0.1 m/px = 10 m/s = 36 km/h
        let speed =
            tracker.estimate_speed("car", BoundingBox::new(100, 0, 10, 10), t0 + Duration::from_secs(1));
        assert!((speed - 36.0).abs() < 1e-9, "speed = {speed}");
    }

    #[test]
    fn heading_follows_dominant_axis() {
        let mut tracker = VehicleTracker::default();
        let t0 = Instant::now();
        tracker.estimate_speed("car", BoundingBox::new(50, 50, 10, 10), t0);
        assert_eq!(tracker.direction("car", (80, 60)), Direction::Right);
        assert_eq!(tracker.direction("car", (20, 60)), Direction::Left);
        assert_eq!(tracker.direction("car", (56, 90)), Direction::Down);
        assert_eq!(tracker.direction("car", (56, 10)), Direction::Up);
        // tie on both axes resolves vertically
        assert_eq!(tracker.direction("car", (65, 65)), Direction::Down);
    }

    #[test]
    fn analyze_reports_heading_against_previous_position() {
        let frame = Frame::filled(100, 100, ChannelOrder::Rgb, [200, 20, 20]);
        let mut tracker = VehicleTracker::default();
        let t0 = Instant::now();
        let bbox = BoundingBox::new(10, 10, 20, 20);
        let first = tracker.analyze(&frame, bbox, t0);
        assert_eq!(first.id, "vehicle_10_10");
        assert_eq!(first.direction, Direction::Unknown);
        assert_eq!(first.speed_kmh, 0.0);
        assert_eq!(first.color, VehicleColor::Red);

        let second = tracker.analyze(&frame, bbox, t0 + Duration::from_millis(500));
        assert_eq!(second.direction, Direction::Up);
        assert_eq!(second.speed_kmh, 0.0);
    }

    #[test]
    fn stale_sightings_are_forgotten() {
        let frame = Frame::filled(50, 50, ChannelOrder::Rgb, [0, 0, 0]);
        let mut tracker = VehicleTracker::default().with_max_age(Duration::from_secs(5));
        let t0 = Instant::now();
        tracker.analyze(&frame, BoundingBox::new(1, 1, 4, 4), t0);
        tracker.analyze(&frame, BoundingBox::new(2, 2, 4, 4), t0 + Duration::from_secs(3));
        assert_eq!(tracker.tracked(), 2);

        tracker.analyze(&frame, BoundingBox::new(3, 3, 4, 4), t0 + Duration::from_secs(7));
        assert_eq!(tracker.tracked(), 2);
        assert_eq!(tracker.direction("vehicle_1_1", (9, 9)), Direction::Unknown);
    }

    #[test]
    fn boxes_at_the_coordinate_limit_do_not_overflow() {
        let frame = Frame::filled(20, 20, ChannelOrder::Rgb, [0, 0, 0]);
        let mut tracker = VehicleTracker::default();
        let analysis =
            tracker.analyze(&frame, BoundingBox::new(u32::MAX - 1, 0, 10, 10), Instant::now());
        assert_eq!(analysis.position, (u32::MAX, 5));
        assert_eq!(analysis.color, VehicleColor::Unknown);
    }

    #[test]
    fn tracked_ids_are_capped() {
        let frame = Frame::filled(20, 20, ChannelOrder::Rgb, [0, 0, 0]);
        let mut tracker = VehicleTracker::default().with_max_tracked(64);
        let t0 = Instant::now();
        for i in 0..10_000u32 {
            let at = t0 + Duration::from_micros(u64::from(i));
            tracker.analyze(&frame, BoundingBox::new(i, i % 7, 4, 4), at);
        }
        assert_eq!(tracker.tracked(), 64);
        // newest survives, oldest is gone
        assert_ne!(tracker.direction("vehicle_9999_3", (0, 0)), Direction::Unknown);
        assert_eq!(tracker.direction("vehicle_0_0", (9, 9)), Direction::Unknown);
    }

    #[test]
    fn dominant_color_respects_channel_order() {
        let frame = Frame::filled(10, 10, ChannelOrder::Bgr, [220, 0, 0]);
        assert_eq!(frame.pixels().get_pixel(0, 0).0, [0, 0, 220]);
        let bbox = BoundingBox::new(0, 0, 10, 10);
        assert_eq!(dominant_color(&frame, bbox), VehicleColor::Red);

        let white = Frame::filled(10, 10, ChannelOrder::Rgb, [250, 250, 250]);
        assert_eq!(dominant_color(&white, bbox), VehicleColor::White);

        let black = Frame::filled(10, 10, ChannelOrder::Rgb, [5, 5, 5]);
        assert_eq!(dominant_color(&black, bbox), VehicleColor::Black);

        let orange = Frame::filled(10, 10, ChannelOrder::Rgb, [255, 160, 0]);
        assert_eq!(dominant_color(&orange, bbox), VehicleColor::Unknown);
    }

    #[test]
    fn hsv_scale_matches_half_degree_hue() {
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    }
}
