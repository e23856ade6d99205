//! Hand gesture classification.
//!
//! Works on the 21-point hand landmark layout (wrist = 0, then four points per
//! finger from base to tip: thumb 1-4, index 5-8, middle 9-12, ring 13-16,
//! pinky 17-20). Coordinates are normalized image coordinates with y growing
//! downwards. Landmark detection itself is left to an external model.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HAND_LANDMARK_COUNT: usize = 21;

const WRIST: usize = 0;
const MIDDLE_TIP: usize = 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Exactly 21 hand landmarks.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks([Landmark; HAND_LANDMARK_COUNT]);

impl HandLandmarks {
    pub fn new(points: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self(points)
    }

    pub fn from_slice(points: &[Landmark]) -> Result<Self> {
        let points: [Landmark; HAND_LANDMARK_COUNT] = points.try_into().map_err(|_| {
            anyhow!(
                "expected {} hand landmarks, got {}",
                HAND_LANDMARK_COUNT,
                points.len()
            )
        })?;
        Ok(Self(points))
    }

    pub fn point(&self, index: usize) -> Option<Landmark> {
        self.0.get(index).copied()
    }

    pub fn points(&self) -> &[Landmark; HAND_LANDMARK_COUNT] {
        &self.0
    }

    pub fn points_mut(&mut self) -> &mut [Landmark; HAND_LANDMARK_COUNT] {
        &mut self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// (tip, joint below the tip, joint two below the tip).
    pub fn joints(self) -> (usize, usize, usize) {
        match self {
            Finger::Thumb => (4, 3, 2),
            Finger::Index => (8, 7, 6),
            Finger::Middle => (12, 11, 10),
            Finger::Ring => (16, 15, 14),
            Finger::Pinky => (20, 19, 18),
        }
    }
}

/// Which fingers are extended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    pub fn from_extended(extended: &[Finger]) -> Self {
        let mut states = Self::default();
        for finger in extended {
            states.set(*finger, true);
        }
        states
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    pub fn set(&mut self, finger: Finger, extended: bool) {
        let slot = match finger {
            Finger::Thumb => &mut self.thumb,
            Finger::Index => &mut self.index,
            Finger::Middle => &mut self.middle,
            Finger::Ring => &mut self.ring,
            Finger::Pinky => &mut self.pinky,
        };
        *slot = extended;
    }

    pub fn extended_count(&self) -> usize {
        Finger::ALL
            .iter()
            .filter(|f| self.is_extended(**f))
            .count()
    }

    /// True iff exactly the given fingers are extended.
    fn exactly(&self, extended: &[Finger]) -> bool {
        *self == Self::from_extended(extended)
    }
}

/// Extension test per finger.
///
/// The thumb counts as extended when its tip lies right of the joint below
/// it (a right hand facing the camera). Other fingers are extended when the
/// tip is above the joint two below it.
pub fn finger_states(hand: &HandLandmarks) -> FingerStates {
    let p = hand.points();
    let mut states = FingerStates::default();
    for finger in Finger::ALL {
        let (tip, mid, base) = finger.joints();
        let extended = match finger {
            Finger::Thumb => p[tip].x > p[mid].x,
            _ => p[tip].y < p[base].y,
        };
        states.set(finger, extended);
    }
    states
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    OpenHand,
    ClosedFist,
    Pointing,
    Peace,
    Call,
    ThumbsUp,
    FourFingers,
    Unknown,
}

impl Gesture {
    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::OpenHand => "OPEN_HAND",
            Gesture::ClosedFist => "CLOSED_FIST",
            Gesture::Pointing => "POINTING",
            Gesture::Peace => "PEACE",
            Gesture::Call => "CALL",
            Gesture::ThumbsUp => "THUMBS_UP",
            Gesture::FourFingers => "FOUR_FINGERS",
            Gesture::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching pattern wins.
pub fn classify(states: FingerStates) -> Gesture {
    use Finger::*;

    if states.extended_count() == Finger::ALL.len() {
        Gesture::OpenHand
    } else if states.extended_count() == 0 {
        Gesture::ClosedFist
    } else if states.exactly(&[Index]) {
        Gesture::Pointing
    } else if states.exactly(&[Index, Middle]) {
        Gesture::Peace
    } else if states.exactly(&[Thumb, Pinky]) {
        Gesture::Call
    } else if states.exactly(&[Thumb]) {
        Gesture::ThumbsUp
    } else if states.exactly(&[Index, Middle, Ring, Pinky]) {
        Gesture::FourFingers
    } else {
        Gesture::Unknown
    }
}

pub fn detect_gesture(hand: &HandLandmarks) -> Gesture {
    classify(finger_states(hand))
}

/// Angle in degrees of the wrist → middle fingertip vector, measured with
/// `atan2(dy, dx)` in image coordinates (y down), so in -180..=180.
pub fn hand_angle(hand: &HandLandmarks) -> f32 {
    let p = hand.points();
    let (wrist, tip) = (p[WRIST], p[MIDDLE_TIP]);
    (tip.y - wrist.y).atan2(tip.x - wrist.x).to_degrees()
}

/// Everything derived from one hand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HandReading {
    pub gesture: Gesture,
    pub fingers: FingerStates,
    pub angle_degrees: f32,
}

pub fn read_hand(hand: &HandLandmarks) -> HandReading {
    let fingers = finger_states(hand);
    HandReading {
        gesture: classify(fingers),
        fingers,
        angle_degrees: hand_angle(hand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Finger::*;

    /// Upright right hand with the listed fingers extended.
    fn hand(extended: &[Finger]) -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.9); HAND_LANDMARK_COUNT];
        for finger in Finger::ALL {
            let (tip, mid, base) = finger.joints();
            let open = extended.contains(&finger);
            let column = 0.3 + 0.1 * (tip / 4) as f32;
            points[base] = Landmark::new(column, 0.6);
            points[mid] = Landmark::new(column, 0.5);
            points[tip] = match (finger, open) {
                (Thumb, true) => Landmark::new(column + 0.05, 0.55),
                (Thumb, false) => Landmark::new(column - 0.05, 0.55),
                (_, true) => Landmark::new(column, 0.3),
                (_, false) => Landmark::new(column, 0.7),
            };
        }
        HandLandmarks::new(points)
    }

    #[test]
    fn finger_patterns_map_to_gestures() {
        let cases: &[(&[Finger], Gesture)] = &[
            (&[Thumb, Index, Middle, Ring, Pinky], Gesture::OpenHand),
            (&[], Gesture::ClosedFist),
            (&[Index], Gesture::Pointing),
            (&[Index, Middle], Gesture::Peace),
            (&[Thumb, Pinky], Gesture::Call),
            (&[Thumb], Gesture::ThumbsUp),
            (&[Index, Middle, Ring, Pinky], Gesture::FourFingers),
            (&[Thumb, Index], Gesture::Unknown),
            (&[Middle, Ring], Gesture::Unknown),
            (&[Thumb, Index, Middle], Gesture::Unknown),
        ];
        for (extended, expected) in cases {
            let h = hand(extended);
            assert_eq!(finger_states(&h), FingerStates::from_extended(extended));
            assert_eq!(detect_gesture(&h), *expected, "{extended:?}");
        }
    }

    #[test]
    fn thumb_uses_horizontal_test() {
        let mut h = hand(&[]);
        // Raising the thumb tip does not extend it; moving it right does.
        h.points_mut()[4] = Landmark::new(0.25, 0.1);
        assert!(!finger_states(&h).thumb);
        h.points_mut()[4] = Landmark::new(0.45, 0.9);
        assert!(finger_states(&h).thumb);
    }

    #[test]
    fn hand_angle_follows_wrist_to_middle_tip() {
        let mut h = hand(&[]);
        h.points_mut()[WRIST] = Landmark::new(0.5, 0.5);
        let cases = [
            ((0.5, 0.1), -90.0),
            ((0.9, 0.5), 0.0),
            ((0.5, 0.9), 90.0),
            ((0.1, 0.5), 180.0),
            ((0.9, 0.1), -45.0),
        ];
        for ((x, y), expected) in cases {
            h.points_mut()[MIDDLE_TIP] = Landmark::new(x, y);
            let angle = hand_angle(&h);
            assert!((angle - expected).abs() < 1e-3, "({x}, {y}) -> {angle}");
        }
    }

    #[test]
    fn reading_combines_gesture_and_angle() {
        let reading = read_hand(&hand(&[Index, Middle]));
        assert_eq!(reading.gesture, Gesture::Peace);
        assert_eq!(reading.fingers.extended_count(), 2);
        assert!(reading.angle_degrees < 0.0);
        assert_eq!(reading.gesture.to_string(), "PEACE");
        assert_eq!(serde_json::to_value(reading.gesture).unwrap(), "PEACE");
    }

    #[test]
    fn landmark_count_is_enforced() {
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 20]).is_err());
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 22]).is_err());
        assert!(HandLandmarks::from_slice(&[Landmark::default(); 21]).is_ok());
    }
}
