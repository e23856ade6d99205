use motion_sentinel::gesture::{read_hand, HAND_LANDMARK_COUNT};
use motion_sentinel::{Gesture, HandLandmarks, Landmark};

// Landmarks as an external hand tracker would emit them: 21 normalized points.
fn pointing_hand_json() -> String {
    let mut points = vec![serde_json::json!({ "x": 0.5, "y": 0.9 }); HAND_LANDMARK_COUNT];
    let set = |points: &mut Vec<serde_json::Value>, i: usize, x: f32, y: f32| {
        points[i] = serde_json::json!({ "x": x, "y": y, "z": 0.0 });
    };
    // thumb folded: tip left of its middle joint
    set(&mut points, 3, 0.40, 0.60);
    set(&mut points, 4, 0.35, 0.62);
    // index up, the rest curled
    for (tip, open) in [(8, true), (12, false), (16, false), (20, false)] {
        let x = 0.3 + 0.1 * (tip / 4) as f32;
        set(&mut points, tip - 2, x, 0.6);
        set(&mut points, tip - 1, x, 0.5);
        set(&mut points, tip, x, if open { 0.3 } else { 0.7 });
    }
    serde_json::Value::Array(points).to_string()
}

#[test]
fn classifies_landmarks_from_json() {
    let points: Vec<Landmark> = serde_json::from_str(&pointing_hand_json()).unwrap();
    let hand = HandLandmarks::from_slice(&points).unwrap();
    let reading = read_hand(&hand);
    assert_eq!(reading.gesture, Gesture::Pointing);
    assert!(reading.fingers.index);
    assert!(!reading.fingers.thumb);
    // curled middle tip (0.6, 0.7) still sits up and right of the wrist (0.5, 0.9)
    assert!(reading.angle_degrees < 0.0 && reading.angle_degrees > -90.0);
}

#[test]
fn short_landmark_lists_are_rejected() {
    let points: Vec<Landmark> = serde_json::from_str(r#"[{"x":0.1,"y":0.2}]"#).unwrap();
    assert!(HandLandmarks::from_slice(&points).is_err());
}
