//! Core data types for the proctoring pipeline
//!
//! These types describe what the detector collaborators hand to the core and
//! what the core hands back for every captured frame.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::accumulator::SessionStats;
use crate::alerts::Alert;

/// Integer pixel coordinate in frame space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Face bounding box in pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Face center, truncated to whole pixels and saturated to `i32`
    pub fn center(&self) -> Point {
        Point::new(
            offset(self.x, self.width / 2),
            offset(self.y, self.height / 2),
        )
    }
}

fn offset(origin: i32, delta: i32) -> i32 {
    (origin as i64 + delta as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// A single face returned by the face detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    pub confidence: f64,
}

/// Normalized device box as returned by the object detector (0-1 on each axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceBox {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
}

/// A handheld device returned by the object detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetection {
    #[serde(rename = "box")]
    pub bbox: DeviceBox,
    pub confidence: f64,
}

/// Dominant emotion for a face region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub label: String,
    pub confidence: f64,
}

impl EmotionReading {
    /// Label used when the classifier has nothing to say about a face
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self {
            label: Self::UNKNOWN.to_string(),
            confidence: 0.0,
        }
    }
}

/// Gaze direction relative to the calibrated baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GazeDirection {
    Forward,
    Left,
    Right,
    /// Baseline still being learned; carries no signal
    Calibrating,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::Forward => "Forward",
            GazeDirection::Left => "Left",
            GazeDirection::Right => "Right",
            GazeDirection::Calibrating => "Calibrating",
        }
    }

    pub fn is_away(&self) -> bool {
        matches!(self, GazeDirection::Left | GazeDirection::Right)
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the gaze estimator for one face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeReading {
    pub direction: GazeDirection,
    pub confidence: f64,
}

impl GazeReading {
    pub fn new(direction: GazeDirection, confidence: f64) -> Self {
        Self {
            direction,
            confidence,
        }
    }

    pub fn calibrating() -> Self {
        Self::new(GazeDirection::Calibrating, 0.0)
    }
}

/// A detected face together with its (optional) emotion classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedFace {
    #[serde(flatten)]
    pub detection: FaceDetection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionReading>,
}

impl ObservedFace {
    pub fn new(detection: FaceDetection) -> Self {
        Self {
            detection,
            emotion: None,
        }
    }
}

/// Everything the collaborators reported for one admitted frame.
///
/// This is also the line format for recorded sessions: one JSON object per
/// captured frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    /// Width of the source frame in pixels
    pub frame_width: u32,
    /// Faces as returned by the face detector (unfiltered)
    #[serde(default)]
    pub faces: Vec<ObservedFace>,
    /// Device boxes as returned by the object detector (unfiltered)
    #[serde(default)]
    pub devices: Vec<DeviceDetection>,
}

impl FrameObservation {
    /// An observation with no faces and no devices
    pub fn empty(frame_width: u32) -> Self {
        Self {
            frame_width,
            faces: Vec::new(),
            devices: Vec::new(),
        }
    }
}

/// One line of a recorded session: the detector output for a captured frame
pub type RecordedFrame = FrameObservation;

/// Per-face result for an admitted frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceOutcome {
    #[serde(rename = "box")]
    pub bbox: FaceBox,
    pub confidence: f64,
    pub gaze: GazeReading,
    pub emotion: EmotionReading,
    /// Whether this face pushed the looking-away counter
    pub looking_away_counted: bool,
}

/// Result of feeding one captured frame through the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    /// 1-based capture index within the session
    pub frame_number: u64,
    /// Whether the frame went through detection
    pub admitted: bool,
    /// Qualifying faces, in detector order
    pub faces: Vec<FaceOutcome>,
    /// Device detections that were counted
    pub devices: Vec<DeviceDetection>,
    /// Alerts produced by this frame (copies; the log still owns them)
    pub alerts: Vec<Alert>,
    /// Statistics after this frame
    pub stats: SessionStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_center_truncates() {
        let face = FaceBox::new(350, 190, 101, 99);
        assert_eq!(face.center(), Point::new(400, 239));
    }

    #[test]
    fn test_face_center_saturates_at_extremes() {
        let face = FaceBox::new(i32::MAX - 10, i32::MIN, 100, -100);
        assert_eq!(face.center(), Point::new(i32::MAX, i32::MIN));
    }

    #[test]
    fn test_recorded_frame_json() {
        let json = r#"{
            "frame_width": 640,
            "faces": [
                { "box": { "x": 270, "y": 190, "width": 100, "height": 100 }, "confidence": 0.99,
                  "emotion": { "label": "neutral", "confidence": 0.8 } }
            ],
            "devices": [
                { "box": { "ymin": 0.1, "xmin": 0.2, "ymax": 0.3, "xmax": 0.4 }, "confidence": 0.6 }
            ]
        }"#;

        let obs: FrameObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.frame_width, 640);
        assert_eq!(obs.faces.len(), 1);
        assert_eq!(obs.faces[0].detection.bbox.center(), Point::new(320, 240));
        assert_eq!(obs.faces[0].emotion.as_ref().unwrap().label, "neutral");
        assert_eq!(obs.devices.len(), 1);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let obs: FrameObservation = serde_json::from_str(r#"{ "frame_width": 320 }"#).unwrap();
        assert_eq!(obs, FrameObservation::empty(320));
    }
}
