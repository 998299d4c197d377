//! Collaborator pipeline
//!
//! Face detection, emotion classification and device detection are external
//! models. This module defines the seams they plug into and the analyzer that
//! runs them for an admitted frame. Collaborator failures never abort a
//! frame: a failing face detector yields no faces, a failing classifier or
//! device detector yields an empty result.

use thiserror::Error;

use crate::types::{
    DeviceDetection, EmotionReading, FaceBox, FaceDetection, FrameObservation, ObservedFace,
};

/// A captured video frame, packed RGB rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// All-black frame of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize * 3])
    }
}

/// Failure reported by a detector collaborator
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(String),
}

/// Finds faces in a frame
pub trait FaceDetector {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, DetectorError>;
}

/// Labels the dominant emotion of one face region
pub trait EmotionClassifier {
    /// `Ok(None)` when the classifier has no opinion about this face
    fn classify(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<Option<EmotionReading>, DetectorError>;
}

/// Finds handheld devices in a frame
pub trait ObjectDetector {
    fn detect_devices(&mut self, frame: &Frame) -> Result<Vec<DeviceDetection>, DetectorError>;
}

/// Classifier for deployments without an emotion model
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmotion;

impl EmotionClassifier for NoEmotion {
    fn classify(
        &mut self,
        _frame: &Frame,
        _face: &FaceBox,
    ) -> Result<Option<EmotionReading>, DetectorError> {
        Ok(None)
    }
}

/// Anything that turns a frame into an observation.
///
/// The session registry holds one of these per session and drops it when the
/// session ends.
pub trait ObservationSource: Send {
    fn observe(&mut self, frame: &Frame, face_confidence: f64) -> FrameObservation;
}

/// Runs the three collaborators for one admitted frame
pub struct FrameAnalyzer<F, E, O> {
    faces: F,
    emotions: E,
    devices: O,
}

impl<F, E, O> FrameAnalyzer<F, E, O>
where
    F: FaceDetector,
    E: EmotionClassifier,
    O: ObjectDetector,
{
    pub fn new(faces: F, emotions: E, devices: O) -> Self {
        Self {
            faces,
            emotions,
            devices,
        }
    }

    /// Run detection on `frame`.
    ///
    /// Emotion is only classified for faces at or above `face_confidence`;
    /// the rest are passed through so the state machine sees exactly what the
    /// detector returned.
    pub fn analyze(&mut self, frame: &Frame, face_confidence: f64) -> FrameObservation {
        let detections = self.faces.detect_faces(frame).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "face detection failed, treating frame as empty");
            Vec::new()
        });

        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let emotion = if detection.confidence >= face_confidence {
                self.emotions
                    .classify(frame, &detection.bbox)
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "emotion classification failed");
                        None
                    })
            } else {
                None
            };
            faces.push(ObservedFace { detection, emotion });
        }

        let devices = self.devices.detect_devices(frame).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "device detection failed");
            Vec::new()
        });

        FrameObservation {
            frame_width: frame.width,
            faces,
            devices,
        }
    }
}

impl<F, E, O> ObservationSource for FrameAnalyzer<F, E, O>
where
    F: FaceDetector + Send,
    E: EmotionClassifier + Send,
    O: ObjectDetector + Send,
{
    fn observe(&mut self, frame: &Frame, face_confidence: f64) -> FrameObservation {
        self.analyze(frame, face_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceBox;
    use pretty_assertions::assert_eq;

    struct FixedFaces(Vec<FaceDetection>);

    impl FaceDetector for FixedFaces {
        fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceDetection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenFaces;

    impl FaceDetector for BrokenFaces {
        fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceDetection>, DetectorError> {
            Err(DetectorError::Inference("cascade not loaded".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingEmotions {
        calls: usize,
    }

    impl EmotionClassifier for CountingEmotions {
        fn classify(
            &mut self,
            _frame: &Frame,
            _face: &FaceBox,
        ) -> Result<Option<EmotionReading>, DetectorError> {
            self.calls += 1;
            Ok(Some(EmotionReading {
                label: "neutral".to_string(),
                confidence: 0.7,
            }))
        }
    }

    struct BrokenEmotions;

    impl EmotionClassifier for BrokenEmotions {
        fn classify(
            &mut self,
            _frame: &Frame,
            _face: &FaceBox,
        ) -> Result<Option<EmotionReading>, DetectorError> {
            Err(DetectorError::Unavailable("emotion model".to_string()))
        }
    }

    struct FixedDevices(Vec<DeviceDetection>);

    impl ObjectDetector for FixedDevices {
        fn detect_devices(&mut self, _frame: &Frame) -> Result<Vec<DeviceDetection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDevices;

    impl ObjectDetector for BrokenDevices {
        fn detect_devices(&mut self, _frame: &Frame) -> Result<Vec<DeviceDetection>, DetectorError> {
            Err(DetectorError::UnsupportedFrame("zero height".to_string()))
        }
    }

    fn make_face(x: i32, confidence: f64) -> FaceDetection {
        FaceDetection {
            bbox: FaceBox::new(x, 100, 80, 80),
            confidence,
        }
    }

    fn make_device(confidence: f64) -> DeviceDetection {
        DeviceDetection {
            bbox: DeviceBox {
                ymin: 0.1,
                xmin: 0.1,
                ymax: 0.2,
                xmax: 0.2,
            },
            confidence,
        }
    }

    #[test]
    fn test_emotion_only_for_qualifying_faces() {
        let mut analyzer = FrameAnalyzer::new(
            FixedFaces(vec![make_face(10, 0.99), make_face(300, 0.6)]),
            CountingEmotions::default(),
            FixedDevices(Vec::new()),
        );
        let obs = analyzer.analyze(&Frame::blank(640, 480), 0.95);

        assert_eq!(obs.frame_width, 640);
        assert_eq!(obs.faces.len(), 2);
        assert_eq!(obs.faces[0].emotion.as_ref().map(|e| e.label.as_str()), Some("neutral"));
        assert_eq!(obs.faces[1].emotion, None);
        assert_eq!(analyzer.emotions.calls, 1);
    }

    #[test]
    fn test_face_detector_failure_yields_empty_frame() {
        let mut analyzer = FrameAnalyzer::new(
            BrokenFaces,
            CountingEmotions::default(),
            FixedDevices(vec![make_device(0.8)]),
        );
        let obs = analyzer.analyze(&Frame::blank(320, 240), 0.95);

        assert!(obs.faces.is_empty());
        assert_eq!(obs.devices.len(), 1);
        assert_eq!(analyzer.emotions.calls, 0);
    }

    #[test]
    fn test_secondary_failures_are_empty_results() {
        let mut analyzer = FrameAnalyzer::new(
            FixedFaces(vec![make_face(10, 0.99)]),
            BrokenEmotions,
            BrokenDevices,
        );
        let obs = analyzer.analyze(&Frame::blank(320, 240), 0.95);

        assert_eq!(obs.faces.len(), 1);
        assert_eq!(obs.faces[0].emotion, None);
        assert!(obs.devices.is_empty());
    }

    #[test]
    fn test_devices_passed_through_unfiltered() {
        let mut analyzer = FrameAnalyzer::new(
            FixedFaces(Vec::new()),
            NoEmotion,
            FixedDevices(vec![make_device(0.9), make_device(0.01)]),
        );
        let obs = analyzer.observe(&Frame::blank(320, 240), 0.95);
        assert_eq!(obs.devices.len(), 2);
    }
}
