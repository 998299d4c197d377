//! Gaze calibration and direction estimation
//!
//! The estimator learns where a candidate's face sits while looking at the
//! screen, then classifies each later face position as Forward, Left or Right
//! relative to that baseline. Weak readings are damped by a majority vote over
//! the last few labels.

use std::collections::VecDeque;

use crate::config::ProctorConfig;
use crate::types::{GazeDirection, GazeReading, Point};

/// Horizontal deviation, as a fraction of face width, tolerated as Forward
const DEVIATION_RATIO: f64 = 0.15;
/// Deviation, as a fraction of face width, that maps to full confidence
const FULL_CONFIDENCE_RATIO: f64 = 0.5;
/// Offset from frame center, as a fraction of frame width, used without a baseline
const FRAME_OFFSET_RATIO: f64 = 0.1;
/// History entries required before smoothing kicks in
const MIN_VOTES: usize = 3;
/// Minimum label count for a majority to override a reading
const MIN_MAJORITY: usize = 2;

/// Baseline calibration plus smoothed direction classification
#[derive(Debug, Clone)]
pub struct GazeEstimator {
    baseline_target: u32,
    baseline: Option<Point>,
    baseline_samples: u32,
    history: VecDeque<GazeDirection>,
    history_len: usize,
    smoothing_ceiling: f64,
}

impl GazeEstimator {
    pub fn new(baseline_frames: u32, history_len: usize, smoothing_ceiling: f64) -> Self {
        let history_len = history_len.max(1);
        Self {
            baseline_target: baseline_frames,
            baseline: None,
            baseline_samples: 0,
            history: VecDeque::with_capacity(history_len),
            history_len,
            smoothing_ceiling,
        }
    }

    pub fn from_config(config: &ProctorConfig) -> Self {
        Self::new(
            config.baseline_frames,
            config.gaze_history_len,
            config.smoothing_ceiling,
        )
    }

    /// True once the baseline has seen its full sample target
    pub fn is_calibrated(&self) -> bool {
        self.baseline_samples >= self.baseline_target
    }

    pub(crate) fn baseline(&self) -> Option<Point> {
        self.baseline
    }

    pub(crate) fn baseline_samples(&self) -> u32 {
        self.baseline_samples
    }

    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Classify one qualifying face.
    ///
    /// During calibration the center is folded into the baseline and the
    /// reading is `Calibrating` with zero confidence; the history is left
    /// untouched.
    pub fn estimate(&mut self, center: Point, face_width: i32, frame_width: u32) -> GazeReading {
        if self.baseline_samples < self.baseline_target {
            self.absorb_baseline_sample(center);
            return GazeReading::calibrating();
        }

        let raw = match self.baseline {
            Some(baseline) => classify_against_baseline(center, baseline, face_width),
            None => classify_against_frame(center, frame_width),
        };

        self.smooth(raw)
    }

    /// Forget the baseline and history; the next faces recalibrate
    pub fn recalibrate(&mut self) {
        self.baseline = None;
        self.baseline_samples = 0;
        self.history.clear();
    }

    // Pairwise running average: biased toward recent samples, not a true mean.
    fn absorb_baseline_sample(&mut self, center: Point) {
        self.baseline = Some(match self.baseline {
            None => center,
            Some(old) => Point::new(midpoint(old.x, center.x), midpoint(old.y, center.y)),
        });
        self.baseline_samples += 1;
    }

    fn smooth(&mut self, raw: GazeReading) -> GazeReading {
        self.history.push_back(raw.direction);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }

        if self.history.len() < MIN_VOTES || raw.confidence >= self.smoothing_ceiling {
            return raw;
        }

        match self.majority() {
            Some((direction, count)) if count >= MIN_MAJORITY => {
                GazeReading::new(direction, count as f64 / self.history.len() as f64)
            }
            _ => raw,
        }
    }

    /// Most frequent label in the history; ties go to the most recent label
    fn majority(&self) -> Option<(GazeDirection, usize)> {
        let mut best: Option<(GazeDirection, usize)> = None;
        for &label in self.history.iter().rev() {
            let count = self.history.iter().filter(|&&d| d == label).count();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best
    }
}

/// Truncating average of two coordinates, computed in `i64`
fn midpoint(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) / 2) as i32
}

fn classify_against_baseline(center: Point, baseline: Point, face_width: i32) -> GazeReading {
    let face_width = face_width as f64;
    let deviation = (center.x as i64 - baseline.x as i64).abs() as f64;
    let threshold = face_width * DEVIATION_RATIO;

    if deviation > threshold {
        let direction = if center.x < baseline.x {
            GazeDirection::Left
        } else {
            GazeDirection::Right
        };
        let confidence = (deviation / (face_width * FULL_CONFIDENCE_RATIO)).min(1.0);
        GazeReading::new(direction, confidence)
    } else {
        let confidence = if threshold > 0.0 {
            1.0 - deviation / threshold
        } else {
            1.0
        };
        GazeReading::new(GazeDirection::Forward, confidence)
    }
}

fn classify_against_frame(center: Point, frame_width: u32) -> GazeReading {
    let frame_width = frame_width.max(1);
    let frame_center_x = (frame_width / 2) as i32;
    let relative = (center.x as i64 - frame_center_x as i64) as f64 / frame_width as f64;

    if relative < -FRAME_OFFSET_RATIO {
        GazeReading::new(GazeDirection::Left, (relative.abs() * 2.0).min(1.0))
    } else if relative > FRAME_OFFSET_RATIO {
        GazeReading::new(GazeDirection::Right, (relative.abs() * 2.0).min(1.0))
    } else {
        GazeReading::new(GazeDirection::Forward, 1.0 - relative.abs() * 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACE_WIDTH: i32 = 100;
    const FRAME_WIDTH: u32 = 640;

    fn calibrated_at(center: Point, frames: u32) -> GazeEstimator {
        let mut est = GazeEstimator::new(frames, 5, 0.8);
        for _ in 0..frames {
            est.estimate(center, FACE_WIDTH, FRAME_WIDTH);
        }
        est
    }

    fn at_x(x: i32) -> Point {
        Point::new(x, 240)
    }

    #[test]
    fn test_identical_centers_converge_to_center() {
        let est = calibrated_at(Point::new(320, 240), 30);
        assert!(est.is_calibrated());
        assert_eq!(est.baseline(), Some(Point::new(320, 240)));
    }

    #[test]
    fn test_alternating_centers_follow_pairwise_recurrence() {
        let mut est = GazeEstimator::new(30, 5, 0.8);
        let a = Point::new(100, 100);
        let b = Point::new(200, 300);

        let mut observed = Vec::new();
        for i in 0..6 {
            let center = if i % 2 == 0 { a } else { b };
            est.estimate(center, FACE_WIDTH, FRAME_WIDTH);
            observed.push(est.baseline().unwrap());
        }

        // 100 -> (100+200)/2 -> (150+100)/2 -> (125+200)/2 -> (162+100)/2 -> (131+200)/2
        let expected = vec![
            Point::new(100, 100),
            Point::new(150, 200),
            Point::new(125, 150),
            Point::new(162, 225),
            Point::new(131, 162),
            Point::new(165, 231),
        ];
        assert_eq!(observed, expected);

        // An arithmetic mean would sit at 150/200; the recurrence does not.
        assert_ne!(est.baseline(), Some(Point::new(150, 200)));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let mut est = GazeEstimator::new(2, 5, 0.8);
        est.estimate(Point::new(i32::MAX, i32::MAX), FACE_WIDTH, FRAME_WIDTH);
        est.estimate(Point::new(i32::MAX - 2, i32::MAX), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(est.baseline(), Some(Point::new(i32::MAX - 1, i32::MAX)));

        let reading = est.estimate(Point::new(i32::MIN, 0), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Left);
        assert_eq!(reading.confidence, 1.0);

        let mut fresh = GazeEstimator::new(0, 5, 0.8);
        let reading = fresh.estimate(Point::new(i32::MIN, 0), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Left);
    }

    #[test]
    fn test_calibration_length() {
        let mut est = GazeEstimator::new(30, 5, 0.8);
        for _ in 0..30 {
            let reading = est.estimate(at_x(320), FACE_WIDTH, FRAME_WIDTH);
            assert_eq!(reading.direction, GazeDirection::Calibrating);
            assert_eq!(reading.confidence, 0.0);
        }
        assert_eq!(est.history_len(), 0);

        let reading = est.estimate(at_x(320), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Forward);
        assert_eq!(est.baseline_samples(), 30);
    }

    #[test]
    fn test_right_deviation_full_confidence() {
        let mut est = calibrated_at(Point::new(320, 240), 30);
        let reading = est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Right);
        assert!((reading.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_left_deviation_partial_confidence() {
        let mut est = calibrated_at(at_x(320), 30);
        let reading = est.estimate(at_x(290), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Left);
        assert!((reading.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_forward_within_threshold() {
        let mut est = calibrated_at(at_x(320), 30);
        let reading = est.estimate(at_x(326), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Forward);
        assert!((reading.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_weak_reading_overridden_by_majority() {
        let mut est = calibrated_at(at_x(320), 30);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);

        // Forward at 1 - 10/15 confidence, below the smoothing ceiling
        let reading = est.estimate(at_x(330), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Right);
        assert!((reading.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_strong_reading_never_overridden() {
        let mut est = calibrated_at(at_x(320), 30);
        for _ in 0..4 {
            est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        }
        let reading = est.estimate(at_x(320), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Forward);
        assert!((reading.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_smoothing_below_three_entries() {
        let mut est = calibrated_at(at_x(320), 30);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        let reading = est.estimate(at_x(330), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Forward);
    }

    #[test]
    fn test_majority_tie_prefers_most_recent() {
        let mut est = calibrated_at(at_x(320), 30);
        est.estimate(at_x(240), FACE_WIDTH, FRAME_WIDTH);
        est.estimate(at_x(240), FACE_WIDTH, FRAME_WIDTH);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);

        // History is [L, L, R, R, F]; L and R tie, R is newer
        let reading = est.estimate(at_x(325), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Right);
        assert!((reading.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut est = calibrated_at(at_x(320), 30);
        for _ in 0..20 {
            est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        }
        assert_eq!(est.history_len(), 5);
    }

    #[test]
    fn test_frame_fallback_without_baseline() {
        let mut est = GazeEstimator::new(0, 5, 0.8);
        assert!(est.is_calibrated());

        // 100 px left of center on a 640 px frame: r = -0.15625
        let reading = est.estimate(at_x(220), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Left);
        assert!((reading.confidence - 0.3125).abs() < 1e-9);

        let reading = est.estimate(at_x(352), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Forward);
        assert!((reading.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_recalibrate_restarts_calibration() {
        let mut est = calibrated_at(at_x(320), 3);
        est.estimate(at_x(400), FACE_WIDTH, FRAME_WIDTH);
        est.recalibrate();

        assert!(!est.is_calibrated());
        assert_eq!(est.baseline(), None);
        assert_eq!(est.history_len(), 0);

        let reading = est.estimate(at_x(500), FACE_WIDTH, FRAME_WIDTH);
        assert_eq!(reading.direction, GazeDirection::Calibrating);
        assert_eq!(est.baseline(), Some(at_x(500)));
    }
}
