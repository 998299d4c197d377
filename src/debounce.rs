//! Looking-away debouncer
//!
//! A single away reading is noise. Only a run of consecutive qualifying
//! Left/Right readings counts as the candidate looking away.

use crate::types::GazeReading;

/// Consecutive-frame counter for sustained looking away.
///
/// The counter is session-scoped, not per face: when several faces are in
/// frame they all feed the same run in detector order.
#[derive(Debug, Clone)]
pub struct LookingAwayDebouncer {
    threshold: u32,
    min_confidence: f64,
    consecutive: u32,
}

impl LookingAwayDebouncer {
    pub fn new(threshold: u32, min_confidence: f64) -> Self {
        Self {
            threshold,
            min_confidence,
            consecutive: 0,
        }
    }

    /// Feed one gaze reading. Returns true when the run is long enough for
    /// this reading to be counted as looking away.
    pub fn observe(&mut self, reading: &GazeReading) -> bool {
        if reading.direction.is_away() && reading.confidence > self.min_confidence {
            self.consecutive = self.consecutive.saturating_add(1);
            self.consecutive >= self.threshold
        } else {
            self.consecutive = 0;
            false
        }
    }

    /// Break the current run (no face in frame, recalibration, reset)
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
