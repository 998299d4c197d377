//! Session accumulator
//!
//! Running frame counters for one session. All counters only grow until an
//! explicit reset.

use serde::{Deserialize, Serialize};

/// Monotonic per-session frame counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Every captured frame
    pub frames_captured: u64,
    /// Frames that went through detection
    pub frames_analyzed: u64,
    /// Analyzed frames with at least one qualifying face
    pub faces_detected: u64,
    /// Analyzed frames with no qualifying face
    pub no_face: u64,
    /// Analyzed frames with more than one qualifying face
    pub multiple_people: u64,
    /// Debounced looking-away increments
    pub looking_away: u64,
    /// Counted device boxes (one per box, not per frame)
    pub mobile_detected: u64,
}

impl SessionCounters {
    pub fn record_captured(&mut self) -> u64 {
        self.frames_captured += 1;
        self.frames_captured
    }

    pub fn record_analyzed(&mut self) {
        self.frames_analyzed += 1;
    }

    /// Account for the qualifying face count of an analyzed frame
    pub fn record_faces(&mut self, face_count: usize) {
        match face_count {
            0 => self.no_face += 1,
            1 => self.faces_detected += 1,
            _ => {
                self.faces_detected += 1;
                self.multiple_people += 1;
            }
        }
    }

    /// Returns the new looking-away total
    pub fn record_looking_away(&mut self) -> u64 {
        self.looking_away += 1;
        self.looking_away
    }

    pub fn record_mobile(&mut self) {
        self.mobile_detected += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `count / max(frames_analyzed, 1)`
    pub fn ratio(&self, count: u64) -> f64 {
        count as f64 / self.frames_analyzed.max(1) as f64
    }

    /// `ratio * 100`
    pub fn percentage(&self, count: u64) -> f64 {
        self.ratio(count) * 100.0
    }

    pub fn face_detection_rate(&self) -> f64 {
        self.percentage(self.faces_detected)
    }
}

/// Live statistics snapshot, attached to every frame outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_frames_captured: u64,
    pub total_frames_analyzed: u64,
    pub face_detected_frames: u64,
    pub looking_away_frames: u64,
    pub mobile_detected_frames: u64,
    pub multiple_people_frames: u64,
    pub no_face_frames: u64,
    pub face_detection_rate: f64,
    pub session_time_sec: f64,
}

impl SessionStats {
    pub fn from_counters(counters: &SessionCounters, session_time_sec: f64) -> Self {
        Self {
            total_frames_captured: counters.frames_captured,
            total_frames_analyzed: counters.frames_analyzed,
            face_detected_frames: counters.faces_detected,
            looking_away_frames: counters.looking_away,
            mobile_detected_frames: counters.mobile_detected,
            multiple_people_frames: counters.multiple_people,
            no_face_frames: counters.no_face,
            face_detection_rate: counters.face_detection_rate(),
            session_time_sec,
        }
    }
}
