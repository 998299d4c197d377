//! Session report
//!
//! A report is recomputed from the counters on every request. It is never
//! stored inside the state machine.

use serde::{Deserialize, Serialize};

use crate::accumulator::SessionCounters;
use crate::alerts::Alert;
use crate::scoring::{IntegrityBand, ScoringRules};

/// Category percentages of analyzed frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub looking_away_percentage: f64,
    pub mobile_detection_percentage: f64,
    pub multiple_people_percentage: f64,
    pub no_face_percentage: f64,
}

impl ReportStatistics {
    pub fn from_counters(counters: &SessionCounters) -> Self {
        Self {
            looking_away_percentage: counters.percentage(counters.looking_away),
            mobile_detection_percentage: counters.percentage(counters.mobile_detected),
            multiple_people_percentage: counters.percentage(counters.multiple_people),
            no_face_percentage: counters.percentage(counters.no_face),
        }
    }
}

/// Per-category cheating flags.
///
/// Each flag compares the raw 0-1 ratio (not the percentage) against the
/// detection threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatingDetected {
    pub gaze_based: bool,
    pub mobile_based: bool,
    pub multiple_people: bool,
}

impl CheatingDetected {
    pub fn from_counters(counters: &SessionCounters, detection_threshold: f64) -> Self {
        Self {
            gaze_based: counters.ratio(counters.looking_away) > detection_threshold,
            mobile_based: counters.ratio(counters.mobile_detected) > detection_threshold,
            multiple_people: counters.ratio(counters.multiple_people) > detection_threshold,
        }
    }

    pub fn any(&self) -> bool {
        self.gaze_based || self.mobile_based || self.multiple_people
    }
}

/// The report handed to transport and persistence layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Seconds since the session clock started
    pub session_duration: f64,
    pub total_frames_captured: u64,
    pub total_frames_analyzed: u64,
    pub face_detection_rate: f64,
    pub statistics: ReportStatistics,
    pub cheating_detected: CheatingDetected,
    pub alerts: Vec<Alert>,
}

impl SessionReport {
    pub fn build(
        counters: &SessionCounters,
        session_duration: f64,
        detection_threshold: f64,
        alerts: Vec<Alert>,
    ) -> Self {
        Self {
            session_duration,
            total_frames_captured: counters.frames_captured,
            total_frames_analyzed: counters.frames_analyzed,
            face_detection_rate: counters.face_detection_rate(),
            statistics: ReportStatistics::from_counters(counters),
            cheating_detected: CheatingDetected::from_counters(counters, detection_threshold),
            alerts,
        }
    }

    pub fn integrity_score(&self, rules: &ScoringRules) -> u8 {
        rules.score(&self.statistics, self.face_detection_rate)
    }

    /// Attach the integrity score and band
    pub fn scored(self, rules: &ScoringRules) -> ScoredReport {
        let integrity_score = self.integrity_score(rules);
        ScoredReport {
            report: self,
            integrity_score,
            integrity_band: IntegrityBand::from_score(integrity_score),
        }
    }
}

/// Report plus its integrity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredReport {
    #[serde(flatten)]
    pub report: SessionReport,
    pub integrity_score: u8,
    pub integrity_band: IntegrityBand,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_counters(analyzed: u64, looking_away: u64, mobile: u64, multiple: u64) -> SessionCounters {
        SessionCounters {
            frames_captured: analyzed * 2,
            frames_analyzed: analyzed,
            faces_detected: analyzed,
            looking_away,
            mobile_detected: mobile,
            multiple_people: multiple,
            ..Default::default()
        }
    }

    #[test]
    fn test_looking_away_scenario() {
        let counters = make_counters(100, 25, 0, 0);
        let report = SessionReport::build(&counters, 60.0, 0.3, Vec::new());

        assert!((report.statistics.looking_away_percentage - 25.0).abs() < 1e-9);
        assert!(!report.cheating_detected.gaze_based);

        // 100 - 25, +5 for a 100% face-detection rate
        assert_eq!(report.integrity_score(&ScoringRules::default()), 80);
    }

    #[test]
    fn test_flags_compare_ratio_not_percentage() {
        let counters = make_counters(10, 4, 3, 0);
        let flags = CheatingDetected::from_counters(&counters, 0.3);
        assert!(flags.gaze_based);
        assert!(!flags.mobile_based);
        assert!(!flags.multiple_people);
        assert!(flags.any());
    }

    #[test]
    fn test_empty_session_report() {
        let report = SessionReport::build(&SessionCounters::default(), 0.0, 0.3, Vec::new());
        assert_eq!(report.total_frames_analyzed, 0);
        assert_eq!(report.face_detection_rate, 0.0);
        assert_eq!(report.statistics.no_face_percentage, 0.0);
        assert_eq!(
            report.cheating_detected,
            CheatingDetected {
                gaze_based: false,
                mobile_based: false,
                multiple_people: false,
            }
        );
    }

    #[test]
    fn test_report_json_shape() {
        let counters = make_counters(4, 1, 0, 0);
        let scored = SessionReport::build(&counters, 12.5, 0.3, Vec::new())
            .scored(&ScoringRules::default());

        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["session_duration"], 12.5);
        assert_eq!(value["total_frames_captured"], 8);
        assert_eq!(value["total_frames_analyzed"], 4);
        assert_eq!(value["statistics"]["looking_away_percentage"], 25.0);
        assert_eq!(value["cheating_detected"]["gaze_based"], false);
        assert!(value["alerts"].as_array().unwrap().is_empty());
        assert_eq!(value["integrity_score"], 80);
        assert_eq!(value["integrity_band"], "excellent");
    }
}
