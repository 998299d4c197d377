//! Recorded sessions
//!
//! A recorded session is the detector output for every captured frame of a
//! session, one [`RecordedFrame`] per frame, stored either as NDJSON or as a
//! JSON array. Replaying it through a fresh state machine reproduces the
//! counters, alerts and score of the live run.

use crate::config::ProctorConfig;
use crate::error::ProctorError;
use crate::report::ScoredReport;
use crate::state::DetectionState;
use crate::types::RecordedFrame;

/// Parse newline-delimited frames; blank lines are skipped
pub fn parse_ndjson(input: &str) -> Result<Vec<RecordedFrame>, ProctorError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line.trim())
                .map_err(|e| ProctorError::ParseError(format!("line {}: {}", index + 1, e)))
        })
        .collect()
}

/// Parse a JSON array of frames
pub fn parse_array(input: &str) -> Result<Vec<RecordedFrame>, ProctorError> {
    serde_json::from_str(input).map_err(|e| ProctorError::ParseError(e.to_string()))
}

/// Run every recorded frame through a new session and score the result
pub fn replay<I>(config: ProctorConfig, frames: I) -> ScoredReport
where
    I: IntoIterator<Item = RecordedFrame>,
{
    let scoring = config.scoring.clone();
    let mut state = DetectionState::new(config);
    for frame in frames {
        state.process(frame);
    }
    state.generate_report().scored(&scoring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::IntegrityBand;
    use pretty_assertions::assert_eq;

    fn make_line(center_x: i32) -> String {
        format!(
            r#"{{"frame_width":640,"faces":[{{"box":{{"x":{},"y":190,"width":100,"height":100}},"confidence":0.99}}]}}"#,
            center_x - 50
        )
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let input = format!("{}\n\n{}\n", make_line(320), make_line(330));
        let frames = parse_ndjson(&input).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let input = format!("{}\n{{oops\n", make_line(320));
        let err = parse_ndjson(&input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let input = format!("[{}, {}]", make_line(320), make_line(330));
        assert_eq!(parse_array(&input).unwrap().len(), 2);
        assert!(parse_array("{}").is_err());
    }

    #[test]
    fn test_replay_looking_away_session() {
        let config = ProctorConfig {
            frame_skip: 1,
            baseline_frames: 1,
            ..Default::default()
        };
        // 1 calibration frame, then 24 away frames: 20 counted of 25 analyzed
        let mut lines = vec![make_line(320)];
        lines.extend(std::iter::repeat(make_line(400)).take(24));
        let frames = parse_ndjson(&lines.join("\n")).unwrap();

        let scored = replay(config, frames);
        assert_eq!(scored.report.total_frames_analyzed, 25);
        assert!((scored.report.statistics.looking_away_percentage - 80.0).abs() < 1e-9);
        assert!(scored.report.cheating_detected.gaze_based);
        assert_eq!(scored.report.alerts.len(), 1);
        // 100 - 30 + 5
        assert_eq!(scored.integrity_score, 75);
        assert_eq!(scored.integrity_band, IntegrityBand::Good);
    }
}
