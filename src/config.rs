//! Detector configuration
//!
//! Tunables for the per-session state machine. Values come from defaults, an
//! optional JSON file, and `PROCTOR_*` environment variables, in that order.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ProctorError;
use crate::scoring::ScoringRules;

/// Analyze one of every N captured frames
pub const DEFAULT_FRAME_SKIP: u64 = 2;
/// Qualifying faces used to learn the gaze baseline
pub const DEFAULT_BASELINE_FRAMES: u32 = 30;
/// Direction labels kept for majority-vote smoothing
pub const DEFAULT_GAZE_HISTORY: usize = 5;
/// Consecutive away frames before looking-away is counted
pub const DEFAULT_LOOKING_AWAY_THRESHOLD: u32 = 5;
/// Emit a looking-away alert every N counted frames
pub const DEFAULT_ALERT_INTERVAL: u64 = 20;
/// Minimum face detector confidence for a face to count at all
pub const DEFAULT_FACE_CONFIDENCE: f64 = 0.95;
/// Gaze confidence a Left/Right reading must exceed to count as away
pub const DEFAULT_GAZE_CONFIDENCE: f64 = 0.4;
/// Readings at or above this confidence are never smoothed
pub const DEFAULT_SMOOTHING_CEILING: f64 = 0.8;
/// Ratio above which a category is flagged in the report
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.3;
/// Minimum object detector confidence for a device box
pub const DEFAULT_MOBILE_THRESHOLD: f64 = 0.05;

/// Configuration for one detection state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub frame_skip: u64,
    pub baseline_frames: u32,
    pub gaze_history_len: usize,
    pub looking_away_threshold: u32,
    pub looking_away_alert_interval: u64,
    pub face_confidence: f64,
    pub gaze_confidence: f64,
    pub smoothing_ceiling: f64,
    pub detection_threshold: f64,
    pub mobile_threshold: f64,
    pub scoring: ScoringRules,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            baseline_frames: DEFAULT_BASELINE_FRAMES,
            gaze_history_len: DEFAULT_GAZE_HISTORY,
            looking_away_threshold: DEFAULT_LOOKING_AWAY_THRESHOLD,
            looking_away_alert_interval: DEFAULT_ALERT_INTERVAL,
            face_confidence: DEFAULT_FACE_CONFIDENCE,
            gaze_confidence: DEFAULT_GAZE_CONFIDENCE,
            smoothing_ceiling: DEFAULT_SMOOTHING_CEILING,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            mobile_threshold: DEFAULT_MOBILE_THRESHOLD,
            scoring: ScoringRules::default(),
        }
    }
}

impl ProctorConfig {
    /// Parse a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ProctorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ProctorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ProctorError> {
        let base = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    ProctorError::InvalidConfig(format!("cannot read {}: {e}", p.display()))
                })?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PROCTOR_*` environment variables on top of this configuration.
    ///
    /// Unparseable values are ignored and the current value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        self.frame_skip = env_or("PROCTOR_FRAME_SKIP", self.frame_skip);
        self.baseline_frames = env_or("PROCTOR_BASELINE_FRAMES", self.baseline_frames);
        self.gaze_history_len = env_or("PROCTOR_GAZE_HISTORY", self.gaze_history_len);
        self.looking_away_threshold =
            env_or("PROCTOR_LOOKING_AWAY_THRESHOLD", self.looking_away_threshold);
        self.looking_away_alert_interval =
            env_or("PROCTOR_ALERT_INTERVAL", self.looking_away_alert_interval);
        self.detection_threshold = env_or("PROCTOR_DETECTION_THRESHOLD", self.detection_threshold);
        self.mobile_threshold = env_or("PROCTOR_MOBILE_THRESHOLD", self.mobile_threshold);
        self.face_confidence = env_or("PROCTOR_FACE_CONFIDENCE", self.face_confidence);
        self
    }

    /// Reject values the state machine cannot run with
    pub fn validate(&self) -> Result<(), ProctorError> {
        if self.frame_skip == 0 {
            return Err(ProctorError::InvalidConfig(
                "frame_skip must be at least 1".to_string(),
            ));
        }
        if self.gaze_history_len == 0 {
            return Err(ProctorError::InvalidConfig(
                "gaze_history_len must be at least 1".to_string(),
            ));
        }
        if self.looking_away_alert_interval == 0 {
            return Err(ProctorError::InvalidConfig(
                "looking_away_alert_interval must be at least 1".to_string(),
            ));
        }

        let unit_ranged = [
            ("face_confidence", self.face_confidence),
            ("gaze_confidence", self.gaze_confidence),
            ("smoothing_ceiling", self.smoothing_ceiling),
            ("detection_threshold", self.detection_threshold),
            ("mobile_threshold", self.mobile_threshold),
        ];
        for (name, value) in unit_ranged {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProctorError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
