//! Per-session detection state machine
//!
//! Owns everything that evolves frame by frame for one session: the
//! admission policy, the gaze baseline and history, the looking-away run,
//! the counters and the pending alerts. Frames must be fed in arrival order;
//! baseline, history and counters are order-dependent.

use chrono::{DateTime, Utc};

use crate::accumulator::{SessionCounters, SessionStats};
use crate::admission::{Admission, FrameAdmission};
use crate::alerts::{Alert, AlertLog, AlertType};
use crate::config::ProctorConfig;
use crate::debounce::LookingAwayDebouncer;
use crate::gaze::GazeEstimator;
use crate::report::{ReportStatistics, SessionReport};
use crate::types::{
    DeviceDetection, EmotionReading, FaceOutcome, FrameObservation, FrameOutcome, ObservedFace,
};

/// Admission decision for a captured frame, carried from capture to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    pub frame_number: u64,
    pub admission: Admission,
}

impl FrameTicket {
    pub fn is_admitted(&self) -> bool {
        self.admission == Admission::Admit
    }
}

/// The mutable state threaded through every frame of one session
#[derive(Debug, Clone)]
pub struct DetectionState {
    config: ProctorConfig,
    admission: FrameAdmission,
    gaze: GazeEstimator,
    debouncer: LookingAwayDebouncer,
    counters: SessionCounters,
    alerts: AlertLog,
    session_start: DateTime<Utc>,
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new(ProctorConfig::default())
    }
}

impl DetectionState {
    pub fn new(config: ProctorConfig) -> Self {
        Self::with_start(config, Utc::now())
    }

    pub fn with_start(config: ProctorConfig, session_start: DateTime<Utc>) -> Self {
        Self {
            admission: FrameAdmission::new(config.frame_skip),
            gaze: GazeEstimator::from_config(&config),
            debouncer: LookingAwayDebouncer::new(
                config.looking_away_threshold,
                config.gaze_confidence,
            ),
            counters: SessionCounters::default(),
            alerts: AlertLog::new(),
            session_start,
            config,
        }
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn is_calibrated(&self) -> bool {
        self.gaze.is_calibrated()
    }

    pub fn consecutive_looking_away(&self) -> u32 {
        self.debouncer.consecutive()
    }

    pub fn pending_alerts(&self) -> usize {
        self.alerts.len()
    }

    /// Count a captured frame and decide whether it gets analyzed.
    ///
    /// Collaborators should only be invoked for admitted tickets.
    pub fn capture(&mut self) -> FrameTicket {
        let frame_number = self.counters.record_captured();
        FrameTicket {
            frame_number,
            admission: self.admission.decide(frame_number),
        }
    }

    /// Capture and apply in one step, for observations that are already at hand
    pub fn process(&mut self, observation: FrameObservation) -> FrameOutcome {
        let ticket = self.capture();
        self.apply(ticket, observation)
    }

    /// Fold the collaborator output for a captured frame into the state.
    ///
    /// Skipped tickets ignore the observation and only report statistics.
    /// For admitted tickets every counter and alert update of the frame
    /// happens inside this call.
    pub fn apply(&mut self, ticket: FrameTicket, observation: FrameObservation) -> FrameOutcome {
        if !ticket.is_admitted() {
            return self.skipped(ticket.frame_number);
        }

        self.counters.record_analyzed();
        let frame_width = observation.frame_width;
        let min_face = self.config.face_confidence;
        let qualifying: Vec<ObservedFace> = observation
            .faces
            .into_iter()
            .filter(|f| f.detection.confidence >= min_face)
            .collect();

        self.counters.record_faces(qualifying.len());
        let mut raised: Vec<Alert> = Vec::new();

        if qualifying.is_empty() {
            self.debouncer.reset();
        } else if qualifying.len() > 1 {
            let details = format!("Detected {} faces", qualifying.len());
            raised.push(self.alerts.emit(AlertType::MultiplePeople, details).clone());
        }

        let mut faces = Vec::with_capacity(qualifying.len());
        for face in qualifying {
            let bbox = face.detection.bbox;
            let gaze = self.gaze.estimate(bbox.center(), bbox.width, frame_width);
            let counted = self.debouncer.observe(&gaze);

            if counted {
                let total = self.counters.record_looking_away();
                if total % self.config.looking_away_alert_interval == 0 {
                    let details = format!(
                        "Direction: {}, Confidence: {:.2}",
                        gaze.direction, gaze.confidence
                    );
                    raised.push(self.alerts.emit(AlertType::LookingAway, details).clone());
                }
            }

            faces.push(FaceOutcome {
                bbox,
                confidence: face.detection.confidence,
                gaze,
                emotion: face.emotion.unwrap_or_else(EmotionReading::unknown),
                looking_away_counted: counted,
            });
        }

        let min_device = self.config.mobile_threshold;
        let devices: Vec<DeviceDetection> = observation
            .devices
            .into_iter()
            .filter(|d| d.confidence >= min_device)
            .collect();
        for device in &devices {
            self.counters.record_mobile();
            let details = format!("Confidence: {:.2}", device.confidence);
            raised.push(self.alerts.emit(AlertType::MobileDevice, details).clone());
        }

        tracing::debug!(
            frame = ticket.frame_number,
            faces = faces.len(),
            devices = devices.len(),
            alerts = raised.len(),
            consecutive_away = self.debouncer.consecutive(),
            "frame analyzed"
        );

        FrameOutcome {
            frame_number: ticket.frame_number,
            admitted: true,
            faces,
            devices,
            alerts: raised,
            stats: self.stats(),
        }
    }

    fn skipped(&self, frame_number: u64) -> FrameOutcome {
        tracing::trace!(frame = frame_number, "frame skipped");
        FrameOutcome {
            frame_number,
            admitted: false,
            faces: Vec::new(),
            devices: Vec::new(),
            alerts: Vec::new(),
            stats: self.stats(),
        }
    }

    /// Live statistics; does not touch the alert log
    pub fn stats(&self) -> SessionStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> SessionStats {
        SessionStats::from_counters(&self.counters, self.elapsed_secs(now))
    }

    /// Category percentages without draining alerts
    pub fn statistics(&self) -> ReportStatistics {
        ReportStatistics::from_counters(&self.counters)
    }

    /// Integrity score of the current counters without draining alerts
    pub fn live_score(&self) -> u8 {
        self.config
            .scoring
            .score(&self.statistics(), self.counters.face_detection_rate())
    }

    /// Build a report and drain the pending alerts into it
    pub fn generate_report(&mut self) -> SessionReport {
        self.generate_report_at(Utc::now())
    }

    pub fn generate_report_at(&mut self, now: DateTime<Utc>) -> SessionReport {
        let alerts = self.alerts.drain();
        SessionReport::build(
            &self.counters,
            self.elapsed_secs(now),
            self.config.detection_threshold,
            alerts,
        )
    }

    /// Hand pending alerts to a consumer; each alert is returned once
    pub fn drain_alerts(&mut self) -> Vec<Alert> {
        self.alerts.drain()
    }

    /// Zero all counters, forget the baseline and restart the session clock
    pub fn reset(&mut self) {
        self.reset_at(Utc::now());
    }

    pub fn reset_at(&mut self, now: DateTime<Utc>) {
        self.counters.reset();
        self.gaze.recalibrate();
        self.debouncer.reset();
        self.session_start = now;
    }

    /// Relearn the gaze baseline; counters are kept
    pub fn recalibrate(&mut self) {
        self.gaze.recalibrate();
        self.debouncer.reset();
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.session_start).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }
}
