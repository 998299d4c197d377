//! Session registry
//!
//! Maps session ids to live detection state. Each session owns its own
//! state machine, its frame analyzer (if any) and a bounded history of the
//! alerts already handed out. Sessions are independent: frames for one
//! session never block another.
//!
//! Within a session, frames are serialized by an ingest lock held for the
//! whole frame; `end`, `reset` and `recalibrate` take it too, always before
//! the state lock. The state lock is only held while counters move, so
//! status and report queries do not wait on detector inference. A report
//! taken mid-inference counts the frame as captured but not yet analyzed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::alerts::{Alert, AlertHistory, AlertSummary};
use crate::config::ProctorConfig;
use crate::error::ProctorError;
use crate::pipeline::{Frame, ObservationSource};
use crate::report::SessionReport;
use crate::scoring::IntegrityBand;
use crate::state::{DetectionState, FrameTicket};
use crate::types::{FrameObservation, FrameOutcome};

fn unknown_candidate() -> String {
    "Unknown".to_string()
}

/// Parameters for starting a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "unknown_candidate")]
    pub candidate_name: String,
    #[serde(default)]
    pub exam_name: String,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            session_id: None,
            candidate_name: unknown_candidate(),
            exam_name: String::new(),
        }
    }
}

impl StartRequest {
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Descriptive session metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub candidate_name: String,
    pub exam_name: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub alert_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_score: Option<u8>,
}

/// Result of pushing one frame through a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    pub session_id: String,
    pub outcome: FrameOutcome,
    /// Alerts drained from the session by this frame
    pub alerts: Vec<Alert>,
    /// Live score; computing it does not drain anything
    pub integrity_score: u8,
    pub timestamp: DateTime<Utc>,
}

/// Report plus session metadata, as returned by `end` and `report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReportView {
    pub session_info: SessionInfo,
    pub detection_report: SessionReport,
    pub integrity_score: u8,
    pub integrity_band: IntegrityBand,
    pub alerts_summary: AlertSummary,
}

struct SessionInner {
    info: SessionInfo,
    state: DetectionState,
    history: AlertHistory,
    final_report: Option<SessionReport>,
}

impl SessionInner {
    fn ensure_active(&self) -> Result<(), ProctorError> {
        match self.info.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Completed => Err(ProctorError::SessionEnded(self.info.session_id.clone())),
        }
    }

    fn snapshot_info(&self) -> SessionInfo {
        SessionInfo {
            alert_count: self.history.summary().total_alerts,
            ..self.info.clone()
        }
    }

    /// Drain pending alerts into the history and build a report over the
    /// retained alerts
    fn build_report(&mut self) -> SessionReport {
        let mut report = self.state.generate_report();
        self.history.extend(&report.alerts);
        report.alerts = self.history.recent();
        report
    }

    fn view(&self, report: SessionReport) -> SessionReportView {
        let integrity_score = report.integrity_score(&self.state.config().scoring);
        SessionReportView {
            session_info: self.snapshot_info(),
            detection_report: report,
            integrity_score,
            integrity_band: IntegrityBand::from_score(integrity_score),
            alerts_summary: self.history.summary().clone(),
        }
    }
}

struct Session {
    /// Held for the whole frame; `None` once the session ended or when frames
    /// arrive pre-analyzed
    ingest: Mutex<Option<Box<dyn ObservationSource>>>,
    inner: Mutex<SessionInner>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, session_id: &str) -> Result<MutexGuard<'a, T>, ProctorError> {
    mutex
        .lock()
        .map_err(|_| ProctorError::Poisoned(session_id.to_string()))
}

/// Owns every live session
pub struct SessionRegistry {
    config: ProctorConfig,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ProctorConfig::default())
    }
}

impl SessionRegistry {
    /// Every session started by this registry uses `config`
    pub fn new(config: ProctorConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    /// Start a session that is fed pre-analyzed observations
    pub fn start(&self, request: StartRequest) -> Result<SessionInfo, ProctorError> {
        self.insert(request, None)
    }

    /// Start a session that runs `analyzer` on raw frames
    pub fn start_with_analyzer(
        &self,
        request: StartRequest,
        analyzer: Box<dyn ObservationSource>,
    ) -> Result<SessionInfo, ProctorError> {
        self.insert(request, Some(analyzer))
    }

    fn insert(
        &self,
        request: StartRequest,
        analyzer: Option<Box<dyn ObservationSource>>,
    ) -> Result<SessionInfo, ProctorError> {
        let session_id = request
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ProctorError::Poisoned("registry".to_string()))?;
        if sessions.contains_key(&session_id) {
            return Err(ProctorError::SessionExists(session_id));
        }

        let start_time = Utc::now();
        let info = SessionInfo {
            session_id: session_id.clone(),
            candidate_name: request.candidate_name,
            exam_name: request.exam_name,
            start_time,
            end_time: None,
            status: SessionStatus::Active,
            alert_count: 0,
            integrity_score: None,
        };

        let session = Session {
            ingest: Mutex::new(analyzer),
            inner: Mutex::new(SessionInner {
                info: info.clone(),
                state: DetectionState::with_start(self.config.clone(), start_time),
                history: AlertHistory::default(),
                final_report: None,
            }),
        };
        sessions.insert(session_id.clone(), Arc::new(session));

        tracing::info!(
            session_id = %session_id,
            candidate = %info.candidate_name,
            "session started"
        );
        Ok(info)
    }

    fn get(&self, session_id: &str) -> Result<Arc<Session>, ProctorError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ProctorError::Poisoned("registry".to_string()))?;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ProctorError::SessionNotFound(session_id.to_string()))
    }

    /// Run the session's analyzer on a raw frame and fold the result in
    pub fn process_frame(&self, session_id: &str, frame: &Frame) -> Result<FrameUpdate, ProctorError> {
        let session = self.get(session_id)?;
        let mut ingest = lock(&session.ingest, session_id)?;
        let ticket = {
            let mut inner = lock(&session.inner, session_id)?;
            inner.ensure_active()?;
            if ingest.is_none() {
                return Err(ProctorError::NoAnalyzer(session_id.to_string()));
            }
            inner.state.capture()
        };

        let observation = match ingest.as_mut() {
            Some(analyzer) if ticket.is_admitted() => {
                analyzer.observe(frame, self.config.face_confidence)
            }
            _ => FrameObservation::empty(frame.width),
        };

        Self::apply(&session, session_id, ticket, observation)
    }

    /// Fold an already-analyzed frame into the session
    pub fn process_observation(
        &self,
        session_id: &str,
        observation: FrameObservation,
    ) -> Result<FrameUpdate, ProctorError> {
        let session = self.get(session_id)?;
        let _ingest = lock(&session.ingest, session_id)?;
        let ticket = {
            let mut inner = lock(&session.inner, session_id)?;
            inner.ensure_active()?;
            inner.state.capture()
        };
        Self::apply(&session, session_id, ticket, observation)
    }

    fn apply(
        session: &Session,
        session_id: &str,
        ticket: FrameTicket,
        observation: FrameObservation,
    ) -> Result<FrameUpdate, ProctorError> {
        let mut inner = lock(&session.inner, session_id)?;
        let outcome = inner.state.apply(ticket, observation);
        let alerts = inner.state.drain_alerts();
        inner.history.extend(&alerts);
        let integrity_score = inner.state.live_score();

        Ok(FrameUpdate {
            session_id: session_id.to_string(),
            outcome,
            alerts,
            integrity_score,
            timestamp: Utc::now(),
        })
    }

    /// Freeze the final report and release the session's analyzer
    pub fn end(&self, session_id: &str) -> Result<SessionReportView, ProctorError> {
        let session = self.get(session_id)?;
        let mut ingest = lock(&session.ingest, session_id)?;
        let mut inner = lock(&session.inner, session_id)?;
        inner.ensure_active()?;

        let report = inner.build_report();
        let score = report.integrity_score(&self.config.scoring);
        inner.info.status = SessionStatus::Completed;
        inner.info.end_time = Some(Utc::now());
        inner.info.integrity_score = Some(score);
        inner.final_report = Some(report.clone());
        *ingest = None;

        tracing::info!(session_id, integrity_score = score, "session ended");
        Ok(inner.view(report))
    }

    /// Final report for ended sessions, interim report otherwise.
    ///
    /// An interim report drains pending alerts into the session history.
    pub fn report(&self, session_id: &str) -> Result<SessionReportView, ProctorError> {
        let session = self.get(session_id)?;
        let mut inner = lock(&session.inner, session_id)?;
        let report = match inner.final_report.clone() {
            Some(report) => report,
            None => inner.build_report(),
        };
        Ok(inner.view(report))
    }

    pub fn info(&self, session_id: &str) -> Result<SessionInfo, ProctorError> {
        let session = self.get(session_id)?;
        let inner = lock(&session.inner, session_id)?;
        Ok(inner.snapshot_info())
    }

    /// Zero the session's counters and restart its clock.
    ///
    /// Waits for an in-flight frame to finish.
    pub fn reset(&self, session_id: &str) -> Result<(), ProctorError> {
        let session = self.get(session_id)?;
        let _ingest = lock(&session.ingest, session_id)?;
        let mut inner = lock(&session.inner, session_id)?;
        inner.ensure_active()?;
        inner.state.reset();
        tracing::info!(session_id, "session counters reset");
        Ok(())
    }

    /// Relearn the gaze baseline from the next qualifying faces.
    ///
    /// Waits for an in-flight frame to finish.
    pub fn recalibrate(&self, session_id: &str) -> Result<(), ProctorError> {
        let session = self.get(session_id)?;
        let _ingest = lock(&session.ingest, session_id)?;
        let mut inner = lock(&session.inner, session_id)?;
        inner.ensure_active()?;
        inner.state.recalibrate();
        tracing::info!(session_id, "gaze baseline cleared");
        Ok(())
    }

    pub fn delete(&self, session_id: &str) -> Result<(), ProctorError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ProctorError::Poisoned("registry".to_string()))?;
        if sessions.remove(session_id).is_none() {
            return Err(ProctorError::SessionNotFound(session_id.to_string()));
        }
        tracing::info!(session_id, "session deleted");
        Ok(())
    }

    /// Metadata for every session, oldest first
    pub fn list(&self) -> Result<Vec<SessionInfo>, ProctorError> {
        let sessions: Vec<(String, Arc<Session>)> = {
            let map = self
                .sessions
                .read()
                .map_err(|_| ProctorError::Poisoned("registry".to_string()))?;
            map.iter().map(|(id, s)| (id.clone(), Arc::clone(s))).collect()
        };

        let mut infos = Vec::with_capacity(sessions.len());
        for (id, session) in sessions {
            infos.push(lock(&session.inner, &id)?.snapshot_info());
        }
        infos.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(infos)
    }

    pub fn len(&self) -> Result<usize, ProctorError> {
        self.sessions
            .read()
            .map(|s| s.len())
            .map_err(|_| ProctorError::Poisoned("registry".to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, ProctorError> {
        Ok(self.len()? == 0)
    }
}
