//! Exam Proctor - stateful stream-processing core for remote exam proctoring
//!
//! Turns the per-frame output of face, emotion and device detectors into
//! debounced behavioral signals, throttled alerts, running statistics and an
//! integrity score: frame admission → gaze calibration and estimation →
//! looking-away debouncing → alert log → session accumulator → report and
//! score.
//!
//! ## Modules
//!
//! - **Core**: [`state::DetectionState`] drives one session frame by frame
//! - **Registry**: [`session::SessionRegistry`] owns many concurrent sessions
//! - **Collaborators**: [`pipeline`] defines the detector seams

pub mod accumulator;
pub mod admission;
pub mod alerts;
pub mod config;
pub mod debounce;
pub mod error;
pub mod gaze;
pub mod pipeline;
pub mod replay;
pub mod report;
pub mod scoring;
pub mod session;
pub mod state;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use alerts::{Alert, AlertType};
pub use config::ProctorConfig;
pub use error::ProctorError;
pub use pipeline::{DetectorError, Frame, FrameAnalyzer};
pub use report::{ScoredReport, SessionReport};
pub use scoring::{IntegrityBand, ScoringRules};
pub use session::{SessionRegistry, StartRequest};
pub use state::DetectionState;
pub use types::{FrameObservation, FrameOutcome, GazeDirection, RecordedFrame};

/// Library version
pub const PROCTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "exam-proctor";
