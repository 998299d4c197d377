//! Error types for the proctoring core

use thiserror::Error;

/// Errors surfaced by configuration, the session registry and JSON boundaries.
///
/// Collaborator failures are not represented here; see
/// [`DetectorError`](crate::pipeline::DetectorError). Those never abort a
/// frame.
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse recorded frame: {0}")]
    ParseError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Session already ended: {0}")]
    SessionEnded(String),

    #[error("Session has no frame analyzer: {0}")]
    NoAnalyzer(String),

    #[error("Session state poisoned: {0}")]
    Poisoned(String),
}
