use thiserror::Error;

use crate::status::SessionStatus;
use crate::SessionId;

/// Error taxonomy for the session broker.
///
/// Nothing here is auto-retried: the wrapped CLI operations move physical
/// hardware, so retry is a caller policy decision.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Missing or invalid start parameters. Surfaced to the caller, no retry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested device/port is already bound to a running session.
    #[error("resource busy: {resource} is bound to session {holder}")]
    ResourceBusy { resource: String, holder: SessionId },

    /// The subprocess could not be spawned (executable missing, permissions).
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The caller referenced an unknown session.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The caller referenced a session in a state that does not allow the
    /// operation (e.g. input submitted to a finished session).
    #[error("invalid session state: {actual} (expected {expected})")]
    InvalidState {
        expected: &'static str,
        actual: SessionStatus,
    },

    /// The subprocess input pipe is closed; the session transitions to
    /// `failed`.
    #[error("failed to write to process input: {0}")]
    Write(String),
}

impl BrokerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
