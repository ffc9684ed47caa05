use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a session.
///
/// `pending → running ⇄ awaiting_input → {finished, failed, stopped}`.
/// The three terminal states absorb: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, subprocess not spawned yet.
    Pending,
    /// Subprocess alive and producing output.
    Running,
    /// Subprocess blocked on a terminal read, waiting for an operator
    /// acknowledgement.
    AwaitingInput,
    /// Subprocess exited with code 0.
    Finished,
    /// Subprocess exited non-zero, or spawn/input write failed.
    Failed,
    /// Explicitly cancelled by the operator.
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Stopped)
    }

    /// True while the subprocess is (or may still be) alive.
    pub fn is_live(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::AwaitingInput => "awaiting_input",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(SessionStatus::Finished.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Stopped.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
        assert!(!SessionStatus::AwaitingInput.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::AwaitingInput).unwrap();
        assert_eq!(json, r#""awaiting_input""#);
    }
}
