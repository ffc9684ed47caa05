//! Classified messages and the WebSocket wire protocol.
//!
//! The classifier produces [`ClassifiedMessage`] values; the broker retains
//! them as [`LogEntry`] rows and fans them out to subscribers encoded as
//! [`StreamMessage`]. Messages for a session are delivered to every
//! subscriber in the exact order the classifier produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::SessionStatus;

/// Loop timing reported at the bottom of a status table
/// (`time: 5.00ms (200 Hz)`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableTiming {
    pub latency_ms: f64,
    pub rate_hz: f64,
}

/// One semantically tagged unit of session output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedMessage {
    /// Plain progress text.
    Output { text: String },
    /// One full status-table snapshot: ordered joint name → position pairs,
    /// optional loop timing, and the raw block as printed by the CLI.
    Table {
        fields: Vec<(String, f64)>,
        timing: Option<TableTiming>,
        raw: String,
    },
    /// A session state transition.
    Status { state: SessionStatus },
    /// A terminal failure, carrying diagnostic text.
    Error { text: String },
}

impl ClassifiedMessage {
    pub fn output(text: impl Into<String>) -> Self {
        Self::Output { text: text.into() }
    }

    pub fn status(state: SessionStatus) -> Self {
        Self::Status { state }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }
}

/// A retained message plus its arrival time. The session keeps these for its
/// whole lifetime so late subscribers can request the backlog explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub message: ClassifiedMessage,
}

impl LogEntry {
    pub fn now(message: ClassifiedMessage) -> Self {
        Self {
            at: Utc::now(),
            message,
        }
    }
}

/// `data` field of a `status` wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: SessionStatus,
}

/// Externally tagged `{type, data}` frame delivered over the streaming
/// channel. Tables travel as the raw printed block; the client decodes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    Output(String),
    Table(String),
    Status(StatusPayload),
    Error(String),
}

impl From<&ClassifiedMessage> for StreamMessage {
    fn from(message: &ClassifiedMessage) -> Self {
        match message {
            ClassifiedMessage::Output { text } => Self::Output(text.clone()),
            ClassifiedMessage::Table { raw, .. } => Self::Table(raw.clone()),
            ClassifiedMessage::Status { state } => Self::Status(StatusPayload { status: *state }),
            ClassifiedMessage::Error { text } => Self::Error(text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_frame_shape() {
        let frame = StreamMessage::Status(StatusPayload {
            status: SessionStatus::AwaitingInput,
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["data"]["status"], "awaiting_input");

        let frame = StreamMessage::Output("hello".into());
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "output");
        assert_eq!(json["data"], "hello");
    }

    #[test]
    fn table_message_travels_as_raw_block() {
        let message = ClassifiedMessage::Table {
            fields: vec![("j1".into(), 1.0)],
            timing: None,
            raw: "j1.pos | 1.0".into(),
        };
        let frame = StreamMessage::from(&message);
        assert_eq!(frame, StreamMessage::Table("j1.pos | 1.0".into()));
    }

    #[test]
    fn log_entry_flattens_kind() {
        let entry = LogEntry::now(ClassifiedMessage::output("hi"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "output");
        assert_eq!(json["text"], "hi");
        assert!(json["at"].is_string());
    }
}
