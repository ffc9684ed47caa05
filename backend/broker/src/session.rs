//! One tracked session: subprocess handle, state machine, retained log, and
//! broadcast topic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use armdeck_core::{
    ClassifiedMessage, LogEntry, Operation, OperationKind, SessionId, SessionStatus, StreamMessage,
};
use armdeck_runner::ProcessRunner;

/// Live state of one session. The process handle is exclusively owned here;
/// all mutations of a session's state go through its own locks, so two
/// sessions never contend with each other.
pub struct Session {
    id: SessionId,
    operation: Operation,
    created_at: DateTime<Utc>,
    runner: ProcessRunner,
    status: Mutex<SessionStatus>,
    log: Mutex<Vec<LogEntry>>,
    events: broadcast::Sender<StreamMessage>,
}

impl Session {
    pub fn new(
        id: SessionId,
        operation: Operation,
        runner: ProcessRunner,
        events: broadcast::Sender<StreamMessage>,
    ) -> Self {
        Self {
            id,
            operation,
            created_at: Utc::now(),
            runner,
            status: Mutex::new(SessionStatus::Pending),
            log: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub async fn status(&self) -> SessionStatus {
        *self.status.lock().await
    }

    /// Attach a new subscriber to the live stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamMessage> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Append to the retained log and fan out to current subscribers. A send
    /// with zero subscribers is a no-op; the session runs headless.
    pub async fn publish(&self, message: ClassifiedMessage) {
        let frame = StreamMessage::from(&message);
        self.log.lock().await.push(LogEntry::now(message));
        let _ = self.events.send(frame);
    }

    /// Move to `next` and publish the status change. Terminal states absorb:
    /// once finished/failed/stopped, nothing transitions out. Returns whether
    /// the transition happened.
    pub async fn transition(&self, next: SessionStatus) -> bool {
        {
            let mut status = self.status.lock().await;
            if status.is_terminal() || *status == next {
                return false;
            }
            debug!(session_id = %self.id, from = %*status, to = %next, "session transition");
            *status = next;
        }
        self.publish(ClassifiedMessage::status(next)).await;
        true
    }

    /// Snapshot of the retained message log.
    pub async fn log(&self) -> Vec<LogEntry> {
        self.log.lock().await.clone()
    }

    /// The last `limit` lines of human-readable output, for failure
    /// diagnostics.
    pub async fn output_tail(&self, limit: usize) -> Vec<String> {
        let log = self.log.lock().await;
        log.iter()
            .rev()
            .filter_map(|entry| match &entry.message {
                ClassifiedMessage::Output { text } | ClassifiedMessage::Error { text } => {
                    Some(text.clone())
                }
                _ => None,
            })
            .take(limit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    pub fn summary(&self, status: SessionStatus) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            operation: self.operation.kind(),
            status,
            created_at: self.created_at,
        }
    }
}

/// Listing row for a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub operation: OperationKind,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}
