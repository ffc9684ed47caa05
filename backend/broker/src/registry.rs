//! Session registry: start/stop/status/input plus automatic reaping.
//!
//! One shared map of `Arc<Session>` entries; every session serializes its
//! own mutations behind its own locks, so there is no global lock across
//! sessions, only the per-physical-port mutual exclusion enforced at start
//! time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use armdeck_classifier::{Classifier, ClassifierRules};
use armdeck_core::{
    BrokerError, ClassifiedMessage, Launcher, LogEntry, Operation, SessionId, SessionStatus,
};
use armdeck_runner::ProcessRunner;

use crate::session::{Session, SessionSummary};
use crate::settings::{BrokerSettings, ClassifierSettings};
use crate::stream::Subscription;

pub struct SessionRegistry {
    launcher: Launcher,
    classifier: ClassifierSettings,
    settings: BrokerSettings,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    /// port/device path → the session currently holding it.
    ports: Mutex<HashMap<String, SessionId>>,
}

impl SessionRegistry {
    pub fn new(
        launcher: Launcher,
        classifier: ClassifierSettings,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            launcher,
            classifier,
            settings,
            sessions: RwLock::new(HashMap::new()),
            ports: Mutex::new(HashMap::new()),
        }
    }

    /// Validate parameters, claim the operation's ports, spawn the
    /// subprocess, and start its output pump.
    pub async fn start(self: &Arc<Self>, operation: Operation) -> Result<SessionId, BrokerError> {
        operation.validate()?;
        let id = Uuid::new_v4();
        self.claim_ports(&operation, id).await?;

        let spec = self.launcher.command(&operation);
        let runner = match ProcessRunner::spawn(spec) {
            Ok(runner) => runner,
            Err(err) => {
                self.release_ports(id).await;
                return Err(err);
            }
        };

        let rules = ClassifierRules::for_kind(
            operation.kind(),
            &self.classifier.prompt_phrases,
            self.classifier.table_flush,
        );
        // broadcast::channel panics on zero capacity; a misconfigured zero
        // degrades to the smallest working buffer instead.
        let (events, _) = broadcast::channel(self.settings.channel_capacity.max(1));
        let session = Arc::new(Session::new(id, operation, runner, events));
        self.sessions.write().await.insert(id, session.clone());

        session
            .publish(ClassifiedMessage::output(session.operation().banner()))
            .await;
        session.transition(SessionStatus::Running).await;
        info!(session_id = %id, operation = %session.operation().kind(), pid = session.runner().pid(),
            "session started");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.pump(session, Classifier::new(rules)).await;
        });
        Ok(id)
    }

    /// Relay operator input to the subprocess's stdin. Only valid while the
    /// session is `running` or `awaiting_input`; a successful write clears
    /// `awaiting_input` back to `running`.
    pub async fn submit_input(&self, id: SessionId, payload: &[u8]) -> Result<(), BrokerError> {
        let session = self.get(id).await?;
        let status = session.status().await;
        if !matches!(
            status,
            SessionStatus::Running | SessionStatus::AwaitingInput
        ) {
            return Err(BrokerError::InvalidState {
                expected: "running or awaiting_input",
                actual: status,
            });
        }

        match session.runner().write(payload).await {
            Ok(()) => {
                session.transition(SessionStatus::Running).await;
                debug!(session_id = %id, "input relayed");
                Ok(())
            }
            Err(err) => {
                // Input pipe closed under us: the session fails, with the
                // output tail attached for diagnosis.
                warn!(session_id = %id, error = %err, "input write failed");
                self.fail_with_tail(&session, format!("input write failed: {err}"))
                    .await;
                let grace = self.settings.stop_grace;
                let runner_session = session.clone();
                tokio::spawn(async move {
                    let _ = runner_session.runner().terminate(grace).await;
                });
                Err(err)
            }
        }
    }

    /// Current state of a session: its status plus the awaiting-input flag.
    pub async fn status(&self, id: SessionId) -> Result<(SessionStatus, bool), BrokerError> {
        let session = self.get(id).await?;
        let status = session.status().await;
        Ok((status, status == SessionStatus::AwaitingInput))
    }

    /// Stop a session. Idempotent: stopping an already-terminal session is a
    /// no-op. Returns only after the subprocess is gone and the port lock is
    /// released; there is no "stop accepted but still holding the port"
    /// window.
    pub async fn stop(&self, id: SessionId) -> Result<(), BrokerError> {
        let session = self.get(id).await?;
        if session.transition(SessionStatus::Stopped).await {
            info!(session_id = %id, "session stopped by operator");
        }
        if let Err(err) = session.runner().terminate(self.settings.stop_grace).await {
            warn!(session_id = %id, error = %err, "terminate failed");
        }
        self.release_ports(id).await;
        Ok(())
    }

    /// Attach a subscriber to a session's live stream.
    pub async fn attach(&self, id: SessionId) -> Result<Subscription, BrokerError> {
        let session = self.get(id).await?;
        let receiver = session.subscribe();
        let status = session.status().await;
        Ok(Subscription { receiver, status })
    }

    /// The retained message backlog, in original order.
    pub async fn log(&self, id: SessionId) -> Result<Vec<LogEntry>, BrokerError> {
        Ok(self.get(id).await?.log().await)
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions.values() {
            out.push(session.summary(session.status().await));
        }
        out
    }

    /// Drop terminal sessions nobody is subscribed to. Called periodically;
    /// a terminal session with a live subscriber is kept so the subscriber
    /// can still fetch its backlog.
    pub async fn reap_terminal(&self) -> usize {
        let mut doomed = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.status().await.is_terminal() && session.subscriber_count() == 0 {
                    doomed.push(*id);
                }
            }
        }
        if !doomed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &doomed {
                sessions.remove(id);
                debug!(session_id = %id, "reaped terminal session");
            }
        }
        doomed.len()
    }

    /// Stop every live session. Used on process-wide shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.read().await.keys().copied().collect();
        for id in ids {
            if let Err(err) = self.stop(id).await {
                warn!(session_id = %id, error = %err, "shutdown stop failed");
            }
        }
    }

    async fn get(&self, id: SessionId) -> Result<Arc<Session>, BrokerError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(BrokerError::SessionNotFound(id))
    }

    /// Claim every port the operation names, or fail with `ResourceBusy`
    /// without claiming any.
    async fn claim_ports(&self, operation: &Operation, id: SessionId) -> Result<(), BrokerError> {
        let wanted = operation.ports();
        let mut held = self.ports.lock().await;
        for port in &wanted {
            if let Some(holder) = held.get(port) {
                return Err(BrokerError::ResourceBusy {
                    resource: port.clone(),
                    holder: *holder,
                });
            }
        }
        for port in wanted {
            held.insert(port, id);
        }
        Ok(())
    }

    /// Release every port held by `id`. Idempotent.
    async fn release_ports(&self, id: SessionId) {
        self.ports.lock().await.retain(|_, holder| *holder != id);
    }

    async fn fail_with_tail(&self, session: &Arc<Session>, reason: String) {
        if session.status().await.is_terminal() {
            return;
        }
        let tail = session.output_tail(self.settings.error_tail_lines).await;
        let text = if tail.is_empty() {
            reason
        } else {
            format!("{reason}\nlast output:\n{}", tail.join("\n"))
        };
        session.publish(ClassifiedMessage::error(text)).await;
        session.transition(SessionStatus::Failed).await;
    }

    /// Per-session pipeline: read merged output lines, classify, publish.
    /// The pump drives the classifier's table flush timeout and, on EOF,
    /// observes the exit status and settles the terminal state. Delivery is
    /// broadcast-buffered, so reading never blocks on a slow subscriber.
    async fn pump(self: Arc<Self>, session: Arc<Session>, mut classifier: Classifier) {
        loop {
            let line = match classifier.flush_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        line = session.runner().read_line() => line,
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                            if let Some(table) = classifier.flush() {
                                session.publish(table).await;
                            }
                            continue;
                        }
                    }
                }
                None => session.runner().read_line().await,
            };
            let Some(line) = line else { break };

            for message in classifier.push(&line) {
                match message {
                    ClassifiedMessage::Status {
                        state: SessionStatus::AwaitingInput,
                    } => {
                        // The transition publishes the status change itself
                        // and dedups repeated prompts while already awaiting.
                        session.transition(SessionStatus::AwaitingInput).await;
                    }
                    other => session.publish(other).await,
                }
            }
        }

        if let Some(table) = classifier.flush() {
            session.publish(table).await;
        }

        match session.runner().wait().await {
            Ok(status) if status.success() => {
                if session.transition(SessionStatus::Finished).await {
                    info!(session_id = %session.id(), "session finished");
                }
            }
            Ok(status) => {
                let reason = match status.code() {
                    Some(code) => format!("process exited with code {code}"),
                    None => "process terminated by signal".to_string(),
                };
                self.fail_with_tail(&session, reason).await;
            }
            Err(err) => {
                self.fail_with_tail(&session, format!("failed to reap process: {err}"))
                    .await;
            }
        }
        // Release the ports even if no client ever calls stop.
        self.release_ports(session.id()).await;
    }
}
