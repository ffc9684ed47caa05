//! Per-session WebSocket stream.
//!
//! The subscription is taken before the upgrade, so an unknown session id is
//! rejected as a plain 404 instead of a doomed socket. After the upgrade the
//! socket first receives the session's current status, then every frame the
//! classifier produces, in order. Once a terminal status has been relayed
//! the socket is closed; a subscriber that only wants history uses the log
//! endpoint instead.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use armdeck_broker::Subscription;
use armdeck_core::{SessionId, StatusPayload, StreamMessage};

use crate::error::ApiError;
use crate::state::GatewayState;

pub async fn session_stream(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
    Path(id): Path<SessionId>,
) -> Result<Response, ApiError> {
    let subscription = state.sessions.attach(id).await?;
    Ok(ws.on_upgrade(move |socket| relay(socket, id, subscription)))
}

async fn relay(mut socket: WebSocket, id: SessionId, subscription: Subscription) {
    let opening = StreamMessage::Status(StatusPayload {
        status: subscription.status,
    });
    if send_frame(&mut socket, &opening).await.is_err() {
        return;
    }
    if subscription.status.is_terminal() {
        let _ = socket.close().await;
        return;
    }

    let mut stream = BroadcastStream::new(subscription.receiver);
    while let Some(item) = stream.next().await {
        match item {
            Ok(frame) => {
                let terminal = matches!(
                    &frame,
                    StreamMessage::Status(payload) if payload.status.is_terminal()
                );
                if send_frame(&mut socket, &frame).await.is_err() {
                    // Transport failure detaches this subscriber only; the
                    // session keeps running headless.
                    debug!(session_id = %id, "subscriber transport closed");
                    return;
                }
                if terminal {
                    break;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(session_id = %id, skipped, "slow subscriber dropped oldest frames");
            }
        }
    }
    let _ = socket.close().await;
}

async fn send_frame(socket: &mut WebSocket, frame: &StreamMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to encode stream frame");
            Ok(())
        }
    }
}
