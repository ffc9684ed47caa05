//! REST routes for session and device control.

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use armdeck_core::{Operation, SessionId};
use armdeck_devices::discovery;

use crate::error::ApiError;
use crate::state::GatewayState;
use crate::ws;

/// Build the router with every API route.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", get(list_sessions).post(start_session))
        .route("/api/sessions/{id}", get(session_status).delete(stop_session))
        .route("/api/sessions/{id}/input", post(submit_input))
        .route("/api/sessions/{id}/log", get(session_log))
        .route("/api/ports", get(list_ports))
        .route("/api/devices", get(scan_devices).delete(stop_all_devices))
        .route("/api/devices/{index}", get(device_status))
        .route("/api/devices/{index}/start", post(start_device))
        .route("/api/devices/{index}/stop", post(stop_device))
        .route("/ws/sessions/{id}", get(ws::session_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "armdeck",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn start_session(
    State(state): State<GatewayState>,
    Json(operation): Json<Operation>,
) -> Result<Json<Value>, ApiError> {
    let id = state.sessions.start(operation).await?;
    Ok(Json(json!({ "sessionId": id })))
}

async fn list_sessions(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({ "sessions": state.sessions.list().await }))
}

async fn session_status(
    State(state): State<GatewayState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    let (status, awaiting_input) = state.sessions.status(id).await?;
    Ok(Json(json!({
        "status": status,
        "awaitingInput": awaiting_input,
    })))
}

#[derive(Debug, Deserialize)]
struct InputRequest {
    /// Text to relay to the subprocess. Defaults to a bare newline, the
    /// "acknowledge and continue" payload.
    input: Option<String>,
}

async fn submit_input(
    State(state): State<GatewayState>,
    Path(id): Path<SessionId>,
    Json(request): Json<InputRequest>,
) -> Result<Json<Value>, ApiError> {
    let payload = request.input.unwrap_or_else(|| "\n".to_string());
    state.sessions.submit_input(id, payload.as_bytes()).await?;
    Ok(Json(json!({ "status": "submitted" })))
}

async fn session_log(
    State(state): State<GatewayState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    let log = state.sessions.log(id).await?;
    Ok(Json(json!({ "log": log })))
}

async fn stop_session(
    State(state): State<GatewayState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    state.sessions.stop(id).await?;
    Ok(Json(json!({ "status": "stopped" })))
}

async fn list_ports() -> Json<Value> {
    Json(json!({ "ports": discovery::list_ports() }))
}

async fn scan_devices(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "cameras": state.devices.scan().await,
        "active": state.devices.active_indexes().await,
    }))
}

async fn device_status(
    State(state): State<GatewayState>,
    Path(index): Path<u32>,
) -> Json<Value> {
    Json(json!({ "status": state.devices.status(index).await }))
}

async fn start_device(
    State(state): State<GatewayState>,
    Path(index): Path<u32>,
) -> Result<Json<Value>, ApiError> {
    state.devices.start(index).await?;
    Ok(Json(json!({ "status": "active" })))
}

async fn stop_device(
    State(state): State<GatewayState>,
    Path(index): Path<u32>,
) -> Result<Json<Value>, ApiError> {
    state.devices.stop(index).await?;
    Ok(Json(json!({ "status": "inactive" })))
}

async fn stop_all_devices(State(state): State<GatewayState>) -> Json<Value> {
    let failures = state.devices.stop_all().await;
    let failed: Vec<Value> = failures
        .iter()
        .map(|(index, err)| json!({ "index": index, "error": err.to_string() }))
        .collect();
    Json(json!({ "status": "stopped", "failures": failed }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use armdeck_broker::{BrokerSettings, ClassifierSettings, SessionRegistry};
    use armdeck_core::Launcher;
    use armdeck_devices::{DeviceStreamRegistry, VideoNodeBackend};

    use super::*;

    // Exercises every handler signature, including the WebSocket relay's
    // sink bounds, against the real registries.
    #[tokio::test]
    async fn router_assembles_with_all_routes() {
        let sessions = Arc::new(SessionRegistry::new(
            Launcher::default(),
            ClassifierSettings::default(),
            BrokerSettings::default(),
        ));
        let devices = Arc::new(DeviceStreamRegistry::new(Arc::new(
            VideoNodeBackend::new(),
        )));
        let _router = build_router(GatewayState { sessions, devices });
    }
}
