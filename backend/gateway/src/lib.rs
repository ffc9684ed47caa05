//! `armdeck-gateway` — the HTTP/WebSocket control surface.
//!
//! REST for session and device control, one WebSocket route per session for
//! the live stream. All responses are JSON; broker errors map onto HTTP
//! status codes in [`error::ApiError`].

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use routes::build_router;
pub use state::GatewayState;

use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    info!("gateway listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
