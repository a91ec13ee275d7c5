use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn health_router() -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
}

/// Serve liveness and readiness endpoints until `token` is cancelled.
pub async fn run_health_server(
    addr: SocketAddr,
    token: CancellationToken,
) -> anyhow::Result<()> {
    info!("health server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, health_router())
        .with_graceful_shutdown(token.cancelled_owned())
        .await?;
    Ok(())
}
