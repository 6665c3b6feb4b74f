use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use config::{HealthConfig, TlsServerConfig};
use http::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::{listener, metrics::MetricsLayer};

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum HealthState {
    /// The server accepts requests.
    Healthy,
}

/// Answers health probes. Never rate limited.
pub(crate) async fn health() -> (StatusCode, Json<HealthState>) {
    (StatusCode::OK, Json(HealthState::Healthy))
}

/// Serves the health endpoint on its own listener until `shutdown` fires.
pub(crate) async fn bind_health_endpoint(
    addr: SocketAddr,
    tls_config: Option<TlsServerConfig>,
    health_config: HealthConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route(&health_config.path, get(health))
        .layer(MetricsLayer::new("health"));

    listener::serve_router(
        "Health endpoint",
        addr,
        &health_config.path,
        tls_config,
        app,
        shutdown,
    )
    .await
}
