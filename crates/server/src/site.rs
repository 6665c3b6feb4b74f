//! The rate limited site.

use std::sync::Arc;

use ::rate_limit::RateLimitManager;
use axum::{Router, response::Html, routing::get};
use config::ServerConfig;
use http::StatusCode;
use tower_http::services::ServeDir;

use crate::{health, metrics::MetricsLayer, rate_limit::RateLimitLayer};

const INDEX_PAGE: &str = include_str!("site/index.html");

/// Builds the router of the site listener.
///
/// The health route is added after the rate limit layer so probes are never throttled.
pub(crate) fn router(config: &ServerConfig, rate_limit_manager: Option<Arc<RateLimitManager>>) -> Router {
    let mut router = match &config.site.root {
        Some(root) => {
            log::debug!("Serving static files from {}", root.display());
            Router::new().fallback_service(ServeDir::new(root))
        }
        None => Router::new().route("/", get(index)).fallback(not_found),
    };

    if let Some(manager) = rate_limit_manager {
        router = router.layer(RateLimitLayer::new(
            manager,
            config.rate_limit.trust_forwarded_headers,
        ));
    }

    if config.health.enabled && config.health.listen.is_none() {
        router = router.route(&config.health.path, get(health::health));
    }

    router.layer(MetricsLayer::new("site"))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
