//! Tollgate server library.
//!
//! Provides a reusable server function to serve Tollgate either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod client_key;
mod fallback;
mod health;
mod listener;
mod metrics;
mod rate_limit;
mod site;
mod sweeper;

use std::sync::Arc;

use ::rate_limit::RateLimitManager;
use anyhow::anyhow;
use config::Config;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Configuration for serving Tollgate.
pub struct ServeConfig {
    /// The deserialized Tollgate TOML configuration.
    pub config: Config,
    /// Cancelling this token drains and stops every listener.
    pub shutdown: CancellationToken,
}

/// Starts and runs the Tollgate listeners until shutdown or the first listener failure.
///
/// The configuration is validated first, so overrides applied after loading are checked too.
pub async fn serve(ServeConfig { config, shutdown }: ServeConfig) -> anyhow::Result<()> {
    config.validate()?;

    let server = &config.server;

    // Cancelled when serving ends, so the sweeper never outlives the listeners.
    let shutdown = shutdown.child_token();

    let rate_limit_manager = if server.rate_limit.enabled {
        log::debug!(
            "Initializing rate limiting with {} and a burst of {}",
            server.rate_limit.rate,
            server.rate_limit.burst
        );

        let manager = Arc::new(RateLimitManager::new(&server.rate_limit)?);

        tokio::spawn(sweeper::run(
            manager.clone(),
            server.rate_limit.sweep_interval,
            shutdown.clone(),
        ));

        Some(manager)
    } else {
        log::debug!("Rate limiting disabled - every request to the site is admitted");
        None
    };

    let mut listeners = JoinSet::new();

    listeners.spawn(listener::serve_router(
        "Site",
        server.site.listen_address,
        "/",
        server.site.tls.clone(),
        site::router(server, rate_limit_manager),
        shutdown.clone(),
    ));

    if server.fallback.enabled {
        listeners.spawn(listener::serve_router(
            "Fallback listener",
            server.fallback.listen_address,
            "/",
            None,
            fallback::router(server.fallback.status),
            shutdown.clone(),
        ));
    }

    if server.health.enabled
        && let Some(listen) = server.health.listen
    {
        listeners.spawn(health::bind_health_endpoint(
            listen,
            server.site.tls.clone(),
            server.health.clone(),
            shutdown.clone(),
        ));
    }

    let mut result = Ok(());

    while let Some(joined) = listeners.join_next().await {
        let outcome = joined.map_err(|e| anyhow!("Listener task failed: {e}")).and_then(|r| r);

        if let Err(e) = outcome
            && result.is_ok()
        {
            log::error!("{e}");
            shutdown.cancel();
            result = Err(e);
        }
    }

    shutdown.cancel();

    result
}
