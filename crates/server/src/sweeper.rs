//! Periodic eviction of idle rate limit buckets.

use std::{sync::Arc, time::Duration};

use ::rate_limit::RateLimitManager;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Calls [`RateLimitManager::evict_idle`] every `interval` until `shutdown` fires.
pub(crate) async fn run(manager: Arc<RateLimitManager>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = manager.evict_idle();

                if evicted > 0 {
                    log::debug!(
                        "Evicted {evicted} idle rate limit buckets, {} clients still tracked",
                        manager.tracked_clients()
                    );
                }
            }
        }
    }

    log::debug!("Rate limit sweeper stopped");
}
