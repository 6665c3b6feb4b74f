//! Rate limit manager implementation.

use std::sync::Arc;

use config::RateLimitConfig;
use telemetry::{Counter, KeyValue, metrics};

use crate::clock::{Clock, MonotonicClock};
use crate::error::RateLimitError;
use crate::key::ClientKey;
use crate::limiter::{Decision, LimiterSettings, RateLimiter};

/// Rate limiter bound to a clock, shared by all request handlers.
pub struct RateLimitManager {
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    decisions: Counter<u64>,
    evictions: Counter<u64>,
}

impl RateLimitManager {
    /// Create a new rate limit manager reading the monotonic clock.
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    /// Create a new rate limit manager reading the given clock.
    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        let limiter = RateLimiter::new(LimiterSettings::from(config))?;
        let meter = metrics::meter();

        Ok(Self {
            limiter,
            clock,
            decisions: meter.u64_counter(metrics::RATE_LIMIT_DECISIONS).build(),
            evictions: meter.u64_counter(metrics::RATE_LIMIT_EVICTIONS).build(),
        })
    }

    /// Spend one token of `key`'s budget.
    ///
    /// Returns [`RateLimitError::LimitExceeded`] when the bucket is empty.
    pub fn check(&self, key: &ClientKey) -> Result<(), RateLimitError> {
        match self.limiter.admit(key, self.clock.now()) {
            Decision::Admitted => {
                self.decisions.add(1, &[KeyValue::new("decision", "admitted")]);
                Ok(())
            }
            Decision::Rejected { retry_after } => {
                self.decisions.add(1, &[KeyValue::new("decision", "rejected")]);
                Err(RateLimitError::LimitExceeded { key: *key, retry_after })
            }
        }
    }

    /// Drop buckets that have been idle long enough to be full again.
    pub fn evict_idle(&self) -> usize {
        let evicted = self.limiter.evict_idle(self.clock.now());

        if evicted > 0 {
            self.evictions.add(evicted as u64, &[]);
        }

        evicted
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// The underlying limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
