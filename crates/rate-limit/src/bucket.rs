//! Token bucket state for a single client.

use std::time::{Duration, Instant};

/// Slack when comparing against one whole token.
///
/// Refill is computed from nanosecond durations, so a client arriving exactly
/// every `1 / rate` seconds can land a hair below one token.
const TOKEN_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    pub(crate) fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }

    pub(crate) fn last_refill(&self) -> Instant {
        self.last_refill
    }

    /// Adds the tokens earned since the last refill, capped at `burst`.
    ///
    /// A `now` before the last refill adds nothing and leaves the timestamp alone.
    pub(crate) fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);

        self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(burst);
        self.last_refill = self.last_refill.max(now);
    }

    /// Takes one token if available.
    pub(crate) fn try_take(&mut self) -> bool {
        if self.tokens + TOKEN_EPSILON < 1.0 {
            return false;
        }

        self.tokens = (self.tokens - 1.0).max(0.0);

        true
    }

    /// Time until a whole token is available again.
    pub(crate) fn time_until_token(&self, rate: f64) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::try_from_secs_f64(missing / rate).unwrap_or(Duration::MAX)
    }
}
