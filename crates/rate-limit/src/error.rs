//! Error types for rate limiting.

use std::time::Duration;

use crate::key::ClientKey;

/// Errors that can occur during rate limiting.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The configured rate cannot refill a bucket.
    #[error("Rate must be a positive, finite number of requests per second, got {rate}")]
    InvalidRate {
        /// The rejected rate.
        rate: f64,
    },

    /// The configured burst cannot hold a single token.
    #[error("Burst capacity must be at least 1")]
    InvalidBurst,

    /// The client spent its budget.
    #[error("Rate limit exceeded for {key}")]
    LimitExceeded {
        /// The throttled client.
        key: ClientKey,
        /// Time to wait before retrying.
        retry_after: Duration,
    },
}

impl RateLimitError {
    /// Get the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::InvalidRate { .. } | Self::InvalidBurst => None,
        }
    }
}
