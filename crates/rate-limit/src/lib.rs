//! Per-client rate limiting for Tollgate.
//!
//! Every client gets a token bucket holding up to `burst` tokens that refills
//! continuously at `rate` tokens per second. Each admitted request spends one
//! token; a client with an empty bucket is rejected until it earns another.
//!
//! Buckets are created on a client's first request and evicted once they
//! have been idle long enough to be full again.

#![deny(missing_docs)]

mod bucket;
mod clock;
mod error;
mod key;
mod limiter;
mod manager;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::RateLimitError;
pub use key::ClientKey;
pub use limiter::{Decision, LimiterSettings, RateLimiter};
pub use manager::RateLimitManager;
