//! Per-client token bucket rate limiter.

use std::time::{Duration, Instant};

use config::RateLimitConfig;
use dashmap::DashMap;

use crate::{bucket::Bucket, error::RateLimitError, key::ClientKey};

/// Immutable parameters of a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    /// Tokens added to every bucket per second.
    pub rate: f64,
    /// Maximum number of tokens a bucket holds.
    pub burst: u32,
    /// Requested idle time before a bucket may be evicted.
    pub idle_timeout: Duration,
}

impl LimiterSettings {
    /// Settings with the default idle timeout of one minute.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            rate,
            burst,
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// Time an empty bucket needs to refill completely.
    pub fn full_refill(&self) -> Duration {
        Duration::try_from_secs_f64(f64::from(self.burst) / self.rate).unwrap_or(Duration::MAX)
    }

    /// Idle time after which a bucket is evicted.
    ///
    /// Never shorter than [`full_refill`](Self::full_refill): by then an idle
    /// bucket is full again, so dropping it cannot change any decision.
    pub fn effective_idle_timeout(&self) -> Duration {
        self.idle_timeout.max(self.full_refill())
    }
}

impl From<&RateLimitConfig> for LimiterSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            rate: config.rate.as_per_second(),
            burst: config.burst,
            idle_timeout: config.idle_timeout,
        }
    }
}

/// Outcome of [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Admitted,
    /// The client's bucket is empty.
    Rejected {
        /// Time until the client earns its next token.
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }
}

/// Token bucket rate limiter keyed by [`ClientKey`].
///
/// Buckets live in a sharded map. An `admit` call holds the lock of its key's
/// shard for the whole refill-and-take step, so concurrent calls for one key
/// are serialized while keys on other shards proceed in parallel.
#[derive(Debug)]
pub struct RateLimiter {
    settings: LimiterSettings,
    buckets: DashMap<ClientKey, Bucket>,
}

impl RateLimiter {
    /// Creates a limiter, refusing settings that cannot admit anything.
    pub fn new(settings: LimiterSettings) -> Result<Self, RateLimitError> {
        if !settings.rate.is_finite() || settings.rate <= 0.0 {
            return Err(RateLimitError::InvalidRate { rate: settings.rate });
        }

        if settings.burst == 0 {
            return Err(RateLimitError::InvalidBurst);
        }

        log::debug!(
            "Creating rate limiter: {} tokens per second, burst capacity of {}, buckets evicted after {:?} idle",
            settings.rate,
            settings.burst,
            settings.effective_idle_timeout()
        );

        Ok(Self {
            settings,
            buckets: DashMap::new(),
        })
    }

    /// The settings this limiter was created with.
    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Decides whether a request from `key` arriving at `now` may proceed.
    ///
    /// The first request of a key starts with a full bucket. A `now` earlier
    /// than the bucket's last refill is treated as no time passing.
    pub fn admit(&self, key: &ClientKey, now: Instant) -> Decision {
        let rate = self.settings.rate;
        let burst = f64::from(self.settings.burst);

        let mut bucket = self
            .buckets
            .entry(*key)
            .or_insert_with(|| Bucket::full(burst, now));

        bucket.refill(now, rate, burst);

        if bucket.try_take() {
            log::trace!("Request admitted for {key}, {:.3} tokens left", bucket.tokens());
            Decision::Admitted
        } else {
            let retry_after = bucket.time_until_token(rate);
            log::debug!("Request rejected for {key}, next token in {retry_after:?}");
            Decision::Rejected { retry_after }
        }
    }

    /// Drops buckets idle for at least the effective idle timeout, returning how many.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let timeout = self.settings.effective_idle_timeout();
        let mut evicted = 0;

        self.buckets.retain(|_, bucket| {
            let keep = now.saturating_duration_since(bucket.last_refill()) < timeout;

            if !keep {
                evicted += 1;
            }

            keep
        });

        if evicted > 0 {
            log::debug!("Evicted {evicted} idle rate limit buckets, {} remain", self.buckets.len());
        }

        evicted
    }

    /// Stored tokens for `key`, without refilling.
    pub fn tokens(&self, key: &ClientKey) -> Option<f64> {
        self.buckets.get(key).map(|bucket| bucket.tokens())
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no client is tracked.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{IpAddr, Ipv4Addr},
        time::{Duration, Instant},
    };

    use super::*;

    fn key(last_octet: u8) -> ClientKey {
        ClientKey::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)))
    }

    fn limiter(rate: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(LimiterSettings::new(rate, burst)).unwrap()
    }

    #[test]
    fn burst_then_throttle() {
        let limiter = limiter(5.0, 5);
        let now = Instant::now();

        let decisions: Vec<_> = (0..10).map(|_| limiter.admit(&key(1), now).is_admitted()).collect();

        assert_eq!(
            decisions,
            [true, true, true, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn rejection_reports_time_to_next_token() {
        let limiter = limiter(5.0, 1);
        let now = Instant::now();

        assert_eq!(limiter.admit(&key(1), now), Decision::Admitted);
        assert_eq!(
            limiter.admit(&key(1), now),
            Decision::Rejected {
                retry_after: Duration::from_millis(200)
            }
        );
    }

    #[test]
    fn refill_after_one_period() {
        let limiter = limiter(5.0, 5);
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.admit(&key(1), start).is_admitted());
        }

        assert!(!limiter.admit(&key(1), start).is_admitted());
        assert_eq!(limiter.tokens(&key(1)), Some(0.0));

        let later = start + Duration::from_millis(200);
        assert!(limiter.admit(&key(1), later).is_admitted());
        assert!(!limiter.admit(&key(1), later).is_admitted());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1.0, 2);
        let now = Instant::now();

        for _ in 0..5 {
            limiter.admit(&key(1), now);
        }

        assert!(!limiter.admit(&key(1), now).is_admitted());
        assert!(limiter.admit(&key(2), now).is_admitted());
        assert!(limiter.admit(&ClientKey::Unidentified, now).is_admitted());
        assert_eq!(limiter.tokens(&key(2)), Some(1.0));
        assert_eq!(limiter.len(), 3);
    }

    #[test]
    fn clock_going_backwards_does_not_refill() {
        let limiter = limiter(10.0, 3);
        let start = Instant::now();
        let later = start + Duration::from_secs(5);

        assert!(limiter.admit(&key(1), later).is_admitted());
        assert!(limiter.admit(&key(1), later).is_admitted());
        assert_eq!(limiter.tokens(&key(1)), Some(1.0));

        assert!(limiter.admit(&key(1), start).is_admitted());
        assert_eq!(limiter.tokens(&key(1)), Some(0.0));
        assert!(!limiter.admit(&key(1), start).is_admitted());

        // The stored timestamp stayed at `later`, so 100ms after it earns one token.
        assert!(limiter.admit(&key(1), later + Duration::from_millis(100)).is_admitted());
    }

    #[test]
    fn steady_state_at_exact_rate() {
        let limiter = limiter(5.0, 5);
        let start = Instant::now();
        let period = Duration::from_millis(200);

        for i in 0..10_000u32 {
            assert!(limiter.admit(&key(1), start + period * i).is_admitted(), "request {i}");
        }

        assert_eq!(limiter.tokens(&key(1)), Some(4.0));
    }

    #[test]
    fn steady_state_with_unrepresentable_period() {
        let limiter = limiter(3.0, 1);
        let start = Instant::now();
        let period = Duration::from_secs_f64(1.0 / 3.0);

        for i in 0..10_000u32 {
            assert!(limiter.admit(&key(1), start + period * i).is_admitted(), "request {i}");
        }
    }

    #[test]
    fn faster_than_rate_is_throttled() {
        let limiter = limiter(5.0, 5);
        let start = Instant::now();
        let period = Duration::from_millis(100);

        let admitted = (0..100u32)
            .filter(|i| limiter.admit(&key(1), start + period * *i).is_admitted())
            .count();

        // 5 burst tokens plus 5 per second over 9.9 seconds.
        assert_eq!(admitted, 54);
    }

    #[test]
    fn fractional_rate() {
        let limiter = limiter(0.5, 1);
        let start = Instant::now();

        assert!(limiter.admit(&key(1), start).is_admitted());
        assert!(!limiter.admit(&key(1), start + Duration::from_secs(1)).is_admitted());
        assert!(limiter.admit(&key(1), start + Duration::from_secs(2)).is_admitted());
    }

    #[test]
    fn invalid_settings() {
        assert!(matches!(
            RateLimiter::new(LimiterSettings::new(0.0, 5)),
            Err(RateLimitError::InvalidRate { rate }) if rate == 0.0
        ));
        assert!(matches!(
            RateLimiter::new(LimiterSettings::new(-1.0, 5)),
            Err(RateLimitError::InvalidRate { .. })
        ));
        assert!(matches!(
            RateLimiter::new(LimiterSettings::new(f64::NAN, 5)),
            Err(RateLimitError::InvalidRate { .. })
        ));
        assert!(matches!(
            RateLimiter::new(LimiterSettings::new(f64::INFINITY, 5)),
            Err(RateLimitError::InvalidRate { .. })
        ));
        assert!(matches!(
            RateLimiter::new(LimiterSettings::new(5.0, 0)),
            Err(RateLimitError::InvalidBurst)
        ));
    }

    #[test]
    fn eviction_waits_for_full_refill() {
        let settings = LimiterSettings {
            rate: 1.0,
            burst: 10,
            idle_timeout: Duration::from_secs(2),
        };
        assert_eq!(settings.effective_idle_timeout(), Duration::from_secs(10));

        let limiter = RateLimiter::new(settings).unwrap();
        let start = Instant::now();

        limiter.admit(&key(1), start);
        limiter.admit(&key(2), start + Duration::from_secs(5));

        assert_eq!(limiter.evict_idle(start + Duration::from_secs(9)), 0);
        assert_eq!(limiter.evict_idle(start + Duration::from_secs(10)), 1);
        assert_eq!(limiter.tokens(&key(1)), None);
        assert_eq!(limiter.len(), 1);

        assert_eq!(limiter.evict_idle(start + Duration::from_secs(15)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn evicted_client_starts_with_a_full_bucket() {
        let limiter = limiter(2.0, 2);
        let start = Instant::now();

        assert!(limiter.admit(&key(1), start).is_admitted());
        assert!(limiter.admit(&key(1), start).is_admitted());
        assert!(!limiter.admit(&key(1), start).is_admitted());

        let later = start + Duration::from_secs(60);
        assert_eq!(limiter.evict_idle(later), 1);

        assert!(limiter.admit(&key(1), later).is_admitted());
        assert_eq!(limiter.tokens(&key(1)), Some(1.0));
    }

    #[test]
    fn long_idle_timeout_is_kept() {
        let settings = LimiterSettings {
            rate: 100.0,
            burst: 1,
            idle_timeout: Duration::from_secs(300),
        };

        assert_eq!(settings.effective_idle_timeout(), Duration::from_secs(300));
    }
}
