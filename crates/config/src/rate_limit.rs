//! Rate limiting configuration structures.

use std::{fmt, str::FromStr, time::Duration};

use duration_str::deserialize_duration;
use serde::{Deserialize, Deserializer, de};

/// Per-client rate limiting configuration for the rate-limited site.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Steady-state refill rate of every client bucket.
    pub rate: Rate,
    /// Maximum number of tokens a client bucket can hold.
    pub burst: u32,
    /// Buckets untouched for this long are dropped by the sweeper.
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
    /// How often the sweeper looks for idle buckets.
    #[serde(deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,
    /// Identify clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer address.
    ///
    /// Only enable this behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: Rate::per_second(5.0),
            burst: 5,
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            trust_forwarded_headers: false,
        }
    }
}

/// A request rate, kept in the unit it was written in.
///
/// Deserializes from a plain number (requests per second) or from a string
/// such as `"5r/s"` or `"300r/m"`. Rates compare by their per-second value.
#[derive(Clone, Copy)]
pub struct Rate {
    requests: f64,
    unit: RateUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateUnit {
    Second,
    Minute,
}

impl Rate {
    /// Creates a rate from a number of requests per second.
    pub const fn per_second(requests: f64) -> Self {
        Self {
            requests,
            unit: RateUnit::Second,
        }
    }

    /// Creates a rate from a number of requests per minute.
    pub const fn per_minute(requests: f64) -> Self {
        Self {
            requests,
            unit: RateUnit::Minute,
        }
    }

    /// Requests per second.
    pub fn as_per_second(self) -> f64 {
        match self.unit {
            RateUnit::Second => self.requests,
            RateUnit::Minute => self.requests / 60.0,
        }
    }
}

impl PartialEq for Rate {
    fn eq(&self, other: &Self) -> bool {
        self.as_per_second() == other.as_per_second()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            RateUnit::Second => write!(f, "{}r/s", self.requests),
            RateUnit::Minute => write!(f, "{}r/m", self.requests),
        }
    }
}

impl fmt::Debug for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate({self})")
    }
}

impl FromStr for Rate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (amount, per_minute) = if let Some(amount) = s.strip_suffix("r/s") {
            (amount, false)
        } else if let Some(amount) = s.strip_suffix("r/m") {
            (amount, true)
        } else {
            (s, false)
        };

        let amount: f64 = amount
            .trim()
            .parse()
            .map_err(|_| format!("invalid rate '{s}', expected a number or a value like \"5r/s\" or \"30r/m\""))?;

        Ok(if per_minute {
            Rate::per_minute(amount)
        } else {
            Rate::per_second(amount)
        })
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RateVisitor;

        impl de::Visitor<'_> for RateVisitor {
            type Value = Rate;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a number of requests per second or a string like \"5r/s\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Rate, E> {
                Ok(Rate::per_second(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rate, E> {
                Ok(Rate::per_second(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rate, E> {
                Ok(Rate::per_second(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Rate, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(RateVisitor)
    }
}
