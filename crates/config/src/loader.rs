use std::{fmt::Write, path::Path, str::FromStr};

use anyhow::{Context, bail};
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::Config;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let mut raw_config: Value = toml::from_str(&content)?;
    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    for warning in rate_limit_warnings(&config) {
        log::warn!("{warning}");
    }

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    validate_rate_limit(config)?;
    validate_listeners(config)?;

    if let Some(root) = &config.server.site.root
        && !root.is_dir()
    {
        bail!("Site root {} is not a directory", root.display());
    }

    if config.server.health.enabled && !config.server.health.path.starts_with('/') {
        bail!(
            "Health endpoint path must start with '/', got '{}'",
            config.server.health.path
        );
    }

    Ok(())
}

fn validate_rate_limit(config: &Config) -> anyhow::Result<()> {
    let rate_limit = &config.server.rate_limit;

    if !rate_limit.enabled {
        return Ok(());
    }

    let rate = rate_limit.rate.as_per_second();

    if !rate.is_finite() || rate <= 0.0 {
        bail!("Rate limit rate must be a positive number of requests per second, got {rate}");
    }

    if rate_limit.burst == 0 {
        bail!("Rate limit burst must be at least 1");
    }

    if rate_limit.sweep_interval.is_zero() {
        bail!("Rate limit sweep_interval must be greater than zero");
    }

    Ok(())
}

fn validate_listeners(config: &Config) -> anyhow::Result<()> {
    let server = &config.server;
    let site = server.site.listen_address;

    if server.fallback.enabled && server.fallback.listen_address == site {
        bail!("The site and the fallback listener cannot share the address {site}");
    }

    if server.health.enabled
        && let Some(health) = server.health.listen
    {
        if health == site {
            bail!("The health endpoint and the site cannot share the address {health}");
        }

        if server.fallback.enabled && health == server.fallback.listen_address {
            bail!("The health endpoint and the fallback listener cannot share the address {health}");
        }
    }

    Ok(())
}

/// Settings that are valid but probably not what the operator wants.
pub(crate) fn rate_limit_warnings(config: &Config) -> Vec<String> {
    let rate_limit = &config.server.rate_limit;
    let mut warnings = Vec::new();

    if !rate_limit.enabled {
        return warnings;
    }

    if rate_limit.trust_forwarded_headers {
        warnings.push(
            "Rate limiting trusts X-Forwarded-For and X-Real-IP. Clients can pick their own rate limit key \
             unless a proxy in front of Tollgate overwrites these headers."
                .to_string(),
        );
    }

    let refill_secs = f64::from(rate_limit.burst) / rate_limit.rate.as_per_second();

    if rate_limit.idle_timeout.as_secs_f64() < refill_secs {
        warnings.push(format!(
            "Rate limit idle_timeout of {:?} is shorter than the {refill_secs:.3}s a bucket needs to refill. \
             Idle buckets are kept until they are full.",
            rate_limit.idle_timeout
        ));
    }

    warnings
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}
