//! Health endpoint configuration.

use std::{borrow::Cow, net::SocketAddr};

use serde::Deserialize;

/// Health endpoint configuration.
///
/// The endpoint is never rate limited. Without `listen` it is mounted on the site.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// Dedicated socket address for the health endpoint.
    pub listen: Option<SocketAddr>,
    /// The path for the health endpoint.
    pub path: Cow<'static, str>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            enabled: true,
            listen: None,
            path: Cow::Borrowed("/health"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HealthConfig;

    #[test]
    fn separate_listener() {
        let config: HealthConfig = toml::from_str(r#"listen = "127.0.0.1:9090""#).unwrap();

        insta::assert_debug_snapshot!(config, @r#"
        HealthConfig {
            enabled: true,
            listen: Some(
                127.0.0.1:9090,
            ),
            path: "/health",
        }
        "#);
    }
}
