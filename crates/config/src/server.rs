//! HTTP server configuration settings.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
};

use http::StatusCode;
use serde::{Deserialize, Deserializer, de};

use crate::{HealthConfig, RateLimitConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// The rate-limited site.
    #[serde(default)]
    pub site: SiteConfig,
    /// The plain listener answering every request with a fixed status.
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Health endpoint configuration.
    #[serde(default)]
    pub health: HealthConfig,
    /// Rate limiting configuration for the site.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// The rate-limited site, served over TLS when certificates are configured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// The socket address the site listens on.
    pub listen_address: SocketAddr,
    /// TLS configuration. Without it the site is served over plain HTTP.
    pub tls: Option<TlsServerConfig>,
    /// Directory with static content. A built-in page is served when unset.
    pub root: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8443)),
            tls: None,
            root: None,
        }
    }
}

impl SiteConfig {
    /// URL scheme the site is reachable with.
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() { "https" } else { "http" }
    }
}

/// Plain HTTP listener that answers everything with one status code.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    /// Whether the fallback listener is started.
    pub enabled: bool,
    /// The socket address the fallback listener binds to.
    pub listen_address: SocketAddr,
    /// The status returned for every request.
    #[serde(deserialize_with = "deserialize_status")]
    pub status: StatusCode,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8081)),
            status: StatusCode::NOT_FOUND,
        }
    }
}

/// PEM certificate chain and private key used to terminate TLS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the TLS certificate PEM file.
    pub certificate: PathBuf,
    /// Path to the TLS private key PEM file.
    pub key: PathBuf,
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(|_| de::Error::custom(format!("invalid HTTP status code {code}")))
}
