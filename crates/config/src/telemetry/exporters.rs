//! Exporter configuration for telemetry data.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

/// Exporters configuration for telemetry
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExportersConfig {
    /// OTLP exporter configuration
    pub otlp: OtlpExporterConfig,
}

impl ExportersConfig {
    /// Get the OTLP exporter configuration
    pub fn otlp(&self) -> &OtlpExporterConfig {
        &self.otlp
    }
}

/// OTLP exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpExporterConfig {
    /// Whether this exporter is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    /// Protocol to use (grpc or http)
    #[serde(default)]
    pub protocol: OtlpProtocol,

    /// Request timeout
    #[serde(deserialize_with = "deserialize_duration", default = "default_timeout")]
    pub timeout: Duration,

    /// Batch export configuration
    #[serde(default)]
    pub batch_export: BatchExportConfig,
}

impl Default for OtlpExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            protocol: OtlpProtocol::default(),
            timeout: default_timeout(),
            batch_export: BatchExportConfig::default(),
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse("http://localhost:4317").expect("default URL should be valid")
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// OTLP protocol selection
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    /// gRPC protocol (default)
    #[default]
    Grpc,
    /// HTTP/protobuf protocol
    Http,
}

/// Batch export configuration for OTLP
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchExportConfig {
    /// Delay between batch exports
    #[serde(deserialize_with = "deserialize_duration")]
    pub scheduled_delay: Duration,
}

impl Default for BatchExportConfig {
    fn default() -> Self {
        Self {
            scheduled_delay: Duration::from_secs(5),
        }
    }
}
