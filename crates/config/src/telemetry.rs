//! Telemetry configuration.

use std::collections::BTreeMap;

use serde::Deserialize;

pub mod exporters;

pub use self::exporters::{BatchExportConfig, ExportersConfig, OtlpExporterConfig, OtlpProtocol};

/// Telemetry configuration for observability
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name for telemetry identification
    service_name: Option<String>,

    /// Custom resource attributes to attach to all telemetry
    resource_attributes: BTreeMap<String, String>,

    /// Exporters configuration
    exporters: ExportersConfig,
}

impl TelemetryConfig {
    /// Get the service name
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Get the resource attributes
    pub fn resource_attributes(&self) -> &BTreeMap<String, String> {
        &self.resource_attributes
    }

    /// The OTLP exporter for metrics, if it is enabled.
    pub fn metrics_otlp_config(&self) -> Option<&OtlpExporterConfig> {
        let otlp = self.exporters.otlp();
        otlp.enabled.then_some(otlp)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::TelemetryConfig;

    #[test]
    fn otlp_disabled_by_default() {
        let config: TelemetryConfig = toml::from_str("").unwrap();

        assert!(config.service_name().is_none());
        assert!(config.metrics_otlp_config().is_none());
    }

    #[test]
    fn otlp_http_exporter() {
        let config = indoc! {r#"
            service_name = "edge-gateway"

            [resource_attributes]
            "deployment.environment" = "staging"

            [exporters.otlp]
            enabled = true
            endpoint = "http://collector:4318"
            protocol = "http"
            timeout = "10s"

            [exporters.otlp.batch_export]
            scheduled_delay = "1s"
        "#};

        let config: TelemetryConfig = toml::from_str(config).unwrap();

        assert_eq!(config.service_name(), Some("edge-gateway"));
        assert_eq!(
            config.resource_attributes().get("deployment.environment").map(String::as_str),
            Some("staging")
        );

        insta::assert_debug_snapshot!(config.metrics_otlp_config(), @r#"
        Some(
            OtlpExporterConfig {
                enabled: true,
                endpoint: Url {
                    scheme: "http",
                    cannot_be_a_base: false,
                    username: "",
                    password: None,
                    host: Some(
                        Domain(
                            "collector",
                        ),
                    ),
                    port: Some(
                        4318,
                    ),
                    path: "/",
                    query: None,
                    fragment: None,
                },
                protocol: Http,
                timeout: 10s,
                batch_export: BatchExportConfig {
                    scheduled_delay: 1s,
                },
            },
        )
        "#);
    }
}
