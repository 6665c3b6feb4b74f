//! Metrics initialization and management

mod names;
mod recorder;

pub use names::*;
pub use recorder::Recorder;

use anyhow::Context;
use config::{OtlpExporterConfig, OtlpProtocol, TelemetryConfig};
use opentelemetry::{Key, KeyValue, Value, metrics::Meter};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};

const METER_NAME: &str = "tollgate";

/// Get the global meter for recording metrics
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Initialize the metrics subsystem
pub(crate) async fn init_metrics(config: &TelemetryConfig) -> anyhow::Result<SdkMeterProvider> {
    let meter_provider = match config.metrics_otlp_config() {
        Some(exporter_config) => create_otlp_meter_provider(config, exporter_config)?,
        None => {
            log::debug!("No metrics exporters configured or enabled, metrics will not be exported");
            SdkMeterProvider::builder().build()
        }
    };

    opentelemetry::global::set_meter_provider(meter_provider.clone());

    log::info!(
        "Telemetry metrics initialized for service '{}'",
        config.service_name().unwrap_or(METER_NAME)
    );

    Ok(meter_provider)
}

fn create_otlp_meter_provider(
    telemetry_config: &TelemetryConfig,
    exporter_config: &OtlpExporterConfig,
) -> anyhow::Result<SdkMeterProvider> {
    log::debug!(
        "Initializing OTLP metrics exporter to {} via {:?}",
        exporter_config.endpoint,
        exporter_config.protocol
    );

    let mut builder = Resource::builder().with_service_name(
        telemetry_config
            .service_name()
            .unwrap_or(METER_NAME)
            .to_string(),
    );

    for (key, value) in telemetry_config.resource_attributes() {
        builder = builder.with_attribute(KeyValue::new(Key::from(key.clone()), Value::from(value.clone())));
    }

    let exporter = match exporter_config.protocol {
        OtlpProtocol::Grpc => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(exporter_config.endpoint.as_str())
            .with_timeout(exporter_config.timeout)
            .build()
            .context("Failed to create gRPC OTLP metric exporter")?,
        OtlpProtocol::Http => MetricExporter::builder()
            .with_http()
            .with_endpoint(exporter_config.endpoint.as_str())
            .with_timeout(exporter_config.timeout)
            .build()
            .context("Failed to create HTTP OTLP metric exporter")?,
    };

    let reader = PeriodicReader::builder(exporter)
        .with_interval(exporter_config.batch_export.scheduled_delay)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(builder.build())
        .with_reader(reader)
        .build();

    log::info!(
        "OTLP metrics exporter initialized to {} via {:?}",
        exporter_config.endpoint,
        exporter_config.protocol
    );

    Ok(provider)
}
