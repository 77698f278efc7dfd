use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{self as sdkmetrics, PeriodicReader},
    trace::{self as sdktrace, BatchConfig, BatchSpanProcessor, RandomIdGenerator, Sampler},
    Resource,
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::{env_filter, host_name, TelemetryConfig};

fn sampler(config: &TelemetryConfig) -> Sampler {
    match config.sampler.as_str() {
        "always_off" => Sampler::AlwaysOff,
        "trace_id_ratio" => {
            let ratio = config.sample_ratio.clamp(0.0, 1.0);
            if ratio <= 0.0 {
                tracing::warn!("OTEL_SAMPLE_RATIO is 0.0 or negative, using AlwaysOff sampler");
                Sampler::AlwaysOff
            } else if ratio >= 1.0 {
                Sampler::AlwaysOn
            } else {
                Sampler::TraceIdRatioBased(ratio)
            }
        }
        // Consumer spans follow the sampling decision of their remote parent.
        "parent_based" => Sampler::ParentBased(Box::new(Sampler::AlwaysOn)),
        other => {
            if other != "always_on" {
                tracing::warn!(sampler = %other, "Unknown sampler type, defaulting to AlwaysOn");
            }
            Sampler::AlwaysOn
        }
    }
}

/// Initialize tracing with OTLP span and metric export.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let endpoint = match (&config.endpoint, config.enabled) {
        (Some(endpoint), true) => endpoint.clone(),
        _ => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
            tracing::info!("OpenTelemetry disabled, using standard tracing");
            return Ok(());
        }
    };

    let hostname = host_name();
    let resource = Resource::new(vec![
        KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
        KeyValue::new("host.name", hostname.clone()),
        KeyValue::new("service.instance.id", config.instance_id.clone()),
    ]);

    let span_exporter = if config.protocol == "http" {
        opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(&endpoint)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP span exporter: {}", e))?
    } else {
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build gRPC span exporter: {}", e))?
    };

    let batch_processor =
        BatchSpanProcessor::builder(span_exporter, opentelemetry_sdk::runtime::Tokio)
            .with_batch_config(BatchConfig::default())
            .build();

    let tracer_provider = sdktrace::TracerProvider::builder()
        .with_span_processor(batch_processor)
        .with_sampler(sampler(config))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource.clone())
        .build();

    let tracer = tracer_provider.tracer(config.service_name.clone());
    opentelemetry::global::set_tracer_provider(tracer_provider);

    let metric_exporter = if config.protocol == "http" {
        opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_endpoint(&endpoint)
            .with_temporality(sdkmetrics::Temporality::Cumulative)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP metric exporter: {}", e))?
    } else {
        opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .with_temporality(sdkmetrics::Temporality::Cumulative)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build gRPC metric exporter: {}", e))?
    };

    let reader = PeriodicReader::builder(metric_exporter, opentelemetry_sdk::runtime::Tokio)
        .with_interval(Duration::from_secs(config.metrics_interval_secs))
        .build();

    let meter_provider = sdkmetrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();
    opentelemetry::global::set_meter_provider(meter_provider);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    tracing::info!(
        endpoint = %endpoint,
        protocol = %config.protocol,
        environment = %config.environment,
        sampler = %config.sampler,
        sample_ratio = config.sample_ratio,
        metrics_interval_secs = config.metrics_interval_secs,
        hostname = %hostname,
        instance_id = %config.instance_id,
        "OpenTelemetry initialized"
    );

    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::info!("Shutting down OpenTelemetry...");
    opentelemetry::global::shutdown_tracer_provider();
    tracing::info!("OpenTelemetry shutdown complete");
}
