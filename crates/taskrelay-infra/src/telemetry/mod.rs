//! Telemetry initialization
//!
//! Installs the global `tracing` subscriber. With the `observability-opentelemetry`
//! feature and `OTEL_ENABLED=true`, spans and metrics are also exported over OTLP.

#[cfg(feature = "observability-opentelemetry")]
mod init_opentelemetry;

#[cfg(not(feature = "observability-opentelemetry"))]
mod init_basic;

#[cfg(feature = "observability-opentelemetry")]
pub use init_opentelemetry::{init_telemetry, shutdown_telemetry};

#[cfg(not(feature = "observability-opentelemetry"))]
pub use init_basic::{init_telemetry, shutdown_telemetry};

use std::env;
use tracing_subscriber::EnvFilter;

use taskrelay_core::Config;

const DEFAULT_FILTER: &str = "taskrelay=debug,tower_http=debug";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub service_name: String,
    pub service_version: String,
    /// `grpc` or `http`
    pub protocol: String,
    pub environment: String,
    pub sampler: String,
    pub sample_ratio: f64,
    pub metrics_interval_secs: u64,
    pub instance_id: String,
}

impl From<&Config> for TelemetryConfig {
    fn from(config: &Config) -> Self {
        Self {
            enabled: config.otel_enabled,
            endpoint: config.otel_endpoint().map(str::to_string),
            service_name: config.otel_service_name.clone(),
            service_version: config.otel_service_version.clone(),
            protocol: config.otel_protocol.clone(),
            environment: config.environment.clone(),
            sampler: config.otel_sampler.clone(),
            sample_ratio: config.otel_sample_ratio,
            metrics_interval_secs: config.otel_metrics_interval_secs,
            instance_id: env::var("OTEL_SERVICE_INSTANCE_ID")
                .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
