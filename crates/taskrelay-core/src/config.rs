//! Configuration module
//!
//! Environment-driven configuration for the HTTP boundary, the queue transport,
//! the listener and telemetry. Loaded once at startup.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::models::{DeletionPolicy, TracePropagation};

// Common constants
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_QUEUE_NAME: &str = "dev-task.std";
const DEFAULT_REGION: &str = "ap-southeast-1";
const DEFAULT_MAX_WORKERS: usize = 10;
const DEFAULT_MAX_MESSAGES: i32 = 10;
const DEFAULT_WAIT_TIME_SECONDS: i32 = 20;
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 30;
const SQS_MAX_MESSAGES: i32 = 10;
const SQS_MAX_WAIT_TIME_SECONDS: i32 = 20;

/// Environment names that enable dev-only behaviour (endpoint override, queue auto-creation).
const DEV_ENVIRONMENTS: &[&str] = &["dev", "local", "development"];

/// Which queue transport the process talks to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    Sqs,
    /// In-process queue; messages do not survive a restart.
    Memory,
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransportKind::Sqs => write!(f, "sqs"),
            TransportKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqs" => Ok(TransportKind::Sqs),
            "memory" | "in-memory" => Ok(TransportKind::Memory),
            _ => Err(anyhow::anyhow!("Invalid queue transport: {}", s)),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    // Queue configuration
    pub queue_name: String,
    pub queue_endpoint: Option<String>, // Custom endpoint for LocalStack/ElasticMQ in dev
    pub queue_transport: TransportKind,
    pub aws_region: String,
    // Listener configuration
    pub deletion_policy: DeletionPolicy,
    pub trace_propagation: TracePropagation,
    pub max_workers: usize,
    pub max_messages: i32,
    pub wait_time_seconds: i32,
    pub visibility_timeout_secs: u64,
    // OpenTelemetry configuration
    pub otel_enabled: bool,
    pub otel_endpoint: String,
    pub otel_service_name: String,
    pub otel_service_version: String,
    pub otel_protocol: String,
    pub otel_sampler: String,
    pub otel_sample_ratio: f64,
    pub otel_metrics_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            environment: "dev".to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            queue_endpoint: None,
            queue_transport: TransportKind::default(),
            aws_region: DEFAULT_REGION.to_string(),
            deletion_policy: DeletionPolicy::default(),
            trace_propagation: TracePropagation::default(),
            max_workers: DEFAULT_MAX_WORKERS,
            max_messages: DEFAULT_MAX_MESSAGES,
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
            otel_enabled: false,
            otel_endpoint: String::new(),
            otel_service_name: "taskrelay".to_string(),
            otel_service_version: env!("CARGO_PKG_VERSION").to_string(),
            otel_protocol: "grpc".to_string(),
            otel_sampler: "always_on".to_string(),
            otel_sample_ratio: 1.0,
            otel_metrics_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // A missing .env file is fine; real deployments set variables directly.
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let config = Config {
            server_port: parse_var("PORT")?.unwrap_or(defaults.server_port),
            environment,
            queue_name: env::var("QUEUE_TASK").unwrap_or(defaults.queue_name),
            queue_endpoint: env::var("QUEUE_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            queue_transport: parse_var("QUEUE_TRANSPORT")?.unwrap_or(defaults.queue_transport),
            aws_region: env::var("AWS_REGION").unwrap_or(defaults.aws_region),
            deletion_policy: parse_var("QUEUE_DELETION_POLICY")?
                .unwrap_or(defaults.deletion_policy),
            trace_propagation: parse_var("TRACE_PROPAGATION")?
                .unwrap_or(defaults.trace_propagation),
            max_workers: parse_var("QUEUE_MAX_WORKERS")?.unwrap_or(defaults.max_workers),
            max_messages: parse_var("QUEUE_MAX_MESSAGES")?.unwrap_or(defaults.max_messages),
            wait_time_seconds: parse_var("QUEUE_WAIT_TIME_SECONDS")?
                .unwrap_or(defaults.wait_time_seconds),
            visibility_timeout_secs: parse_var("QUEUE_VISIBILITY_TIMEOUT_SECS")?
                .unwrap_or(defaults.visibility_timeout_secs),
            otel_enabled: env::var("OTEL_ENABLED")
                .ok()
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.otel_enabled),
            otel_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or(defaults.otel_endpoint),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or(defaults.otel_service_name),
            otel_service_version: env::var("OTEL_SERVICE_VERSION")
                .unwrap_or(defaults.otel_service_version),
            otel_protocol: env::var("OTEL_EXPORTER_OTLP_PROTOCOL")
                .unwrap_or(defaults.otel_protocol),
            otel_sampler: env::var("OTEL_SAMPLER").unwrap_or(defaults.otel_sampler),
            otel_sample_ratio: parse_var("OTEL_SAMPLE_RATIO")?
                .unwrap_or(defaults.otel_sample_ratio),
            otel_metrics_interval_secs: parse_var("OTEL_METRICS_INTERVAL_SECS")?
                .unwrap_or(defaults.otel_metrics_interval_secs),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.queue_name.trim().is_empty() {
            return Err(anyhow::anyhow!("QUEUE_TASK cannot be empty"));
        }

        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("QUEUE_MAX_WORKERS cannot be 0"));
        }

        if !(1..=SQS_MAX_MESSAGES).contains(&self.max_messages) {
            return Err(anyhow::anyhow!(
                "QUEUE_MAX_MESSAGES must be between 1 and {}, got {}",
                SQS_MAX_MESSAGES,
                self.max_messages
            ));
        }

        if !(0..=SQS_MAX_WAIT_TIME_SECONDS).contains(&self.wait_time_seconds) {
            return Err(anyhow::anyhow!(
                "QUEUE_WAIT_TIME_SECONDS must be between 0 and {}, got {}",
                SQS_MAX_WAIT_TIME_SECONDS,
                self.wait_time_seconds
            ));
        }

        if self.otel_enabled && self.otel_endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "OTEL_ENABLED is true but OTEL_EXPORTER_OTLP_ENDPOINT is not set"
            ));
        }

        Ok(())
    }

    /// Check if the application runs in a local/dev environment
    pub fn is_dev(&self) -> bool {
        let environment = self.environment.to_lowercase();
        DEV_ENVIRONMENTS.contains(&environment.as_str())
    }

    /// Endpoint override for the queue transport. Only honoured in dev.
    pub fn effective_queue_endpoint(&self) -> Option<&str> {
        if self.is_dev() {
            self.queue_endpoint.as_deref()
        } else {
            None
        }
    }

    /// Whether the task queue should be created at startup if it is missing.
    pub fn auto_create_queue(&self) -> bool {
        self.is_dev()
    }

    pub fn otel_endpoint(&self) -> Option<&str> {
        if self.otel_endpoint.is_empty() {
            None
        } else {
            Some(&self.otel_endpoint)
        }
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>, anyhow::Error>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(None),
    }
}
