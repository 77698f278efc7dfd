use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::{env_filter, host_name, TelemetryConfig};

/// Initialize basic tracing (without OpenTelemetry)
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    if config.enabled {
        tracing::warn!("OTEL_ENABLED is set but the OpenTelemetry feature is not compiled in");
    }
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        hostname = %host_name(),
        instance_id = %config.instance_id,
        "Tracing initialized without OpenTelemetry export"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown (OpenTelemetry feature not enabled)");
}
