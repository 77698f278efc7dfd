//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use taskrelay_core::{Config, TransportKind};

/// Validate critical configuration values
///
/// Hard errors come from [`Config::validate`]. Settings that are legal but ignored or
/// risky in the current environment are only warned about.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if !config.is_dev() {
        if let Some(endpoint) = config.queue_endpoint.as_deref() {
            tracing::warn!(
                endpoint = %endpoint,
                environment = %config.environment,
                "QUEUE_ENDPOINT is only honoured in dev environments - ignoring it"
            );
        }

        if config.queue_transport == TransportKind::Memory {
            tracing::warn!(
                environment = %config.environment,
                "In-memory queue transport configured outside dev - queued tasks are lost on restart"
            );
        }
    }

    if config.visibility_timeout_secs == 0 && config.queue_transport == TransportKind::Memory {
        tracing::warn!(
            "QUEUE_VISIBILITY_TIMEOUT_SECS is 0 - retained messages are redelivered immediately"
        );
    }

    tracing::info!("Configuration validation passed");
    Ok(())
}
