//! Queue transport setup

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use taskrelay_core::{Config, TransportKind};
use taskrelay_worker::{InMemoryTransport, QueueTransport};

/// Build the queue transport selected by `QUEUE_TRANSPORT`.
pub async fn setup_transport(config: &Config) -> Result<Arc<dyn QueueTransport>> {
    match config.queue_transport {
        TransportKind::Sqs => setup_sqs(config).await,
        TransportKind::Memory => {
            tracing::info!(
                visibility_timeout_secs = config.visibility_timeout_secs,
                "Using in-memory queue transport"
            );
            Ok(Arc::new(InMemoryTransport::new(Duration::from_secs(
                config.visibility_timeout_secs,
            ))))
        }
    }
}

#[cfg(feature = "transport-sqs")]
async fn setup_sqs(config: &Config) -> Result<Arc<dyn QueueTransport>> {
    let endpoint = config.effective_queue_endpoint();
    tracing::info!(
        region = %config.aws_region,
        endpoint = ?endpoint,
        "Using SQS queue transport"
    );
    let transport =
        taskrelay_worker::SqsTransport::new(&config.aws_region, endpoint).await;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "transport-sqs"))]
async fn setup_sqs(_config: &Config) -> Result<Arc<dyn QueueTransport>> {
    Err(anyhow::anyhow!(
        "QUEUE_TRANSPORT=sqs requires the transport-sqs feature"
    ))
}
