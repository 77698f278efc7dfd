//! Queue provisioning
//!
//! Ensures the task queue exists before the publisher or the listener first use it.
//! Runs once at startup and only in dev environments; elsewhere the queue is owned by
//! external infrastructure.
//!
//! Two instances starting at the same time can both see the queue as absent and both
//! issue a create. The second create either succeeds as a no-op or reports that the
//! queue already exists, and both outcomes count as success here.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::transport::{QueueAttributes, QueueTransport, TransportError, CONTENT_BASED_DEDUPLICATION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A listed queue identifier already ends with the queue name.
    Exists,
    Created { url: String },
    /// Provisioning is disabled for this environment.
    Skipped,
    /// Listing or creating failed; startup continues regardless.
    Failed { reason: String },
}

impl Display for ProvisionOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProvisionOutcome::Exists => write!(f, "exists"),
            ProvisionOutcome::Created { .. } => write!(f, "created"),
            ProvisionOutcome::Skipped => write!(f, "skipped"),
            ProvisionOutcome::Failed { .. } => write!(f, "failed"),
        }
    }
}

pub struct QueueProvisioner {
    transport: Arc<dyn QueueTransport>,
    enabled: bool,
}

impl QueueProvisioner {
    pub fn new(transport: Arc<dyn QueueTransport>, enabled: bool) -> Self {
        Self { transport, enabled }
    }

    /// Attributes every provisioned queue is created with.
    pub fn queue_attributes() -> QueueAttributes {
        let mut attributes = QueueAttributes::new();
        attributes.insert(CONTENT_BASED_DEDUPLICATION.to_string(), "true".to_string());
        attributes
    }

    /// List queues and create `queue` when no listed identifier ends with its name.
    pub async fn ensure_queue_exists(&self, queue: &str) -> Result<ProvisionOutcome, TransportError> {
        let existing = self.transport.list_queues().await?;
        if existing.iter().any(|url| url.ends_with(queue)) {
            tracing::debug!(queue = %queue, "Queue already exists");
            return Ok(ProvisionOutcome::Exists);
        }

        tracing::info!(queue = %queue, "Queue not found, creating");
        match self
            .transport
            .create_queue(queue, Self::queue_attributes())
            .await
        {
            Ok(url) => Ok(ProvisionOutcome::Created { url }),
            Err(TransportError::QueueExists { .. }) => {
                tracing::info!(queue = %queue, "Queue was created concurrently by another instance");
                Ok(ProvisionOutcome::Exists)
            }
            Err(e) => Err(e),
        }
    }

    /// Startup entry point. Never fails: errors are logged and startup continues.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, queue: &str) -> ProvisionOutcome {
        if !self.enabled {
            tracing::debug!(queue = %queue, "Queue provisioning disabled for this environment");
            return ProvisionOutcome::Skipped;
        }

        match self.ensure_queue_exists(queue).await {
            Ok(outcome) => {
                if let ProvisionOutcome::Created { url } = &outcome {
                    tracing::info!(queue = %queue, url = %url, "Queue created");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    queue = %queue,
                    "Queue provisioning failed, assuming the queue is provisioned externally"
                );
                ProvisionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
