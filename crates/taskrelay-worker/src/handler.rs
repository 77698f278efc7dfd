//! Task handler trait
//!
//! The consumer calls `handle` once per delivered task, inside the message's trace
//! scope. Handlers run concurrently on the listener's worker pool and must synchronize
//! any state they share.

use anyhow::Result;
use async_trait::async_trait;

use taskrelay_core::Task;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<()>;
}

/// Logs each task and succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTaskHandler;

#[async_trait]
impl TaskHandler for LoggingTaskHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        tracing::info!(
            task_id = %task.id,
            name = %task.name,
            description = %task.description,
            arrived_at = %task.arrived_at.to_rfc3339(),
            "Processing task"
        );
        Ok(())
    }
}
