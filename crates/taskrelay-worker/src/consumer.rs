//! Message consumer
//!
//! Per message: Received → TraceResolved → Deserialized → Processed, with Failed
//! reachable from every step. Acknowledgement is applied afterwards by the listener
//! according to its deletion policy.
//!
//! The consumer is the tracing wrapper around a [`TaskHandler`]: it decodes the trace
//! headers, opens a child span, runs deserialization and the handler inside that span's
//! scope and finishes the span before any error is returned.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use taskrelay_core::trace::codec;
use taskrelay_core::{PipelineError, Task, TraceContext, TracePropagation, Tracer};

use crate::handler::TaskHandler;
use crate::transport::ReceivedMessage;

pub const PROCESS_SPAN_NAME: &str = "process_task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStage {
    Received,
    TraceResolved,
    Deserialized,
    Processed,
    Acknowledged,
    Failed,
}

impl Display for ConsumeStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let stage = match self {
            ConsumeStage::Received => "received",
            ConsumeStage::TraceResolved => "trace_resolved",
            ConsumeStage::Deserialized => "deserialized",
            ConsumeStage::Processed => "processed",
            ConsumeStage::Acknowledged => "acknowledged",
            ConsumeStage::Failed => "failed",
        };
        write!(f, "{}", stage)
    }
}

pub struct MessageConsumer {
    queue: String,
    tracer: Tracer,
    propagation: TracePropagation,
    handler: Arc<dyn TaskHandler>,
}

impl MessageConsumer {
    pub fn new(
        queue: impl Into<String>,
        tracer: Tracer,
        propagation: TracePropagation,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            queue: queue.into(),
            tracer,
            propagation,
            handler,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Process one delivered message. Returns the task on success.
    pub async fn consume(&self, message: &ReceivedMessage) -> Result<Task, PipelineError> {
        tracing::trace!(
            queue = %self.queue,
            message_id = %message.message_id,
            stage = %ConsumeStage::Received,
            "Message received"
        );

        let result = match self.resolve_trace(message) {
            Ok(Some(parent)) => {
                let span = codec::open_child_span(&self.tracer, parent, PROCESS_SPAN_NAME);
                span.scope(self.process(message)).await
            }
            Ok(None) => self.process(message).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                queue = %self.queue,
                message_id = %message.message_id,
                stage = %ConsumeStage::Failed,
                "Message processing failed"
            );
        }
        result
    }

    fn resolve_trace(&self, message: &ReceivedMessage) -> Result<Option<TraceContext>, PipelineError> {
        match codec::decode(message) {
            Ok(context) => {
                tracing::trace!(
                    message_id = %message.message_id,
                    trace_id = %context.trace_id_hex(),
                    stage = %ConsumeStage::TraceResolved,
                    "Trace context resolved"
                );
                Ok(Some(context))
            }
            Err(e) => match self.propagation {
                TracePropagation::Required => Err(PipelineError::Processing {
                    queue: self.queue.clone(),
                    message_id: message.message_id.clone(),
                    task_id: None,
                    source: anyhow::Error::new(e),
                }),
                TracePropagation::Optional => {
                    if codec::has_trace_headers(message) {
                        tracing::warn!(
                            error = %e,
                            queue = %self.queue,
                            message_id = %message.message_id,
                            "Ignoring incomplete trace headers"
                        );
                    }
                    Ok(None)
                }
            },
        }
    }

    async fn process(&self, message: &ReceivedMessage) -> Result<Task, PipelineError> {
        let task = Task::from_body(&message.body).map_err(|e| PipelineError::Deserialization {
            queue: self.queue.clone(),
            message_id: message.message_id.clone(),
            source: e,
        })?;
        tracing::trace!(
            message_id = %message.message_id,
            task_id = %task.id,
            stage = %ConsumeStage::Deserialized,
            "Task decoded"
        );

        self.handler
            .handle(&task)
            .await
            .map_err(|e| PipelineError::Processing {
                queue: self.queue.clone(),
                message_id: message.message_id.clone(),
                task_id: Some(task.id.clone()),
                source: e,
            })?;

        tracing::debug!(
            queue = %self.queue,
            message_id = %message.message_id,
            task_id = %task.id,
            stage = %ConsumeStage::Processed,
            "Task processed"
        );
        Ok(task)
    }
}
