//! Task publisher
//!
//! Completes a client-supplied task with its server-generated identity, serializes it
//! and sends it to the queue together with the trace headers of the caller's scope.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use taskrelay_core::trace::codec;
use taskrelay_core::{Headers, NewTask, PipelineError, Task, TraceContext, TraceError, Tracer};

use crate::converter;
use crate::transport::QueueTransport;

#[derive(Clone)]
pub struct TaskPublisher {
    transport: Arc<dyn QueueTransport>,
    tracer: Tracer,
    queue: String,
}

impl TaskPublisher {
    pub fn new(transport: Arc<dyn QueueTransport>, tracer: Tracer, queue: impl Into<String>) -> Self {
        Self {
            transport,
            tracer,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Publish to the default queue under the ambient trace scope.
    ///
    /// Fails with a `NoActiveTrace` error, without sending anything, when no span is in scope.
    pub async fn publish(&self, task: NewTask) -> Result<Task, PipelineError> {
        let context = self
            .tracer
            .current_context()
            .ok_or_else(|| PipelineError::Trace {
                queue: self.queue.clone(),
                source: TraceError::NoActiveTrace,
            })?;

        self.publish_to(&self.queue, task, Some(context), None).await
    }

    /// Publish to `queue`, attaching trace headers only when `trace` is given.
    ///
    /// `headers` is the caller's header accessor, if it holds one; see [`converter::to_envelope`].
    #[tracing::instrument(skip(self, task, headers), fields(task_name = %task.name))]
    pub async fn publish_to(
        &self,
        queue: &str,
        task: NewTask,
        trace: Option<TraceContext>,
        headers: Option<Headers>,
    ) -> Result<Task, PipelineError> {
        let task = task.complete(Uuid::new_v4().to_string(), Utc::now());

        let mut envelope = converter::to_envelope(&task, queue, headers)?;
        if let Some(context) = trace {
            envelope.headers.extend(codec::encode_context(&context));
        }

        let message_id = self
            .transport
            .send(queue, envelope)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    queue = %queue,
                    task_id = %task.id,
                    "Failed to send task to queue"
                );
                PipelineError::Transport {
                    queue: queue.to_string(),
                    source: Box::new(e),
                }
            })?;

        tracing::info!(
            queue = %queue,
            task_id = %task.id,
            message_id = %message_id,
            trace_id = ?trace.map(|c| c.trace_id_hex()),
            "Task published"
        );

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InMemoryTransport;
    use std::time::Duration;
    use taskrelay_core::trace::{SPAN_ID_HEADER, TRACE_ID_HEADER};

    async fn setup() -> (TaskPublisher, InMemoryTransport, Tracer) {
        let transport = InMemoryTransport::with_queue("tasks", Duration::from_secs(30)).await;
        let tracer = Tracer::default();
        let publisher = TaskPublisher::new(Arc::new(transport.clone()), tracer.clone(), "tasks");
        (publisher, transport, tracer)
    }

    #[tokio::test]
    async fn publish_assigns_identity_and_keeps_fields() {
        let (publisher, transport, tracer) = setup().await;
        let before = Utc::now();

        let span = tracer.new_trace("request");
        let task = span
            .scope(publisher.publish(NewTask::new("backup", "nightly")))
            .await
            .unwrap();

        assert!(!task.id.is_empty());
        assert!(task.arrived_at >= before);

        let bodies = transport.bodies("tasks").await;
        assert_eq!(bodies.len(), 1);
        let decoded = Task::from_body(&bodies[0]).unwrap();
        assert_eq!(decoded, task);
        assert_eq!(decoded.name, "backup");
        assert_eq!(decoded.description, "nightly");
    }

    #[tokio::test]
    async fn ids_are_unique_per_publish() {
        let (publisher, _, _) = setup().await;
        let first = publisher
            .publish_to("tasks", NewTask::new("a", "b"), None, None)
            .await
            .unwrap();
        let second = publisher
            .publish_to("tasks", NewTask::new("a", "b"), None, None)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn publish_without_scope_sends_nothing() {
        let (publisher, transport, _) = setup().await;
        let err = publisher
            .publish(NewTask::new("backup", "nightly"))
            .await
            .unwrap_err();

        assert!(err.is_no_active_trace());
        assert_eq!(err.queue(), "tasks");
        assert_eq!(transport.send_calls(), 0);
    }

    #[tokio::test]
    async fn trace_headers_attached_when_context_given() {
        let (publisher, transport, _) = setup().await;
        publisher
            .publish_to(
                "tasks",
                NewTask::new("backup", "nightly"),
                Some(TraceContext::new(42, 7)),
                None,
            )
            .await
            .unwrap();

        let received = transport
            .receive("tasks", 1, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(received[0].headers.get_i64(TRACE_ID_HEADER), Some(42));
        assert_eq!(received[0].headers.get_i64(SPAN_ID_HEADER), Some(7));
    }

    #[tokio::test]
    async fn stale_trace_headers_are_not_forwarded() {
        let (publisher, transport, _) = setup().await;
        let mut accessor = Headers::new();
        accessor.insert(TRACE_ID_HEADER, 1i64).unwrap();
        accessor.insert(SPAN_ID_HEADER, 2i64).unwrap();

        publisher
            .publish_to("tasks", NewTask::new("backup", "nightly"), None, Some(accessor))
            .await
            .unwrap();

        let received = transport
            .receive("tasks", 1, Duration::ZERO)
            .await
            .unwrap();
        assert!(!received[0].headers.contains_key(TRACE_ID_HEADER));
        assert!(!received[0].headers.contains_key(SPAN_ID_HEADER));
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped_with_queue() {
        let (publisher, _, _) = setup().await;
        let err = publisher
            .publish_to("missing", NewTask::new("a", "b"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transport { .. }));
        assert_eq!(err.queue(), "missing");
    }
}
