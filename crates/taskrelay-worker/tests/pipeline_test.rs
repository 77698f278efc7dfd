//! End-to-end pipeline tests against the in-memory transport.
//!
//! Run with: `cargo test -p taskrelay-worker --test pipeline_test`

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskrelay_core::trace::RecordingSpanReporter;
use taskrelay_core::{
    DeletionPolicy, NewTask, Task, TraceContext, TracePropagation, Tracer,
};
use taskrelay_worker::{
    Acknowledgement, InMemoryTransport, MessageConsumer, QueueListener, QueueProvisioner,
    QueueTransport, TaskHandler, TaskPublisher,
};

const QUEUE: &str = "dev-task.std";

/// Remembers each task it sees and the trace context active at the time.
#[derive(Clone, Default)]
struct CapturingHandler {
    tracer: Tracer,
    seen: Arc<Mutex<Vec<(Task, Option<TraceContext>)>>>,
}

impl CapturingHandler {
    fn seen(&self) -> Vec<(Task, Option<TraceContext>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskHandler for CapturingHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((task.clone(), self.tracer.current_context()));
        Ok(())
    }
}

struct RejectingHandler;

#[async_trait]
impl TaskHandler for RejectingHandler {
    async fn handle(&self, _task: &Task) -> Result<()> {
        Err(anyhow!("downstream unavailable"))
    }
}

async fn provisioned_transport(visibility_timeout: Duration) -> InMemoryTransport {
    let transport = InMemoryTransport::new(visibility_timeout);
    QueueProvisioner::new(Arc::new(transport.clone()), true)
        .run(QUEUE)
        .await;
    transport
}

#[tokio::test]
async fn test_publish_and_consume_carries_trace() {
    let transport = provisioned_transport(Duration::from_secs(30)).await;
    let reporter = RecordingSpanReporter::new();
    let tracer = Tracer::new(Arc::new(reporter.clone()));
    let publisher = TaskPublisher::new(Arc::new(transport.clone()), tracer.clone(), QUEUE);

    let before = Utc::now();
    let request_span = tracer.next_span(TraceContext::new(42, 7), "http_request");
    let request_context = request_span.context();
    let published = request_span
        .scope(publisher.publish(NewTask::new("backup", "nightly")))
        .await
        .unwrap();

    let handler = CapturingHandler::default();
    let consumer = MessageConsumer::new(
        QUEUE,
        tracer.clone(),
        TracePropagation::Required,
        Arc::new(handler.clone()),
    );

    let messages = transport.receive(QUEUE, 10, Duration::ZERO).await.unwrap();
    assert_eq!(messages.len(), 1);
    let ack = QueueListener::handle_message(&transport, &consumer, DeletionPolicy::Always, &messages[0])
        .await
        .unwrap();
    assert_eq!(ack, Acknowledgement::Deleted);

    let seen = handler.seen();
    assert_eq!(seen.len(), 1);
    let (task, context) = &seen[0];
    assert_eq!(task.name, "backup");
    assert_eq!(task.description, "nightly");
    assert!(!task.id.is_empty());
    assert_eq!(task.id, published.id);
    assert!(task.arrived_at >= before);

    let context = context.expect("handler ran inside a span");
    assert_eq!(context.trace_id, 42);

    let consumer_span = reporter
        .records()
        .into_iter()
        .find(|r| r.name == "process_task")
        .expect("consumer span reported");
    assert_eq!(consumer_span.context.trace_id, 42);
    assert_eq!(consumer_span.parent_span_id, Some(request_context.span_id));
    assert_eq!(transport.message_count(QUEUE).await, 0);
}

#[tokio::test]
async fn test_publish_without_trace_scope_sends_nothing() {
    let transport = provisioned_transport(Duration::from_secs(30)).await;
    let publisher = TaskPublisher::new(Arc::new(transport.clone()), Tracer::default(), QUEUE);

    let err = publisher
        .publish(NewTask::new("backup", "nightly"))
        .await
        .unwrap_err();

    assert!(err.is_no_active_trace());
    assert_eq!(transport.send_calls(), 0);
    assert_eq!(transport.message_count(QUEUE).await, 0);
}

#[tokio::test]
async fn test_always_policy_removes_failed_message() {
    let transport = provisioned_transport(Duration::from_millis(20)).await;
    let tracer = Tracer::default();
    let publisher = TaskPublisher::new(Arc::new(transport.clone()), tracer.clone(), QUEUE);
    tracer
        .new_trace("request")
        .scope(publisher.publish(NewTask::new("backup", "nightly")))
        .await
        .unwrap();

    let consumer = MessageConsumer::new(QUEUE, tracer, TracePropagation::Required, Arc::new(RejectingHandler));
    let messages = transport.receive(QUEUE, 10, Duration::ZERO).await.unwrap();
    let ack = QueueListener::handle_message(&transport, &consumer, DeletionPolicy::Always, &messages[0])
        .await
        .unwrap();

    assert_eq!(ack, Acknowledgement::Deleted);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(transport
        .receive(QUEUE, 10, Duration::ZERO)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_on_success_policy_redelivers_failed_message() {
    let transport = provisioned_transport(Duration::from_millis(20)).await;
    let tracer = Tracer::default();
    let publisher = TaskPublisher::new(Arc::new(transport.clone()), tracer.clone(), QUEUE);
    let published = tracer
        .new_trace("request")
        .scope(publisher.publish(NewTask::new("backup", "nightly")))
        .await
        .unwrap();

    let consumer = MessageConsumer::new(QUEUE, tracer, TracePropagation::Required, Arc::new(RejectingHandler));
    let messages = transport.receive(QUEUE, 10, Duration::ZERO).await.unwrap();
    let ack = QueueListener::handle_message(&transport, &consumer, DeletionPolicy::OnSuccess, &messages[0])
        .await
        .unwrap();
    assert_eq!(ack, Acknowledgement::Retained);

    tokio::time::sleep(Duration::from_millis(40)).await;
    let redelivered = transport.receive(QUEUE, 10, Duration::ZERO).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(Task::from_body(&redelivered[0].body).unwrap().id, published.id);
}

#[tokio::test]
async fn test_on_success_policy_deletes_processed_message() {
    let transport = provisioned_transport(Duration::from_millis(20)).await;
    let tracer = Tracer::default();
    let publisher = TaskPublisher::new(Arc::new(transport.clone()), tracer.clone(), QUEUE);
    tracer
        .new_trace("request")
        .scope(publisher.publish(NewTask::new("backup", "nightly")))
        .await
        .unwrap();

    let consumer = MessageConsumer::new(
        QUEUE,
        tracer,
        TracePropagation::Required,
        Arc::new(CapturingHandler::default()),
    );
    let messages = transport.receive(QUEUE, 10, Duration::ZERO).await.unwrap();
    let ack = QueueListener::handle_message(&transport, &consumer, DeletionPolicy::OnSuccess, &messages[0])
        .await
        .unwrap();

    assert_eq!(ack, Acknowledgement::Deleted);
    assert_eq!(transport.message_count(QUEUE).await, 0);
}

#[tokio::test]
async fn test_provisioning_twice_creates_once() {
    let transport = InMemoryTransport::default();
    let provisioner = QueueProvisioner::new(Arc::new(transport.clone()), true);

    provisioner.ensure_queue_exists(QUEUE).await.unwrap();
    provisioner.ensure_queue_exists(QUEUE).await.unwrap();

    assert!(transport.create_calls() <= 1);
    let queues = transport.list_queues().await.unwrap();
    assert_eq!(queues.iter().filter(|q| q.ends_with(QUEUE)).count(), 1);
}
