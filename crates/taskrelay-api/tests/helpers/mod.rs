//! Test helpers: wire the application around an in-memory transport.
//!
//! Run from workspace root: `cargo test -p taskrelay-api`.

use anyhow::Result;
use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskrelay_api::{build_app, App};
use taskrelay_core::trace::RecordingSpanReporter;
use taskrelay_core::{Config, Task, TraceContext, Tracer, TransportKind};
use taskrelay_worker::{
    Envelope, InMemoryTransport, QueueTransport, ReceivedMessage, TaskHandler, TransportError,
};

pub const QUEUE: &str = "dev-task.std";

/// Remembers each task it sees and the trace context active at the time.
#[derive(Clone, Default)]
pub struct CapturingHandler {
    tracer: Tracer,
    seen: Arc<Mutex<Vec<(Task, Option<TraceContext>)>>>,
}

impl CapturingHandler {
    pub fn seen(&self) -> Vec<(Task, Option<TraceContext>)> {
        self.seen.lock().unwrap().clone()
    }

    /// Poll until `count` tasks were handled or about two seconds pass.
    pub async fn wait_for(&self, count: usize) -> Vec<(Task, Option<TraceContext>)> {
        for _ in 0..200 {
            let seen = self.seen();
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.seen()
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

/// Every queue operation fails as if the broker were down.
pub struct UnreachableTransport;

#[async_trait]
impl QueueTransport for UnreachableTransport {
    async fn list_queues(&self) -> Result<Vec<String>, TransportError> {
        Err(TransportError::List("connection refused".to_string()))
    }

    async fn create_queue(
        &self,
        queue: &str,
        _attributes: taskrelay_worker::transport::QueueAttributes,
    ) -> Result<String, TransportError> {
        Err(TransportError::Create {
            queue: queue.to_string(),
            message: "connection refused".to_string(),
        })
    }

    async fn send(&self, queue: &str, _envelope: Envelope) -> Result<String, TransportError> {
        Err(TransportError::Send {
            queue: queue.to_string(),
            message: "connection refused".to_string(),
        })
    }

    async fn receive(
        &self,
        queue: &str,
        _max_messages: i32,
        _wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        Err(TransportError::Receive {
            queue: queue.to_string(),
            message: "connection refused".to_string(),
        })
    }

    async fn delete(&self, queue: &str, _receipt_handle: &str) -> Result<(), TransportError> {
        Err(TransportError::Delete {
            queue: queue.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub transport: InMemoryTransport,
    pub handler: CapturingHandler,
    pub reporter: RecordingSpanReporter,
    pub app: App,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn create_test_config() -> Config {
    Config {
        queue_name: QUEUE.to_string(),
        queue_transport: TransportKind::Memory,
        wait_time_seconds: 1,
        ..Config::default()
    }
}

pub async fn setup_test_app() -> TestApp {
    let transport = InMemoryTransport::new(Duration::from_secs(30));
    let reporter = RecordingSpanReporter::new();
    let tracer = Tracer::new(Arc::new(reporter.clone()));
    let handler = CapturingHandler::default();

    let app = build_app(
        create_test_config(),
        Arc::new(transport.clone()),
        tracer,
        Arc::new(handler.clone()),
    )
    .await
    .expect("Failed to build app");
    let server = TestServer::new(app.router.clone()).expect("Failed to create test server");

    TestApp {
        server,
        transport,
        handler,
        reporter,
        app,
    }
}

pub async fn setup_unreachable_app() -> (TestServer, App) {
    let app = build_app(
        create_test_config(),
        Arc::new(UnreachableTransport),
        Tracer::default(),
        Arc::new(CapturingHandler::default()),
    )
    .await
    .expect("Failed to build app");
    let server = TestServer::new(app.router.clone()).expect("Failed to create test server");
    (server, app)
}
