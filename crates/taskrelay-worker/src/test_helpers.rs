//! Test doubles for worker unit tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskrelay_core::trace::codec;
use taskrelay_core::{HeaderMap, Headers, Task, TraceContext, Tracer};

use crate::handler::TaskHandler;
use crate::transport::{Envelope, QueueAttributes, QueueTransport, ReceivedMessage, TransportError};

pub fn message(body: &str, headers: HeaderMap) -> ReceivedMessage {
    ReceivedMessage {
        message_id: uuid::Uuid::new_v4().to_string(),
        receipt_handle: uuid::Uuid::new_v4().to_string(),
        body: body.to_string(),
        headers: Headers::snapshot(headers),
    }
}

pub fn traced_message(body: &str, trace_id: i64, span_id: i64) -> ReceivedMessage {
    message(
        body,
        codec::encode_context(&TraceContext::new(trace_id, span_id)),
    )
}

/// Records the ambient trace context seen by each call.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    tracer: Tracer,
    contexts: Arc<Mutex<Vec<Option<TraceContext>>>>,
}

impl RecordingHandler {
    pub fn contexts(&self) -> Vec<Option<TraceContext>> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn handle(&self, _task: &Task) -> Result<()> {
        self.contexts
            .lock()
            .unwrap()
            .push(self.tracer.current_context());
        Ok(())
    }
}

/// Never finishes; counts how many tasks it picked up.
#[derive(Clone, Default)]
pub struct HangingHandler {
    started: Arc<Mutex<usize>>,
}

impl HangingHandler {
    pub fn started(&self) -> usize {
        *self.started.lock().unwrap()
    }
}

#[async_trait]
impl TaskHandler for HangingHandler {
    async fn handle(&self, _task: &Task) -> Result<()> {
        *self.started.lock().unwrap() += 1;
        std::future::pending::<()>().await;
        Ok(())
    }
}

pub struct FailingHandler;

#[async_trait]
impl TaskHandler for FailingHandler {
    async fn handle(&self, task: &Task) -> Result<()> {
        Err(anyhow!("handler rejected task {}", task.id))
    }
}

/// Every operation fails.
pub struct FailingTransport;

#[async_trait]
impl QueueTransport for FailingTransport {
    async fn list_queues(&self) -> Result<Vec<String>, TransportError> {
        Err(TransportError::List("connection refused".to_string()))
    }

    async fn create_queue(
        &self,
        queue: &str,
        _attributes: QueueAttributes,
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

/// Lists no queues but reports every create as a conflict, as when another
/// instance created the queue between list and create.
#[derive(Default)]
pub struct RacingTransport;

#[async_trait]
impl QueueTransport for RacingTransport {
    async fn list_queues(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    async fn create_queue(
        &self,
        queue: &str,
        _attributes: QueueAttributes,
    ) -> Result<String, TransportError> {
        Err(TransportError::QueueExists {
            queue: queue.to_string(),
        })
    }

    async fn send(&self, queue: &str, _envelope: Envelope) -> Result<String, TransportError> {
        Err(TransportError::QueueNotFound(queue.to_string()))
    }

    async fn receive(
        &self,
        _queue: &str,
        _max_messages: i32,
        _wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        Ok(Vec::new())
    }

    async fn delete(&self, _queue: &str, _receipt_handle: &str) -> Result<(), TransportError> {
        Ok(())
    }
}
