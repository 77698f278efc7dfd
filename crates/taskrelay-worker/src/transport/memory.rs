//! In-process queue transport
//!
//! Mirrors the SQS delivery model closely enough for local runs and tests: a received
//! message stays on the queue but is invisible for the visibility timeout, and becomes
//! deliverable again unless it is deleted with its current receipt handle.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use taskrelay_core::{HeaderMap, Headers};

use super::{Envelope, QueueAttributes, QueueTransport, ReceivedMessage, TransportError};

const URL_PREFIX: &str = "memory://taskrelay/";

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    headers: Arc<HeaderMap>,
    receipt_handle: Option<String>,
    invisible_until: Option<Instant>,
    receive_count: u32,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    attributes: QueueAttributes,
    messages: VecDeque<StoredMessage>,
}

#[derive(Debug, Default)]
struct Counters {
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    send_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// In-memory transport. Clones share the same queues.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
    arrivals: Arc<Notify>,
    counters: Arc<Counters>,
    visibility_timeout: Duration,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl InMemoryTransport {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            arrivals: Arc::new(Notify::new()),
            counters: Arc::new(Counters::default()),
            visibility_timeout,
        }
    }

    /// Transport with `queue` already present.
    pub async fn with_queue(queue: &str, visibility_timeout: Duration) -> Self {
        let transport = Self::new(visibility_timeout);
        transport
            .queues
            .lock()
            .await
            .insert(queue.to_string(), QueueState::default());
        transport
    }

    pub fn queue_url(queue: &str) -> String {
        format!("{}{}", URL_PREFIX, queue)
    }

    /// Messages still on the queue, visible or in flight.
    pub async fn message_count(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |state| state.messages.len())
    }

    /// Bodies of messages still on the queue, in arrival order.
    pub async fn bodies(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|state| state.messages.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn queue_attributes(&self, queue: &str) -> Option<QueueAttributes> {
        self.queues
            .lock()
            .await
            .get(queue)
            .map(|state| state.attributes.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.counters.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.counters.create_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.counters.send_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete_calls.load(Ordering::SeqCst)
    }

    async fn take_visible(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let now = Instant::now();
        let mut received = Vec::new();
        for stored in state.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if !stored.is_visible(now) {
                continue;
            }
            let receipt_handle = Uuid::new_v4().to_string();
            stored.receipt_handle = Some(receipt_handle.clone());
            stored.invisible_until = Some(now + self.visibility_timeout);
            stored.receive_count += 1;
            tracing::trace!(
                queue = %queue,
                message_id = %stored.message_id,
                receive_count = stored.receive_count,
                "Message received from in-memory queue"
            );
            received.push(ReceivedMessage {
                message_id: stored.message_id.clone(),
                receipt_handle,
                body: stored.body.clone(),
                headers: Headers::Snapshot(stored.headers.clone()),
            });
        }
        Ok(received)
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn list_queues(&self) -> Result<Vec<String>, TransportError> {
        self.counters.list_calls.fetch_add(1, Ordering::SeqCst);
        let queues = self.queues.lock().await;
        let mut urls: Vec<String> = queues.keys().map(|name| Self::queue_url(name)).collect();
        urls.sort();
        Ok(urls)
    }

    async fn create_queue(
        &self,
        queue: &str,
        attributes: QueueAttributes,
    ) -> Result<String, TransportError> {
        self.counters.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut queues = self.queues.lock().await;
        match queues.get(queue) {
            Some(existing) if existing.attributes != attributes => {
                Err(TransportError::QueueExists {
                    queue: queue.to_string(),
                })
            }
            Some(_) => Ok(Self::queue_url(queue)),
            None => {
                queues.insert(
                    queue.to_string(),
                    QueueState {
                        attributes,
                        messages: VecDeque::new(),
                    },
                );
                Ok(Self::queue_url(queue))
            }
        }
    }

    async fn send(&self, queue: &str, envelope: Envelope) -> Result<String, TransportError> {
        self.counters.send_calls.fetch_add(1, Ordering::SeqCst);
        let message_id = Uuid::new_v4().to_string();
        {
            let mut queues = self.queues.lock().await;
            let state = queues
                .get_mut(queue)
                .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;
            state.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: envelope.body,
                headers: Arc::new(envelope.headers),
                receipt_handle: None,
                invisible_until: None,
                receive_count: 0,
            });
        }
        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let max_messages = usize::try_from(max_messages.max(1)).unwrap_or(1);
        let deadline = Instant::now() + wait_time;

        loop {
            // Register interest before checking so a send between check and wait is not lost.
            let arrival = self.arrivals.notified();
            let received = self.take_visible(queue, max_messages).await?;
            if !received.is_empty() {
                return Ok(received);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            // Wake on a new send, when an in-flight message may become visible, or at the deadline.
            let recheck = (now + self.visibility_timeout.min(Duration::from_millis(50))).min(deadline);
            tokio::select! {
                _ = arrival => {}
                _ = tokio::time::sleep_until(recheck) => {}
            }
        }
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), TransportError> {
        self.counters.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let before = state.messages.len();
        state
            .messages
            .retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));
        if state.messages.len() == before {
            // Stale handles are accepted silently, as SQS does.
            tracing::debug!(queue = %queue, "Delete with unknown receipt handle ignored");
        }
        Ok(())
    }
}
