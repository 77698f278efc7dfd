//! Queue transport port
//!
//! The publisher, the provisioner and the listener only talk to the queue through
//! [`QueueTransport`]. Adapters:
//! - [`SqsTransport`] (feature `transport-sqs`): Amazon SQS or a local SQS emulator
//! - [`InMemoryTransport`]: in-process queues with visibility-timeout redelivery

pub mod memory;
#[cfg(feature = "transport-sqs")]
pub mod sqs;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use taskrelay_core::{HeaderCarrier, HeaderMap, Headers};

pub use memory::InMemoryTransport;
#[cfg(feature = "transport-sqs")]
pub use sqs::SqsTransport;

/// Queue attribute enabling transport-side deduplication of identical bodies.
pub const CONTENT_BASED_DEDUPLICATION: &str = "ContentBasedDeduplication";

pub type QueueAttributes = HashMap<String, String>;

/// Outgoing message: string body plus an owned header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub body: String,
    pub headers: HeaderMap,
}

/// Message delivered by the transport. Headers are a read-only snapshot.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub headers: Headers,
}

impl HeaderCarrier for ReceivedMessage {
    fn headers(&self) -> &Headers {
        &self.headers
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to list queues: {0}")]
    List(String),

    #[error("Queue '{queue}' already exists")]
    QueueExists { queue: String },

    #[error("Failed to create queue '{queue}': {message}")]
    Create { queue: String, message: String },

    #[error("Queue '{0}' does not exist")]
    QueueNotFound(String),

    #[error("Failed to resolve URL of queue '{queue}': {message}")]
    Resolve { queue: String, message: String },

    #[error("Failed to send message to '{queue}': {message}")]
    Send { queue: String, message: String },

    #[error("Failed to receive messages from '{queue}': {message}")]
    Receive { queue: String, message: String },

    #[error("Failed to delete message from '{queue}': {message}")]
    Delete { queue: String, message: String },

    #[error("Invalid message attribute '{name}': {message}")]
    InvalidAttribute { name: String, message: String },
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Identifiers (URLs) of all queues visible to this client.
    async fn list_queues(&self) -> Result<Vec<String>, TransportError>;

    /// Create a queue and return its identifier.
    async fn create_queue(
        &self,
        queue: &str,
        attributes: QueueAttributes,
    ) -> Result<String, TransportError>;

    /// Send one message and return the transport-assigned message id.
    async fn send(&self, queue: &str, envelope: Envelope) -> Result<String, TransportError>;

    /// Receive up to `max_messages`, waiting at most `wait_time` for the first one.
    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Remove a received message from the queue.
    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), TransportError>;
}
