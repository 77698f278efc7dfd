//! Taskrelay Worker – queue transport, publishing, provisioning and consumption.
//!
//! This crate provides the `QueueTransport` port with its SQS and in-memory adapters,
//! the `TaskPublisher`, the startup `QueueProvisioner`, and the consuming side: the
//! tracing `MessageConsumer` around a pluggable `TaskHandler`, driven by a
//! `QueueListener` worker pool.

pub mod consumer;
pub mod converter;
pub mod handler;
pub mod listener;
pub mod provisioner;
pub mod publisher;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use consumer::{ConsumeStage, MessageConsumer};
pub use handler::{LoggingTaskHandler, TaskHandler};
pub use listener::{Acknowledgement, ListenerConfig, QueueListener};
pub use provisioner::{ProvisionOutcome, QueueProvisioner};
pub use publisher::TaskPublisher;
pub use transport::{Envelope, InMemoryTransport, QueueTransport, ReceivedMessage, TransportError};
#[cfg(feature = "transport-sqs")]
pub use transport::SqsTransport;
