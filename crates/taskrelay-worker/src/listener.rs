//! Queue listener: long-poll loop, bounded worker pool and deletion policy.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use taskrelay_core::{Config, DeletionPolicy};

use crate::consumer::{ConsumeStage, MessageConsumer};
use crate::transport::{QueueTransport, ReceivedMessage, TransportError};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub max_workers: usize,
    pub max_messages: i32,
    pub wait_time: Duration,
    pub deletion_policy: DeletionPolicy,
    /// Pause after a failed receive before polling again.
    pub error_backoff: Duration,
    /// Pause after an empty receive when `wait_time` is zero (short polling).
    pub idle_pause: Duration,
    /// How long shutdown waits for in-flight messages.
    pub shutdown_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            max_messages: 10,
            wait_time: Duration::from_secs(20),
            deletion_policy: DeletionPolicy::default(),
            error_backoff: Duration::from_secs(5),
            idle_pause: Duration::from_millis(200),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for ListenerConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.max_workers,
            max_messages: config.max_messages,
            wait_time: Duration::from_secs(config.wait_time_seconds.max(0) as u64),
            deletion_policy: config.deletion_policy,
            ..Self::default()
        }
    }
}

/// Outcome of applying the deletion policy to a consumed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    Deleted,
    /// Left on the queue; redelivered once its visibility timeout expires.
    Retained,
}

pub struct QueueListener {
    queue: String,
    config: ListenerConfig,
    semaphore: Arc<Semaphore>,
    shutdown_tx: mpsc::Sender<()>,
    poll_handle: JoinHandle<()>,
}

impl QueueListener {
    /// Start polling the consumer's queue in a background task.
    pub fn start(
        transport: Arc<dyn QueueTransport>,
        consumer: Arc<MessageConsumer>,
        config: ListenerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let queue = consumer.queue().to_string();

        let poll_handle = tokio::spawn(Self::poll_loop(
            transport,
            consumer,
            config.clone(),
            semaphore.clone(),
            shutdown_rx,
        ));

        Self {
            queue,
            config,
            semaphore,
            shutdown_tx,
            poll_handle,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Messages currently being processed.
    pub fn in_flight(&self) -> usize {
        self.config
            .max_workers
            .saturating_sub(self.semaphore.available_permits())
    }

    async fn poll_loop(
        transport: Arc<dyn QueueTransport>,
        consumer: Arc<MessageConsumer>,
        config: ListenerConfig,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let queue = consumer.queue().to_string();
        tracing::info!(
            queue = %queue,
            max_workers = config.max_workers,
            max_messages = config.max_messages,
            wait_time_secs = config.wait_time.as_secs(),
            deletion_policy = %config.deletion_policy,
            "Queue listener started"
        );

        'poll: loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(queue = %queue, "Queue listener shutting down");
                    break;
                }
                received = transport.receive(&queue, config.max_messages, config.wait_time) => {
                    match received {
                        Ok(messages) => {
                            if messages.is_empty() {
                                tracing::trace!(queue = %queue, "No messages available");
                                if config.wait_time.is_zero() {
                                    tokio::select! {
                                        _ = shutdown_rx.recv() => break,
                                        _ = sleep(config.idle_pause) => {}
                                    }
                                }
                            }
                            let received_count = messages.len();
                            for (dispatched, message) in messages.into_iter().enumerate() {
                                // Waiting for a permit here keeps receive from outpacing the pool.
                                let permit = tokio::select! {
                                    _ = shutdown_rx.recv() => {
                                        tracing::info!(
                                            queue = %queue,
                                            undispatched = received_count - dispatched,
                                            "Queue listener shutting down, undispatched messages return after their visibility timeout"
                                        );
                                        break 'poll;
                                    }
                                    permit = semaphore.clone().acquire_owned() => match permit {
                                        Ok(permit) => permit,
                                        Err(_) => return,
                                    },
                                };

                                let transport = transport.clone();
                                let consumer = consumer.clone();
                                let policy = config.deletion_policy;
                                tokio::spawn(async move {
                                    let _permit = permit;
                                    let message_id = message.message_id.clone();
                                    if let Err(e) = Self::handle_message(
                                        transport.as_ref(),
                                        &consumer,
                                        policy,
                                        &message,
                                    )
                                    .await
                                    {
                                        tracing::error!(
                                            error = %e,
                                            queue = %consumer.queue(),
                                            message_id = %message_id,
                                            "Failed to acknowledge message"
                                        );
                                    }
                                });
                            }
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                queue = %queue,
                                backoff_ms = config.error_backoff.as_millis() as u64,
                                "Failed to receive messages"
                            );
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                _ = sleep(config.error_backoff) => {}
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(queue = %queue, "Queue listener stopped");
    }

    /// Consume one message and apply the deletion policy to the outcome.
    ///
    /// Consumer errors are already logged by the consumer; only acknowledgement
    /// failures are returned.
    pub async fn handle_message(
        transport: &dyn QueueTransport,
        consumer: &MessageConsumer,
        policy: DeletionPolicy,
        message: &ReceivedMessage,
    ) -> Result<Acknowledgement, TransportError> {
        let processed = consumer.consume(message).await.is_ok();

        if policy.should_delete(processed) {
            transport
                .delete(consumer.queue(), &message.receipt_handle)
                .await?;
            tracing::debug!(
                queue = %consumer.queue(),
                message_id = %message.message_id,
                processed = processed,
                stage = %ConsumeStage::Acknowledged,
                "Message deleted"
            );
            Ok(Acknowledgement::Deleted)
        } else {
            tracing::info!(
                queue = %consumer.queue(),
                message_id = %message.message_id,
                deletion_policy = %policy,
                "Message retained for redelivery"
            );
            Ok(Acknowledgement::Retained)
        }
    }

    /// Stop polling and wait (bounded) for in-flight messages to finish.
    ///
    /// `shutdown_timeout` bounds the whole call, including the wait for the poll
    /// loop to exit.
    pub async fn shutdown(self) {
        let QueueListener {
            queue,
            config,
            semaphore,
            shutdown_tx,
            mut poll_handle,
        } = self;

        tracing::info!(queue = %queue, "Initiating queue listener shutdown");
        let deadline = tokio::time::Instant::now() + config.shutdown_timeout;
        let _ = shutdown_tx.send(()).await;

        match tokio::time::timeout_at(deadline, &mut poll_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, queue = %queue, "Queue listener task failed")
            }
            Err(_) => {
                tracing::warn!(queue = %queue, "Queue listener did not stop in time, aborting");
                poll_handle.abort();
            }
        }

        let workers = u32::try_from(config.max_workers).unwrap_or(u32::MAX);
        match tokio::time::timeout_at(deadline, semaphore.acquire_many(workers)).await {
            Ok(_) => tracing::info!(queue = %queue, "Queue listener drained"),
            Err(_) => tracing::warn!(
                queue = %queue,
                in_flight = config.max_workers.saturating_sub(semaphore.available_permits()),
                "Shutdown timeout reached with messages still in flight"
            ),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        traced_message, FailingHandler, FailingTransport, HangingHandler, RecordingHandler,
    };
    use crate::transport::{Envelope, InMemoryTransport};
    use taskrelay_core::trace::codec;
    use taskrelay_core::{NewTask, TraceContext, TracePropagation, Tracer};

    fn body() -> String {
        NewTask::new("backup", "nightly")
            .complete("t-1".to_string(), chrono::Utc::now())
            .to_body()
            .unwrap()
    }

    fn consumer(handler: Arc<dyn crate::handler::TaskHandler>) -> MessageConsumer {
        MessageConsumer::new("q", Tracer::default(), TracePropagation::Required, handler)
    }

    #[tokio::test]
    async fn always_policy_deletes_failed_message() {
        let transport = FailingTransport;
        let consumer = consumer(Arc::new(FailingHandler));
        let result = QueueListener::handle_message(
            &transport,
            &consumer,
            DeletionPolicy::Always,
            &traced_message(&body(), 1, 2),
        )
        .await;
        // The delete was attempted even though processing failed.
        assert!(matches!(result, Err(TransportError::Delete { .. })));
    }

    #[tokio::test]
    async fn on_success_policy_retains_failed_message() {
        let transport = FailingTransport;
        let consumer = consumer(Arc::new(FailingHandler));
        let ack = QueueListener::handle_message(
            &transport,
            &consumer,
            DeletionPolicy::OnSuccess,
            &traced_message(&body(), 1, 2),
        )
        .await
        .unwrap();
        assert_eq!(ack, Acknowledgement::Retained);
    }

    #[tokio::test]
    async fn listener_processes_and_deletes() {
        let transport = InMemoryTransport::with_queue("q", Duration::from_secs(30)).await;
        transport
            .send(
                "q",
                Envelope {
                    body: body(),
                    headers: codec::encode_context(&TraceContext::new(42, 7)),
                },
            )
            .await
            .unwrap();

        let handler = RecordingHandler::default();
        let listener = QueueListener::start(
            Arc::new(transport.clone()),
            Arc::new(consumer(Arc::new(handler.clone()))),
            ListenerConfig {
                wait_time: Duration::from_millis(50),
                ..ListenerConfig::default()
            },
        );

        for _ in 0..100 {
            if transport.message_count("q").await == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        listener.shutdown().await;

        assert_eq!(transport.message_count("q").await, 0);
        assert_eq!(handler.contexts().len(), 1);
    }

    #[tokio::test]
    async fn receive_failures_do_not_stop_listener() {
        let listener = QueueListener::start(
            Arc::new(FailingTransport),
            Arc::new(consumer(Arc::new(RecordingHandler::default()))),
            ListenerConfig {
                error_backoff: Duration::from_millis(5),
                ..ListenerConfig::default()
            },
        );
        sleep(Duration::from_millis(30)).await;
        assert!(!listener.poll_handle.is_finished());
        listener.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_is_bounded_when_workers_hang() {
        let transport = InMemoryTransport::with_queue("q", Duration::from_secs(30)).await;
        for _ in 0..2 {
            transport
                .send(
                    "q",
                    Envelope {
                        body: body(),
                        headers: codec::encode_context(&TraceContext::new(42, 7)),
                    },
                )
                .await
                .unwrap();
        }

        let handler = HangingHandler::default();
        let listener = QueueListener::start(
            Arc::new(transport.clone()),
            Arc::new(consumer(Arc::new(handler.clone()))),
            ListenerConfig {
                max_workers: 1,
                wait_time: Duration::from_millis(50),
                shutdown_timeout: Duration::from_millis(100),
                ..ListenerConfig::default()
            },
        );

        for _ in 0..100 {
            if handler.started() > 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handler.started(), 1);
        assert_eq!(listener.in_flight(), 1);

        let stopped = tokio::time::timeout(Duration::from_secs(2), listener.shutdown()).await;
        assert!(stopped.is_ok(), "shutdown exceeded its timeout");
        assert_eq!(handler.started(), 1);
    }

    #[test]
    fn config_maps_wait_time() {
        let config = Config {
            wait_time_seconds: 5,
            max_workers: 3,
            ..Config::default()
        };
        let listener = ListenerConfig::from(&config);
        assert_eq!(listener.wait_time, Duration::from_secs(5));
        assert_eq!(listener.max_workers, 3);
    }
}
