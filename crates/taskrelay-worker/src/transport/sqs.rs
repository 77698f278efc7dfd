use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName};
use aws_sdk_sqs::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use taskrelay_core::{HeaderMap, HeaderValue, Headers};

use super::{Envelope, QueueAttributes, QueueTransport, ReceivedMessage, TransportError};

const DATA_TYPE_NUMBER: &str = "Number";
const DATA_TYPE_BINARY: &str = "Binary";
const ALL_ATTRIBUTES: &str = "All";

/// Amazon SQS transport
///
/// Queue names are resolved to URLs with `GetQueueUrl` on first use and cached.
#[derive(Clone)]
pub struct SqsTransport {
    client: Client,
    queue_urls: Arc<RwLock<HashMap<String, String>>>,
}

impl SqsTransport {
    /// Create a new SqsTransport
    ///
    /// # Arguments
    /// * `region` - AWS region, e.g. "ap-southeast-1"
    /// * `endpoint_url` - Optional endpoint override for a local emulator (e.g. "http://localhost:4566")
    pub async fn new(region: &str, endpoint_url: Option<&str>) -> Self {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.to_string()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_retry_mode(RetryMode::Standard);

        let mut config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config);

        if let Some(endpoint) = endpoint_url {
            config_builder = config_builder.endpoint_url(endpoint);
        }

        let config = config_builder.load().await;

        tracing::info!(
            region = %region,
            endpoint = ?endpoint_url,
            "SQS client configured"
        );

        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            queue_urls: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn queue_url(&self, queue: &str) -> Result<String, TransportError> {
        if let Some(url) = self.queue_urls.read().await.get(queue) {
            return Ok(url.clone());
        }

        let output = self
            .client
            .get_queue_url()
            .queue_name(queue)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|se| se.is_queue_does_not_exist())
                    .unwrap_or(false)
                {
                    TransportError::QueueNotFound(queue.to_string())
                } else {
                    TransportError::Resolve {
                        queue: queue.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let url = output
            .queue_url()
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?
            .to_string();

        self.queue_urls
            .write()
            .await
            .insert(queue.to_string(), url.clone());
        tracing::debug!(queue = %queue, url = %url, "Resolved queue URL");
        Ok(url)
    }
}

fn to_attribute(name: &str, value: &HeaderValue) -> Result<MessageAttributeValue, TransportError> {
    let builder = MessageAttributeValue::builder().data_type(value.data_type());
    let builder = match value {
        HeaderValue::String(s) => builder.string_value(s),
        HeaderValue::Number(n) => builder.string_value(n.to_string()),
        HeaderValue::Binary(bytes) => builder.binary_value(Blob::new(bytes.clone())),
    };
    builder.build().map_err(|e| TransportError::InvalidAttribute {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn from_attribute(value: &MessageAttributeValue) -> Option<HeaderValue> {
    // Custom data types look like "Number.long"; only the base type matters here.
    let data_type = value.data_type();
    if data_type.starts_with(DATA_TYPE_BINARY) {
        return value
            .binary_value()
            .map(|blob| HeaderValue::Binary(blob.as_ref().to_vec()));
    }

    let text = value.string_value()?;
    if data_type.starts_with(DATA_TYPE_NUMBER) {
        if let Ok(n) = text.trim().parse::<i64>() {
            return Some(HeaderValue::Number(n));
        }
    }
    Some(HeaderValue::String(text.to_string()))
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn list_queues(&self) -> Result<Vec<String>, TransportError> {
        let output = self
            .client
            .list_queues()
            .send()
            .await
            .map_err(|e| TransportError::List(DisplayErrorContext(&e).to_string()))?;

        Ok(output.queue_urls().to_vec())
    }

    #[tracing::instrument(skip(self, attributes))]
    async fn create_queue(
        &self,
        queue: &str,
        attributes: QueueAttributes,
    ) -> Result<String, TransportError> {
        let attributes: HashMap<QueueAttributeName, String> = attributes
            .into_iter()
            .map(|(name, value)| (QueueAttributeName::from(name.as_str()), value))
            .collect();

        let output = self
            .client
            .create_queue()
            .queue_name(queue)
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|se| se.is_queue_name_exists())
                    .unwrap_or(false)
                {
                    TransportError::QueueExists {
                        queue: queue.to_string(),
                    }
                } else {
                    TransportError::Create {
                        queue: queue.to_string(),
                        message: DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let url = output
            .queue_url()
            .ok_or_else(|| TransportError::Create {
                queue: queue.to_string(),
                message: "response did not contain a queue URL".to_string(),
            })?
            .to_string();

        self.queue_urls
            .write()
            .await
            .insert(queue.to_string(), url.clone());
        Ok(url)
    }

    async fn send(&self, queue: &str, envelope: Envelope) -> Result<String, TransportError> {
        let url = self.queue_url(queue).await?;

        let mut attributes = HashMap::with_capacity(envelope.headers.len());
        for (name, value) in &envelope.headers {
            attributes.insert(name.clone(), to_attribute(name, value)?);
        }

        let output = self
            .client
            .send_message()
            .queue_url(url)
            .message_body(envelope.body)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| TransportError::Send {
                queue: queue.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: i32,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let url = self.queue_url(queue).await?;
        let wait_time_seconds = i32::try_from(wait_time.as_secs()).unwrap_or(i32::MAX);

        let output = self
            .client
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_seconds)
            .message_attribute_names(ALL_ATTRIBUTES)
            .send()
            .await
            .map_err(|e| TransportError::Receive {
                queue: queue.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let mut received = Vec::with_capacity(output.messages().len());
        for message in output.messages() {
            let Some(receipt_handle) = message.receipt_handle() else {
                tracing::warn!(
                    queue = %queue,
                    message_id = ?message.message_id(),
                    "Received message without receipt handle, skipping"
                );
                continue;
            };

            let mut headers = HeaderMap::new();
            if let Some(attributes) = message.message_attributes() {
                for (name, value) in attributes {
                    if let Some(value) = from_attribute(value) {
                        headers.insert(name.clone(), value);
                    }
                }
            }

            received.push(ReceivedMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: message.body().unwrap_or_default().to_string(),
                headers: Headers::snapshot(headers),
            });
        }

        Ok(received)
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<(), TransportError> {
        let url = self.queue_url(queue).await?;
        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| TransportError::Delete {
                queue: queue.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}
