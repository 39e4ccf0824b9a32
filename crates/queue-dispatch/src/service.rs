//! Queue orchestration.
//!
//! Business logic between the dispatch layer and the primitive provider API:
//! the four send flavors, chunked batch sends, receive-process workflows with
//! partial-failure isolation, dead-letter relocation, queue lifecycle, and
//! the continuous-polling registry.

use crate::attributes::{self, MAX_DELAY_SECONDS, MAX_RECEIVE_MESSAGES, MAX_WAIT_TIME_SECONDS};
use crate::batch::{self, MAX_BATCH_ENTRIES};
use crate::client::{BatchSendOutcome, OutboundMessage, QueueApi, ReceiveRequest, SendReceipt};
use crate::config::DispatchConfig;
use crate::error::{QueueError, ValidationError};
use crate::message::{AttributeValue, QueueMessage, QueueName};
use crate::polling::{PollSettings, PollingRegistry, PollingState};
use crate::serializer::{JsonSerializer, MessageSerializer};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

// ============================================================================
// Message Handlers
// ============================================================================

/// Application callback processing one received message.
///
/// Handlers run on the shared worker pool and may block their worker; a
/// stalled handler never stalls dispatch. A returned error leaves the message
/// undeleted and eligible for redelivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [MessageHandler]
pub struct FnHandler<F> {
    inner: F,
}

impl<F> FnHandler<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(QueueMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
        (self.inner)(message).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(inner: F) -> Arc<dyn MessageHandler>
where
    F: Fn(QueueMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler::new(inner))
}

// ============================================================================
// QueueService
// ============================================================================

/// Orchestration service executing declared queue operations
pub struct QueueService {
    api: Arc<dyn QueueApi>,
    serializer: Arc<dyn MessageSerializer>,
    config: DispatchConfig,
    polling: PollingRegistry,
}

impl QueueService {
    /// Create new service over a provider API
    pub fn new(
        api: Arc<dyn QueueApi>,
        serializer: Arc<dyn MessageSerializer>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            api,
            serializer,
            config,
            polling: PollingRegistry::new(),
        }
    }

    /// Create new service with the JSON serializer and default configuration
    pub fn with_defaults(api: Arc<dyn QueueApi>) -> Self {
        Self::new(api, Arc::new(JsonSerializer), DispatchConfig::default())
    }

    /// Runtime configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Serializer used for payload encoding
    pub fn serializer(&self) -> &Arc<dyn MessageSerializer> {
        &self.serializer
    }

    fn encode(&self, payload: &Value) -> Result<String, QueueError> {
        Ok(self.serializer.serialize(payload)?)
    }

    fn receive_request(
        &self,
        max_messages: u32,
        wait_time_seconds: Option<u32>,
    ) -> Result<ReceiveRequest, QueueError> {
        if max_messages == 0 || max_messages > MAX_RECEIVE_MESSAGES {
            return Err(ValidationError::OutOfRange {
                field: "max_messages".to_string(),
                message: format!("{} is outside 1..={}", max_messages, MAX_RECEIVE_MESSAGES),
            }
            .into());
        }

        Ok(ReceiveRequest::new()
            .with_max_messages(max_messages)
            .with_wait_time_seconds(
                wait_time_seconds
                    .unwrap_or(self.config.default_wait_time_seconds)
                    .min(MAX_WAIT_TIME_SECONDS),
            ))
    }

    // ------------------------------------------------------------------
    // Sends
    // ------------------------------------------------------------------

    /// Send a single message with no extra delivery options
    pub async fn send_plain(
        &self,
        queue: &QueueName,
        body: &Value,
    ) -> Result<SendReceipt, QueueError> {
        let message = OutboundMessage::new(self.encode(body)?);
        self.api.send_message(queue, &message).await
    }

    /// Send a single message carrying user attributes
    pub async fn send_attributed(
        &self,
        queue: &QueueName,
        body: &Value,
        attributes: &HashMap<String, AttributeValue>,
    ) -> Result<SendReceipt, QueueError> {
        let message =
            OutboundMessage::new(self.encode(body)?).with_attributes(attributes.clone());
        self.api.send_message(queue, &message).await
    }

    /// Send a single message with a delivery delay.
    ///
    /// The delay rides on the provider call alongside any attributes; it must
    /// stay within the provider ceiling.
    pub async fn send_delayed(
        &self,
        queue: &QueueName,
        body: &Value,
        delay_seconds: u32,
        attributes: &HashMap<String, AttributeValue>,
    ) -> Result<SendReceipt, QueueError> {
        if delay_seconds > MAX_DELAY_SECONDS {
            return Err(ValidationError::OutOfRange {
                field: "delay_seconds".to_string(),
                message: format!("{} exceeds maximum {}", delay_seconds, MAX_DELAY_SECONDS),
            }
            .into());
        }

        let message = OutboundMessage::new(self.encode(body)?)
            .with_delay_seconds(delay_seconds)
            .with_attributes(attributes.clone());
        self.api.send_message(queue, &message).await
    }

    /// Send a single message to a FIFO queue.
    ///
    /// The group id is mandatory; a deduplication id is generated per call
    /// when the caller does not supply one, and never reused. Content-based
    /// deduplication is a queue-level concern left to provider configuration.
    pub async fn send_fifo(
        &self,
        queue: &QueueName,
        body: &Value,
        group_id: &str,
        deduplication_id: Option<String>,
        attributes: &HashMap<String, AttributeValue>,
    ) -> Result<SendReceipt, QueueError> {
        if group_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "group_id".to_string(),
            }
            .into());
        }

        let deduplication_id =
            deduplication_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let message = OutboundMessage::new(self.encode(body)?)
            .with_group_id(group_id)
            .with_deduplication_id(deduplication_id)
            .with_attributes(attributes.clone());
        self.api.send_message(queue, &message).await
    }

    /// Send many messages, chunking past the per-call ceiling.
    ///
    /// Payloads within the ceiling go out as a single provider call. Larger
    /// lists are split into ceiling-sized chunks submitted concurrently; the
    /// concatenated outcome preserves the original entry order regardless of
    /// chunk completion order.
    pub async fn send_batch(
        &self,
        queue: &QueueName,
        bodies: &[Value],
        entry_ids: Option<&[String]>,
        batch_size: Option<usize>,
    ) -> Result<BatchSendOutcome, QueueError> {
        batch::require_elements(bodies, "payloads", false)?;

        // Serialize everything up front so a bad payload fails the call
        // before the first provider request.
        let mut messages = Vec::with_capacity(bodies.len());
        for body in bodies {
            messages.push(OutboundMessage::new(self.encode(body)?));
        }

        // Entry ids are assigned before chunking, so they stay unique across
        // the whole call and outcomes can be concatenated as-is.
        let entries = match entry_ids {
            Some(ids) => batch::build_entries_with_ids(ids, messages)?,
            None => batch::build_entries(messages),
        };

        let ceiling = batch_size
            .unwrap_or_else(|| self.config.effective_batch_size())
            .clamp(1, MAX_BATCH_ENTRIES);

        if entries.len() <= ceiling {
            return self.api.send_message_batch(queue, &entries).await;
        }

        let mut handles = Vec::new();
        for chunk in batch::chunk_entries(entries, ceiling) {
            let api = Arc::clone(&self.api);
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                api.send_message_batch(&queue, &chunk).await
            }));
        }

        // Await in submission order; chunk outcomes concatenate in the
        // original order even when later chunks finish first.
        let mut outcome = BatchSendOutcome::default();
        for handle in handles {
            let chunk_outcome = handle.await.map_err(|e| QueueError::ProviderError {
                provider: "runtime".to_string(),
                code: "TaskFailure".to_string(),
                message: e.to_string(),
            })??;
            outcome.extend(chunk_outcome);
        }

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Receives
    // ------------------------------------------------------------------

    /// Receive messages, process each one, and delete it on success.
    ///
    /// A processing failure is logged and leaves that message undeleted
    /// (eligible for redelivery) without affecting its siblings; no handler
    /// error escapes the call. Returns the messages that were processed and
    /// deleted.
    pub async fn receive_and_delete(
        &self,
        queue: &QueueName,
        max_messages: u32,
        wait_time_seconds: Option<u32>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let request = self.receive_request(max_messages, wait_time_seconds)?;
        let messages = self.api.receive_messages(queue, &request).await?;

        let mut processed = Vec::with_capacity(messages.len());
        for message in messages {
            let receipt = message.receipt.clone();
            match handler.handle(message.clone()).await {
                Ok(()) => {
                    self.api.delete_message(queue, &receipt).await?;
                    processed.push(message);
                }
                Err(error) => {
                    warn!(
                        queue = %queue,
                        message_id = %message.id,
                        error = %error,
                        "message processing failed; left for redelivery"
                    );
                }
            }
        }

        Ok(processed)
    }

    /// Receive messages and process them concurrently without deleting.
    ///
    /// Every handler runs to completion even when a sibling fails; any
    /// failure then surfaces as a single aggregate error. Redelivery
    /// management is the caller's concern on this path.
    pub async fn receive_and_process(
        &self,
        queue: &QueueName,
        max_messages: u32,
        wait_time_seconds: Option<u32>,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let request = self.receive_request(max_messages, wait_time_seconds)?;
        let messages = self.api.receive_messages(queue, &request).await?;
        let total = messages.len();

        let mut handles = Vec::with_capacity(total);
        for message in &messages {
            let handler = Arc::clone(&handler);
            let message = message.clone();
            handles.push(tokio::spawn(async move { handler.handle(message).await }));
        }

        let mut failed = 0usize;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    failed += 1;
                    warn!(queue = %queue, error = %error, "concurrent processing failed");
                }
                Err(join_error) => {
                    failed += 1;
                    warn!(queue = %queue, error = %join_error, "processing task panicked");
                }
            }
        }

        if failed > 0 {
            return Err(QueueError::ProcessingFailed {
                queue_name: queue.to_string(),
                failed,
                total,
            });
        }

        Ok(messages)
    }

    // ------------------------------------------------------------------
    // Continuous polling
    // ------------------------------------------------------------------

    /// Build poll settings from declared overrides and configured defaults
    pub fn poll_settings(
        &self,
        wait_time_seconds: Option<u32>,
        max_messages: Option<u32>,
    ) -> PollSettings {
        PollSettings {
            max_messages: max_messages
                .unwrap_or(MAX_RECEIVE_MESSAGES)
                .clamp(1, MAX_RECEIVE_MESSAGES),
            wait_time_seconds: wait_time_seconds
                .unwrap_or(self.config.default_wait_time_seconds)
                .min(MAX_WAIT_TIME_SECONDS),
            backoff: Duration::from_secs(self.config.poll_backoff_seconds),
            iteration_grace: Duration::from_secs(self.config.poll_grace_seconds),
        }
    }

    /// Start continuous polling of a queue.
    ///
    /// Returns `false` when the queue already has an active session.
    pub async fn start_polling(
        &self,
        queue: &QueueName,
        settings: PollSettings,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        self.polling
            .start(Arc::clone(&self.api), queue.clone(), settings, handler)
            .await
    }

    /// Request cancellation of a queue's polling session
    pub async fn stop_polling(&self, queue: &QueueName) -> bool {
        self.polling.stop(queue).await
    }

    /// Observable polling state for a queue
    pub async fn polling_state(&self, queue: &QueueName) -> PollingState {
        self.polling.state(queue).await
    }

    /// Stop all polling sessions and drain their tasks.
    ///
    /// Flags flip before any task is awaited, so no session accepts new work
    /// while the pool drains under the bounded wait.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.polling.shutdown(drain_timeout).await;
    }

    // ------------------------------------------------------------------
    // Explicit operations
    // ------------------------------------------------------------------

    /// Move one message from a source queue to a destination queue.
    ///
    /// Receives one message, forwards its body, then deletes the original by
    /// its receipt handle. The forward and the delete are separate provider
    /// calls, so the move is not atomic: a crash in between leaves the
    /// message on both queues until the source copy expires its visibility.
    pub async fn relocate_message(
        &self,
        source: &QueueName,
        destination: &QueueName,
    ) -> Result<Option<SendReceipt>, QueueError> {
        let request = ReceiveRequest::new().with_max_messages(1);
        let mut messages = self.api.receive_messages(source, &request).await?;

        let Some(message) = messages.pop() else {
            return Ok(None);
        };

        let receipt = self
            .api
            .send_message(destination, &OutboundMessage::new(message.body.clone()))
            .await?;
        self.api.delete_message(source, &message.receipt).await?;

        info!(
            source = %source,
            destination = %destination,
            message_id = %message.id,
            "message relocated"
        );
        Ok(Some(receipt))
    }

    /// Drain a queue by repeated receive-and-delete cycles.
    ///
    /// Deletes everything visible until a receive comes back empty. Messages
    /// hidden behind a visibility timeout survive the purge and reappear
    /// later; this is not an atomic purge.
    pub async fn purge_queue(&self, queue: &QueueName) -> Result<usize, QueueError> {
        let mut purged = 0usize;

        loop {
            let request = ReceiveRequest::new().with_max_messages(MAX_RECEIVE_MESSAGES);
            let messages = self.api.receive_messages(queue, &request).await?;
            if messages.is_empty() {
                break;
            }

            let receipts = messages.into_iter().map(|m| m.receipt).collect();
            let entries = batch::build_delete_entries(receipts);
            let outcome = self.api.delete_message_batch(queue, &entries).await?;

            purged += outcome.successful_ids.len();
            for failure in &outcome.failed {
                warn!(
                    queue = %queue,
                    entry = %failure.entry_id,
                    code = %failure.code,
                    "purge delete failed"
                );
            }
        }

        Ok(purged)
    }

    /// Approximate number of visible messages in a queue
    pub async fn queue_size(&self, queue: &QueueName) -> Result<u64, QueueError> {
        let attributes = self.api.queue_attributes(queue).await?;
        Ok(attributes
            .get("ApproximateNumberOfMessages")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0))
    }

    /// Create a queue from a raw string attribute map.
    ///
    /// Attributes are translated and validated first; an unrecognized key
    /// fails the call before the provider is contacted.
    pub async fn create_queue(
        &self,
        queue: &QueueName,
        raw_attributes: &HashMap<String, String>,
    ) -> Result<(), QueueError> {
        let translated = attributes::translate_attributes(raw_attributes)?;
        self.api.create_queue(queue, &translated).await
    }

    /// Delete a queue by name
    pub async fn delete_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        self.api.delete_queue(queue).await
    }

    /// Check whether a queue exists
    pub async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        self.api.queue_exists(queue).await
    }
}
