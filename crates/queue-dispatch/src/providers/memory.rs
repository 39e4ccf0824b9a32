//! In-memory queue provider for testing and development.
//!
//! A fully functional implementation of [QueueApi] that models the provider
//! semantics the orchestration layer relies on: delivery delays, visibility
//! timeouts, receive counts, per-entry batch outcomes, and FIFO sequence
//! numbers. Queues must be created before use; sending to an unknown queue
//! fails the way the real provider does.

use crate::attributes::QueueAttributeKey;
use crate::batch::{BatchEntry, DeleteEntry, MAX_BATCH_ENTRIES};
use crate::client::{
    BatchDeleteOutcome, BatchEntryFailure, BatchSendOutcome, BatchSendSuccess, OutboundMessage,
    QueueApi, ReceiveRequest, SendReceipt,
};
use crate::error::QueueError;
use crate::message::{
    AttributeValue, MessageId, QueueMessage, QueueName, ReceiptHandle, SystemAttributes, Timestamp,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Fallback visibility timeout when the queue does not configure one
const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval used to emulate long-poll receives
const LONG_POLL_TICK: Duration = Duration::from_millis(15);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// A message stored in a queue with delivery metadata
#[derive(Clone)]
struct StoredMessage {
    id: MessageId,
    body: String,
    attributes: HashMap<String, AttributeValue>,
    sent_at: Timestamp,
    first_received_at: Option<Timestamp>,
    receive_count: u32,
    /// When the message becomes (or became) visible to receivers
    available_at: Instant,
}

/// Internal state for a single queue
struct StoredQueue {
    attributes: HashMap<String, String>,
    messages: VecDeque<StoredMessage>,
    /// Received-but-undeleted messages keyed by receipt handle
    in_flight: HashMap<String, StoredMessage>,
    /// Monotonic counter backing FIFO sequence numbers
    next_sequence: u64,
}

impl StoredQueue {
    fn new(attributes: HashMap<String, String>) -> Self {
        Self {
            attributes,
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            next_sequence: 0,
        }
    }

    fn visibility_timeout(&self) -> Duration {
        self.attributes
            .get(QueueAttributeKey::VisibilityTimeout.as_str())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT)
    }

    /// Return expired in-flight messages to the visible queue
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, message)| message.available_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(message) = self.in_flight.remove(&receipt) {
                self.messages.push_back(message);
            }
        }
    }
}

struct Storage {
    queues: HashMap<QueueName, StoredQueue>,
}

// ============================================================================
// InMemoryApi
// ============================================================================

/// In-memory implementation of the primitive queue API
pub struct InMemoryApi {
    storage: Arc<RwLock<Storage>>,
}

impl InMemoryApi {
    /// Create an empty in-memory provider
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(Storage {
                queues: HashMap::new(),
            })),
        }
    }

    fn store_message(
        queue: &mut StoredQueue,
        message: &OutboundMessage,
        is_fifo: bool,
        now: Instant,
    ) -> SendReceipt {
        let id = MessageId::new();
        let available_at = now + Duration::from_secs(u64::from(message.delay_seconds.unwrap_or(0)));

        queue.messages.push_back(StoredMessage {
            id: id.clone(),
            body: message.body.clone(),
            attributes: message.attributes.clone(),
            sent_at: Timestamp::now(),
            first_received_at: None,
            receive_count: 0,
            available_at,
        });

        let sequence_number = if is_fifo {
            queue.next_sequence += 1;
            Some(queue.next_sequence.to_string())
        } else {
            None
        };

        SendReceipt {
            message_id: id,
            sequence_number,
        }
    }

    /// Take up to `max` visible messages, moving them in flight
    fn take_visible(
        queue: &mut StoredQueue,
        max: u32,
        visibility: Duration,
        now: Instant,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        queue.requeue_expired(now);

        let mut taken = Vec::new();
        let mut index = 0;
        while index < queue.messages.len() && taken.len() < max as usize {
            if queue.messages[index].available_at <= now {
                if let Some(mut message) = queue.messages.remove(index) {
                    message.receive_count += 1;
                    if message.first_received_at.is_none() {
                        message.first_received_at = Some(Timestamp::now());
                    }
                    message.available_at = now + visibility;

                    let receipt = ReceiptHandle::new(uuid::Uuid::new_v4().to_string())?;
                    taken.push(QueueMessage {
                        id: message.id.clone(),
                        receipt: receipt.clone(),
                        body: message.body.clone(),
                        system: SystemAttributes {
                            sent_at: Some(message.sent_at.clone()),
                            first_received_at: message.first_received_at.clone(),
                            receive_count: message.receive_count,
                            sender_id: None,
                        },
                        attributes: message.attributes.clone(),
                    });
                    queue.in_flight.insert(receipt.as_str().to_string(), message);
                }
            } else {
                index += 1;
            }
        }

        Ok(taken)
    }
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

fn queue_not_found(queue: &QueueName) -> QueueError {
    QueueError::QueueNotFound {
        queue_name: queue.to_string(),
    }
}

#[async_trait]
impl QueueApi for InMemoryApi {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, QueueError> {
        let mut storage = self.storage.write().await;
        let stored = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        Ok(Self::store_message(
            stored,
            message,
            queue.is_fifo(),
            Instant::now(),
        ))
    }

    async fn send_message_batch(
        &self,
        queue: &QueueName,
        entries: &[BatchEntry],
    ) -> Result<BatchSendOutcome, QueueError> {
        crate::batch::ensure_within_ceiling(entries, MAX_BATCH_ENTRIES)?;

        let mut storage = self.storage.write().await;
        let stored = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        let now = Instant::now();
        let mut outcome = BatchSendOutcome::default();
        for entry in entries {
            let receipt = Self::store_message(stored, &entry.message, queue.is_fifo(), now);
            outcome.successful.push(BatchSendSuccess {
                entry_id: entry.id.clone(),
                message_id: receipt.message_id,
                sequence_number: receipt.sequence_number,
            });
        }

        Ok(outcome)
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + Duration::from_secs(u64::from(request.wait_time_seconds));

        loop {
            let taken = {
                let mut storage = self.storage.write().await;
                let stored = storage
                    .queues
                    .get_mut(queue)
                    .ok_or_else(|| queue_not_found(queue))?;

                let visibility = request
                    .visibility_timeout
                    .map(|seconds| Duration::from_secs(u64::from(seconds)))
                    .unwrap_or_else(|| stored.visibility_timeout());

                Self::take_visible(stored, request.max_messages, visibility, Instant::now())?
            };

            if !taken.is_empty() || Instant::now() >= deadline {
                return Ok(taken);
            }

            tokio::time::sleep(LONG_POLL_TICK).await;
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage.write().await;
        let stored = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        stored
            .in_flight
            .remove(receipt.as_str())
            .map(|_| ())
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.to_string(),
            })
    }

    async fn delete_message_batch(
        &self,
        queue: &QueueName,
        entries: &[DeleteEntry],
    ) -> Result<BatchDeleteOutcome, QueueError> {
        crate::batch::ensure_within_ceiling(entries, MAX_BATCH_ENTRIES)?;

        let mut storage = self.storage.write().await;
        let stored = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        let mut outcome = BatchDeleteOutcome::default();
        for entry in entries {
            if stored.in_flight.remove(entry.receipt.as_str()).is_some() {
                outcome.successful_ids.push(entry.id.clone());
            } else {
                outcome.failed.push(BatchEntryFailure {
                    entry_id: entry.id.clone(),
                    code: "ReceiptHandleIsInvalid".to_string(),
                    message: "no in-flight message for receipt".to_string(),
                    sender_fault: true,
                });
            }
        }

        Ok(outcome)
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<(), QueueError> {
        let mut storage = self.storage.write().await;
        let stored = storage
            .queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        let message = stored
            .in_flight
            .get_mut(receipt.as_str())
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.to_string(),
            })?;

        message.available_at =
            Instant::now() + Duration::from_secs(u64::from(visibility_timeout));
        Ok(())
    }

    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &HashMap<QueueAttributeKey, String>,
    ) -> Result<(), QueueError> {
        let raw: HashMap<String, String> = attributes
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect();

        let mut storage = self.storage.write().await;
        storage
            .queues
            .entry(queue.clone())
            .and_modify(|stored| stored.attributes = raw.clone())
            .or_insert_with(|| StoredQueue::new(raw));

        Ok(())
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        let mut storage = self.storage.write().await;
        storage
            .queues
            .remove(queue)
            .map(|_| ())
            .ok_or_else(|| queue_not_found(queue))
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        let storage = self.storage.read().await;
        Ok(storage.queues.contains_key(queue))
    }

    async fn queue_attributes(
        &self,
        queue: &QueueName,
    ) -> Result<HashMap<String, String>, QueueError> {
        let storage = self.storage.read().await;
        let stored = storage
            .queues
            .get(queue)
            .ok_or_else(|| queue_not_found(queue))?;

        let now = Instant::now();
        let visible = stored
            .messages
            .iter()
            .filter(|message| message.available_at <= now)
            .count();
        let delayed = stored.messages.len() - visible;

        let mut attributes = stored.attributes.clone();
        attributes.insert(
            "ApproximateNumberOfMessages".to_string(),
            visible.to_string(),
        );
        attributes.insert(
            "ApproximateNumberOfMessagesDelayed".to_string(),
            delayed.to_string(),
        );
        attributes.insert(
            "ApproximateNumberOfMessagesNotVisible".to_string(),
            stored.in_flight.len().to_string(),
        );

        Ok(attributes)
    }
}
