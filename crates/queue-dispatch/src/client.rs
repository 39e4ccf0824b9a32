//! The minimal primitive surface implemented by queue providers.
//!
//! The orchestration layer depends on nothing beyond this trait: send one or
//! many, receive, delete one or many, change visibility, and manage queues by
//! name. Two implementations ship with the crate: [crate::providers::SqsApi]
//! and [crate::providers::InMemoryApi].

use crate::attributes::QueueAttributeKey;
use crate::batch::{BatchEntry, DeleteEntry};
use crate::error::QueueError;
use crate::message::{AttributeValue, MessageId, QueueMessage, QueueName, ReceiptHandle};
use async_trait::async_trait;
use std::collections::HashMap;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

// ============================================================================
// Request and Response Types
// ============================================================================

/// A message about to be sent
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    /// Wire-format body
    pub body: String,
    /// Delivery delay in seconds, if any
    pub delay_seconds: Option<u32>,
    /// FIFO message group
    pub group_id: Option<String>,
    /// FIFO deduplication id
    pub deduplication_id: Option<String>,
    /// User attributes attached to the message
    pub attributes: HashMap<String, AttributeValue>,
}

impl OutboundMessage {
    /// Create new outbound message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set delivery delay
    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self
    }

    /// Set FIFO message group
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set FIFO deduplication id
    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    /// Add a user attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Replace the full attribute map
    pub fn with_attributes(mut self, attributes: HashMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Parameters of a receive call
#[derive(Debug, Clone)]
pub struct ReceiveRequest {
    /// Maximum number of messages to hand back
    pub max_messages: u32,
    /// Long-poll wait in seconds; zero returns immediately
    pub wait_time_seconds: u32,
    /// Per-receive visibility timeout override
    pub visibility_timeout: Option<u32>,
}

impl Default for ReceiveRequest {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_seconds: 0,
            visibility_timeout: None,
        }
    }
}

impl ReceiveRequest {
    /// Create new receive request with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set long-poll wait
    pub fn with_wait_time_seconds(mut self, wait: u32) -> Self {
        self.wait_time_seconds = wait;
        self
    }

    /// Override the visibility timeout for received messages
    pub fn with_visibility_timeout(mut self, timeout: u32) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }
}

/// Provider acknowledgement of a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
    /// FIFO sequence number, when the target is a FIFO queue
    pub sequence_number: Option<String>,
}

/// One successfully sent entry of a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSendSuccess {
    pub entry_id: String,
    pub message_id: MessageId,
    pub sequence_number: Option<String>,
}

/// One failed entry of a batch call, reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntryFailure {
    pub entry_id: String,
    pub code: String,
    pub message: String,
    /// Whether the failure is attributed to the sender rather than the provider
    pub sender_fault: bool,
}

/// Per-entry outcome of a batch send.
///
/// Entry failures stay per-entry and are never elevated to a call-level
/// error; the call itself only fails when the provider rejects the whole
/// request.
#[derive(Debug, Clone, Default)]
pub struct BatchSendOutcome {
    pub successful: Vec<BatchSendSuccess>,
    pub failed: Vec<BatchEntryFailure>,
}

impl BatchSendOutcome {
    /// Check whether every entry was accepted
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total number of entries covered by this outcome
    pub fn len(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Check whether the outcome covers no entries
    pub fn is_empty(&self) -> bool {
        self.successful.is_empty() && self.failed.is_empty()
    }

    /// Append another outcome, preserving entry order
    pub fn extend(&mut self, other: BatchSendOutcome) {
        self.successful.extend(other.successful);
        self.failed.extend(other.failed);
    }
}

/// Per-entry outcome of a batch delete
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutcome {
    pub successful_ids: Vec<String>,
    pub failed: Vec<BatchEntryFailure>,
}

impl BatchDeleteOutcome {
    /// Check whether every entry was deleted
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Primitive Provider Surface
// ============================================================================

/// Minimal queue API implemented by providers
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// Send a single message
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, QueueError>;

    /// Send up to one ceiling's worth of messages in a single call
    async fn send_message_batch(
        &self,
        queue: &QueueName,
        entries: &[BatchEntry],
    ) -> Result<BatchSendOutcome, QueueError>;

    /// Receive up to the requested number of messages
    async fn receive_messages(
        &self,
        queue: &QueueName,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a single received message
    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;

    /// Delete up to one ceiling's worth of received messages
    async fn delete_message_batch(
        &self,
        queue: &QueueName,
        entries: &[DeleteEntry],
    ) -> Result<BatchDeleteOutcome, QueueError>;

    /// Change the visibility timeout of a received message
    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<(), QueueError>;

    /// Create a queue with the given attributes
    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &HashMap<QueueAttributeKey, String>,
    ) -> Result<(), QueueError>;

    /// Delete a queue by name
    async fn delete_queue(&self, queue: &QueueName) -> Result<(), QueueError>;

    /// Check whether a queue exists
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError>;

    /// Fetch the raw provider attributes of a queue
    async fn queue_attributes(
        &self,
        queue: &QueueName,
    ) -> Result<HashMap<String, String>, QueueError>;
}
