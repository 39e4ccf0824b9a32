//! Shared fakes for unit tests.

use crate::attributes::QueueAttributeKey;
use crate::batch::{BatchEntry, DeleteEntry};
use crate::client::{
    BatchDeleteOutcome, BatchSendOutcome, BatchSendSuccess, OutboundMessage, QueueApi,
    ReceiveRequest, SendReceipt,
};
use crate::error::QueueError;
use crate::message::{MessageId, QueueMessage, QueueName, ReceiptHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider fake recording every call and returning canned success.
///
/// Receives always come back empty (after an optional delay, so polling
/// tests can observe in-flight iterations).
pub(crate) struct RecordingApi {
    pub sends: Mutex<Vec<(QueueName, OutboundMessage)>>,
    pub batches: Mutex<Vec<(QueueName, Vec<BatchEntry>)>>,
    pub receive_calls: AtomicUsize,
    pub receive_delay: Duration,
}

impl RecordingApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sends: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            receive_calls: AtomicUsize::new(0),
            receive_delay: Duration::ZERO,
        })
    }

    pub fn with_receive_delay(receive_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sends: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            receive_calls: AtomicUsize::new(0),
            receive_delay,
        })
    }

    pub fn sent(&self) -> Vec<(QueueName, OutboundMessage)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> Vec<(QueueName, Vec<BatchEntry>)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn receive_count(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueApi for RecordingApi {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, QueueError> {
        self.sends
            .lock()
            .unwrap()
            .push((queue.clone(), message.clone()));
        Ok(SendReceipt {
            message_id: MessageId::new(),
            sequence_number: message.group_id.as_ref().map(|_| "1".to_string()),
        })
    }

    async fn send_message_batch(
        &self,
        queue: &QueueName,
        entries: &[BatchEntry],
    ) -> Result<BatchSendOutcome, QueueError> {
        self.batches
            .lock()
            .unwrap()
            .push((queue.clone(), entries.to_vec()));

        Ok(BatchSendOutcome {
            successful: entries
                .iter()
                .map(|entry| BatchSendSuccess {
                    entry_id: entry.id.clone(),
                    message_id: MessageId::new(),
                    sequence_number: None,
                })
                .collect(),
            failed: Vec::new(),
        })
    }

    async fn receive_messages(
        &self,
        _queue: &QueueName,
        _request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        if !self.receive_delay.is_zero() {
            tokio::time::sleep(self.receive_delay).await;
        }
        Ok(Vec::new())
    }

    async fn delete_message(
        &self,
        _queue: &QueueName,
        _receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn delete_message_batch(
        &self,
        _queue: &QueueName,
        entries: &[DeleteEntry],
    ) -> Result<BatchDeleteOutcome, QueueError> {
        Ok(BatchDeleteOutcome {
            successful_ids: entries.iter().map(|entry| entry.id.clone()).collect(),
            failed: Vec::new(),
        })
    }

    async fn change_message_visibility(
        &self,
        _queue: &QueueName,
        _receipt: &ReceiptHandle,
        _visibility_timeout: u32,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn create_queue(
        &self,
        _queue: &QueueName,
        _attributes: &HashMap<QueueAttributeKey, String>,
    ) -> Result<(), QueueError> {
        Ok(())
    }

    async fn delete_queue(&self, _queue: &QueueName) -> Result<(), QueueError> {
        Ok(())
    }

    async fn queue_exists(&self, _queue: &QueueName) -> Result<bool, QueueError> {
        Ok(true)
    }

    async fn queue_attributes(
        &self,
        _queue: &QueueName,
    ) -> Result<HashMap<String, String>, QueueError> {
        Ok(HashMap::new())
    }
}
