//! AWS SQS implementation of the primitive queue API.
//!
//! Thin mapping from [QueueApi] onto the `aws-sdk-sqs` client. Queue URLs are
//! resolved once per name and cached; provider errors are wrapped into
//! [QueueError] carrying the originating provider code.

use crate::attributes::QueueAttributeKey;
use crate::batch::{BatchEntry, DeleteEntry, MAX_BATCH_ENTRIES};
use crate::client::{
    BatchDeleteOutcome, BatchEntryFailure, BatchSendOutcome, BatchSendSuccess, OutboundMessage,
    QueueApi, ReceiveRequest, SendReceipt,
};
use crate::error::{QueueError, SerializationError};
use crate::message::{
    AttributeValue, MessageId, QueueMessage, QueueName, ReceiptHandle, SystemAttributes, Timestamp,
};
use async_trait::async_trait;
use aws_sdk_sqs::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{
    DeleteMessageBatchRequestEntry, MessageAttributeValue, MessageSystemAttributeName,
    QueueAttributeName, SendMessageBatchRequestEntry,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const PROVIDER: &str = "aws-sqs";

// ============================================================================
// Error Mapping
// ============================================================================

/// Map an SDK error into the domain error type.
///
/// Service errors keep their provider code; transport-level failures become
/// connection errors. Queue- and receipt-shaped codes get their dedicated
/// variants so callers can branch without string matching.
fn map_sdk_error<E, R>(queue: &QueueName, err: SdkError<E, R>) -> QueueError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(_) => {
            let code = err.code().unwrap_or("Unknown").to_string();
            let message = err.message().unwrap_or_default().to_string();

            match code.as_str() {
                "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
                    QueueError::QueueNotFound {
                        queue_name: queue.to_string(),
                    }
                }
                "ReceiptHandleIsInvalid" | "AWS.SimpleQueueService.MessageNotInflight" => {
                    QueueError::MessageNotFound { receipt: message }
                }
                _ => QueueError::ProviderError {
                    provider: PROVIDER.to_string(),
                    code,
                    message,
                },
            }
        }
        _ => QueueError::ConnectionFailed {
            message: err.to_string(),
        },
    }
}

fn to_sdk_attribute(
    key: &str,
    value: &AttributeValue,
) -> Result<MessageAttributeValue, QueueError> {
    let builder = MessageAttributeValue::builder().data_type(value.data_type());
    let builder = match value {
        AttributeValue::Text(text) => builder.string_value(text),
        AttributeValue::Number(number) => builder.string_value(number),
        AttributeValue::Binary(bytes) => builder.binary_value(Blob::new(bytes.to_vec())),
    };

    builder
        .build()
        .map_err(|_| SerializationError::InvalidAttribute {
            key: key.to_string(),
        })
        .map_err(QueueError::from)
}

fn from_sdk_attribute(attribute: &MessageAttributeValue) -> AttributeValue {
    let data_type = attribute.data_type();
    if data_type.starts_with("Binary") {
        let bytes = attribute
            .binary_value()
            .map(|blob| Bytes::from(blob.clone().into_inner()))
            .unwrap_or_default();
        AttributeValue::Binary(bytes)
    } else if data_type.starts_with("Number") {
        AttributeValue::Number(attribute.string_value().unwrap_or_default().to_string())
    } else {
        AttributeValue::Text(attribute.string_value().unwrap_or_default().to_string())
    }
}

fn convert_message(message: aws_sdk_sqs::types::Message) -> Result<QueueMessage, QueueError> {
    let id = MessageId::from_str(message.message_id().unwrap_or_default())?;
    let receipt = ReceiptHandle::new(message.receipt_handle().unwrap_or_default().to_string())?;
    let body = message.body().unwrap_or_default().to_string();

    let mut system = SystemAttributes::default();
    if let Some(raw) = message.attributes() {
        system.sent_at = raw
            .get(&MessageSystemAttributeName::SentTimestamp)
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(Timestamp::from_epoch_millis);
        system.first_received_at = raw
            .get(&MessageSystemAttributeName::ApproximateFirstReceiveTimestamp)
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(Timestamp::from_epoch_millis);
        system.receive_count = raw
            .get(&MessageSystemAttributeName::ApproximateReceiveCount)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        system.sender_id = raw
            .get(&MessageSystemAttributeName::SenderId)
            .cloned();
    }

    let attributes = message
        .message_attributes()
        .map(|raw| {
            raw.iter()
                .map(|(key, value)| (key.clone(), from_sdk_attribute(value)))
                .collect()
        })
        .unwrap_or_default();

    Ok(QueueMessage {
        id,
        receipt,
        body,
        system,
        attributes,
    })
}

// ============================================================================
// SqsApi
// ============================================================================

/// SQS-backed implementation of the primitive queue API.
///
/// ## Thread Safety
///
/// The client is thread-safe and can be shared across async tasks using
/// `Arc`. The queue-URL cache is protected by `RwLock`.
pub struct SqsApi {
    client: aws_sdk_sqs::Client,
    queue_url_cache: Arc<RwLock<HashMap<QueueName, String>>>,
}

impl SqsApi {
    /// Create a provider over an existing SQS client
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self {
            client,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a provider from the ambient AWS environment
    ///
    /// Credentials and region resolve through the standard AWS chain
    /// (environment, profile, instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::from_env().load().await;
        Self::new(aws_sdk_sqs::Client::new(&config))
    }

    /// Resolve the URL for a queue name, consulting the cache first
    async fn queue_url(&self, queue: &QueueName) -> Result<String, QueueError> {
        if let Some(url) = self.queue_url_cache.read().await.get(queue) {
            return Ok(url.clone());
        }

        let output = self
            .client
            .get_queue_url()
            .queue_name(queue.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        let url = output.queue_url().unwrap_or_default().to_string();
        if url.is_empty() {
            return Err(QueueError::ProviderError {
                provider: PROVIDER.to_string(),
                code: "MissingQueueUrl".to_string(),
                message: format!("no URL returned for queue '{}'", queue),
            });
        }

        self.queue_url_cache
            .write()
            .await
            .insert(queue.clone(), url.clone());
        Ok(url)
    }
}

#[async_trait]
impl QueueApi for SqsApi {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, QueueError> {
        let url = self.queue_url(queue).await?;

        let mut request = self
            .client
            .send_message()
            .queue_url(url)
            .message_body(&message.body);
        if let Some(delay) = message.delay_seconds {
            request = request.delay_seconds(delay as i32);
        }
        if let Some(group_id) = &message.group_id {
            request = request.message_group_id(group_id);
        }
        if let Some(deduplication_id) = &message.deduplication_id {
            request = request.message_deduplication_id(deduplication_id);
        }
        for (key, value) in &message.attributes {
            request = request.message_attributes(key, to_sdk_attribute(key, value)?);
        }

        let output = request.send().await.map_err(|e| map_sdk_error(queue, e))?;

        Ok(SendReceipt {
            message_id: MessageId::from_str(output.message_id().unwrap_or_default())?,
            sequence_number: output.sequence_number().map(str::to_string),
        })
    }

    async fn send_message_batch(
        &self,
        queue: &QueueName,
        entries: &[BatchEntry],
    ) -> Result<BatchSendOutcome, QueueError> {
        crate::batch::ensure_within_ceiling(entries, MAX_BATCH_ENTRIES)?;

        let url = self.queue_url(queue).await?;

        let mut request_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut builder = SendMessageBatchRequestEntry::builder()
                .id(&entry.id)
                .message_body(&entry.message.body);
            if let Some(delay) = entry.message.delay_seconds {
                builder = builder.delay_seconds(delay as i32);
            }
            if let Some(group_id) = &entry.message.group_id {
                builder = builder.message_group_id(group_id);
            }
            if let Some(deduplication_id) = &entry.message.deduplication_id {
                builder = builder.message_deduplication_id(deduplication_id);
            }
            for (key, value) in &entry.message.attributes {
                builder = builder.message_attributes(key, to_sdk_attribute(key, value)?);
            }

            let built = builder.build().map_err(|e| QueueError::ProviderError {
                provider: PROVIDER.to_string(),
                code: "InvalidBatchEntry".to_string(),
                message: e.to_string(),
            })?;
            request_entries.push(built);
        }

        let output = self
            .client
            .send_message_batch()
            .queue_url(url)
            .set_entries(Some(request_entries))
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        let mut outcome = BatchSendOutcome::default();
        for success in output.successful() {
            outcome.successful.push(BatchSendSuccess {
                entry_id: success.id().to_string(),
                message_id: MessageId::from_str(success.message_id())?,
                sequence_number: success.sequence_number().map(str::to_string),
            });
        }
        for failure in output.failed() {
            outcome.failed.push(BatchEntryFailure {
                entry_id: failure.id().to_string(),
                code: failure.code().to_string(),
                message: failure.message().unwrap_or_default().to_string(),
                sender_fault: failure.sender_fault(),
            });
        }

        Ok(outcome)
    }

    async fn receive_messages(
        &self,
        queue: &QueueName,
        request: &ReceiveRequest,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let url = self.queue_url(queue).await?;

        let mut call = self
            .client
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(request.max_messages as i32)
            .wait_time_seconds(request.wait_time_seconds as i32)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All");
        if let Some(visibility) = request.visibility_timeout {
            call = call.visibility_timeout(visibility as i32);
        }

        let output = call.send().await.map_err(|e| map_sdk_error(queue, e))?;

        output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(convert_message)
            .collect()
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let url = self.queue_url(queue).await?;

        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(receipt.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        Ok(())
    }

    async fn delete_message_batch(
        &self,
        queue: &QueueName,
        entries: &[DeleteEntry],
    ) -> Result<BatchDeleteOutcome, QueueError> {
        crate::batch::ensure_within_ceiling(entries, MAX_BATCH_ENTRIES)?;

        let url = self.queue_url(queue).await?;

        let mut request_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let built = DeleteMessageBatchRequestEntry::builder()
                .id(&entry.id)
                .receipt_handle(entry.receipt.as_str())
                .build()
                .map_err(|e| QueueError::ProviderError {
                    provider: PROVIDER.to_string(),
                    code: "InvalidBatchEntry".to_string(),
                    message: e.to_string(),
                })?;
            request_entries.push(built);
        }

        let output = self
            .client
            .delete_message_batch()
            .queue_url(url)
            .set_entries(Some(request_entries))
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        let mut outcome = BatchDeleteOutcome::default();
        for success in output.successful() {
            outcome.successful_ids.push(success.id().to_string());
        }
        for failure in output.failed() {
            outcome.failed.push(BatchEntryFailure {
                entry_id: failure.id().to_string(),
                code: failure.code().to_string(),
                message: failure.message().unwrap_or_default().to_string(),
                sender_fault: failure.sender_fault(),
            });
        }

        Ok(outcome)
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<(), QueueError> {
        let url = self.queue_url(queue).await?;

        self.client
            .change_message_visibility()
            .queue_url(url)
            .receipt_handle(receipt.as_str())
            .visibility_timeout(visibility_timeout as i32)
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        Ok(())
    }

    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &HashMap<QueueAttributeKey, String>,
    ) -> Result<(), QueueError> {
        let mut request = self.client.create_queue().queue_name(queue.as_str());
        for (key, value) in attributes {
            request = request.attributes(QueueAttributeName::from(key.as_str()), value);
        }

        let output = request.send().await.map_err(|e| map_sdk_error(queue, e))?;

        if let Some(url) = output.queue_url() {
            self.queue_url_cache
                .write()
                .await
                .insert(queue.clone(), url.to_string());
        }

        Ok(())
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<(), QueueError> {
        let url = self.queue_url(queue).await?;

        self.client
            .delete_queue()
            .queue_url(url)
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        self.queue_url_cache.write().await.remove(queue);
        Ok(())
    }

    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, QueueError> {
        match self.queue_url(queue).await {
            Ok(_) => Ok(true),
            Err(QueueError::QueueNotFound { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    async fn queue_attributes(
        &self,
        queue: &QueueName,
    ) -> Result<HashMap<String, String>, QueueError> {
        let url = self.queue_url(queue).await?;

        let output = self
            .client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| map_sdk_error(queue, e))?;

        Ok(output
            .attributes()
            .map(|raw| {
                raw.iter()
                    .map(|(key, value)| (key.as_str().to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
