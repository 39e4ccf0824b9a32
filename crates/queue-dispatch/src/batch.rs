//! Batch validation and entry construction.
//!
//! Stateless helpers shared by the orchestration layer and the providers.
//! All checks happen before any provider call is issued.

use crate::client::OutboundMessage;
use crate::error::{QueueError, ValidationError};
use crate::message::ReceiptHandle;
use std::collections::HashSet;

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;

/// Provider ceiling on entries per batch call (send and delete).
///
/// https://docs.aws.amazon.com/AWSSimpleQueueService/latest/APIReference/API_SendMessageBatch.html
pub const MAX_BATCH_ENTRIES: usize = 10;

/// One entry of a batch send call
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Identifier unique within the call; echoed back in the outcome
    pub id: String,
    pub message: OutboundMessage,
}

/// One entry of a batch delete call
#[derive(Debug, Clone)]
pub struct DeleteEntry {
    pub id: String,
    pub receipt: ReceiptHandle,
}

/// Reject collections that are empty, unless the caller allows them
pub fn require_elements<T>(items: &[T], field: &str, allow_empty: bool) -> Result<(), QueueError> {
    if items.is_empty() && !allow_empty {
        return Err(ValidationError::Required {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Reject collections larger than the per-call ceiling
pub fn ensure_within_ceiling<T>(items: &[T], ceiling: usize) -> Result<(), QueueError> {
    if items.len() > ceiling {
        return Err(QueueError::BatchTooLarge {
            size: items.len(),
            max_size: ceiling,
        });
    }
    Ok(())
}

/// Validate a caller-supplied id set against its payloads.
///
/// Ids must be non-blank, unique, and equal in count to the payloads they
/// label.
pub fn validate_custom_ids(ids: &[String], payload_count: usize) -> Result<(), QueueError> {
    if ids.len() != payload_count {
        return Err(ValidationError::InvalidFormat {
            field: "entry_ids".to_string(),
            message: format!("{} ids supplied for {} payloads", ids.len(), payload_count),
        }
        .into());
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "entry_ids".to_string(),
            }
            .into());
        }
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::InvalidFormat {
                field: "entry_ids".to_string(),
                message: format!("duplicate id '{}'", id),
            }
            .into());
        }
    }

    Ok(())
}

/// Build batch entries with sequential string ids
pub fn build_entries(messages: Vec<OutboundMessage>) -> Vec<BatchEntry> {
    messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| BatchEntry {
            id: index.to_string(),
            message,
        })
        .collect()
}

/// Build batch entries labelled with caller-supplied ids
pub fn build_entries_with_ids(
    ids: &[String],
    messages: Vec<OutboundMessage>,
) -> Result<Vec<BatchEntry>, QueueError> {
    validate_custom_ids(ids, messages.len())?;

    Ok(ids
        .iter()
        .cloned()
        .zip(messages)
        .map(|(id, message)| BatchEntry { id, message })
        .collect())
}

/// Build delete entries with sequential string ids
pub fn build_delete_entries(receipts: Vec<ReceiptHandle>) -> Vec<DeleteEntry> {
    receipts
        .into_iter()
        .enumerate()
        .map(|(index, receipt)| DeleteEntry {
            id: index.to_string(),
            receipt,
        })
        .collect()
}

/// Split entries into ceiling-sized chunks, preserving order
pub fn chunk_entries<T>(entries: Vec<T>, ceiling: usize) -> Vec<Vec<T>> {
    let ceiling = ceiling.max(1);
    let mut chunks = Vec::with_capacity(entries.len().div_ceil(ceiling));
    let mut current = Vec::with_capacity(ceiling);

    for entry in entries {
        current.push(entry);
        if current.len() == ceiling {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(ceiling)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
