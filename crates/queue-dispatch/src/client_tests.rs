//! Contract tests for the primitive queue API.

use super::*;
use crate::attributes::default_attributes;
use crate::batch::{build_delete_entries, build_entries};
use crate::error::QueueError;
use crate::providers::InMemoryApi;

async fn create_queue<A: QueueApi>(api: &A, name: &str) -> QueueName {
    let queue = QueueName::new(name.to_string()).unwrap();
    api.create_queue(&queue, &default_attributes())
        .await
        .expect("Setup: create queue should succeed");
    queue
}

// ============================================================================
// Contract Tests - QueueApi
// ============================================================================

/// Contract test helper validating single send and receive
async fn test_send_receive_round_trip<A: QueueApi>(api: &A, queue: &QueueName) {
    // Arrange
    let message = OutboundMessage::new("hello");

    // Act
    let receipt = api.send_message(queue, &message).await;

    // Assert
    assert!(receipt.is_ok(), "Send should succeed");
    assert!(!receipt.unwrap().message_id.as_str().is_empty());

    let received = api
        .receive_messages(queue, &ReceiveRequest::new())
        .await
        .expect("Receive should succeed");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body, "hello");
    assert!(!received[0].receipt.as_str().is_empty());
}

/// Sending to an unknown queue is a provider error, not a silent create
async fn test_send_to_unknown_queue_fails<A: QueueApi>(api: &A) {
    // Arrange
    let queue = QueueName::new("does-not-exist".to_string()).unwrap();

    // Act
    let result = api
        .send_message(&queue, &OutboundMessage::new("x"))
        .await;

    // Assert
    match result {
        Err(QueueError::QueueNotFound { queue_name }) => {
            assert_eq!(queue_name, "does-not-exist");
        }
        other => panic!("Expected QueueNotFound, got: {:?}", other),
    }
}

/// Deleting a received message prevents redelivery
async fn test_delete_prevents_redelivery<A: QueueApi>(api: &A, queue: &QueueName) {
    // Arrange
    api.send_message(queue, &OutboundMessage::new("once"))
        .await
        .expect("Setup: send should succeed");
    let received = api
        .receive_messages(queue, &ReceiveRequest::new())
        .await
        .expect("Setup: receive should succeed");

    // Act
    let result = api.delete_message(queue, &received[0].receipt).await;

    // Assert
    assert!(result.is_ok(), "Delete should succeed");
    let again = api
        .receive_messages(queue, &ReceiveRequest::new())
        .await
        .expect("Recheck should not error");
    assert!(again.is_empty(), "Deleted message should not reappear");
}

/// Batch send covers every entry with a per-entry outcome
async fn test_batch_send_outcome<A: QueueApi>(api: &A, queue: &QueueName) {
    // Arrange
    let entries = build_entries(vec![
        OutboundMessage::new("one"),
        OutboundMessage::new("two"),
        OutboundMessage::new("three"),
    ]);

    // Act
    let outcome = api
        .send_message_batch(queue, &entries)
        .await
        .expect("Batch send should succeed");

    // Assert
    assert!(outcome.is_complete_success());
    assert_eq!(outcome.len(), 3);
    let ids: Vec<&str> = outcome
        .successful
        .iter()
        .map(|entry| entry.entry_id.as_str())
        .collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
}

/// Batch delete removes everything received
async fn test_batch_delete<A: QueueApi>(api: &A, queue: &QueueName) {
    // Arrange
    for index in 0..3 {
        api.send_message(queue, &OutboundMessage::new(format!("d-{}", index)))
            .await
            .expect("Setup: send should succeed");
    }
    let received = api
        .receive_messages(queue, &ReceiveRequest::new().with_max_messages(3))
        .await
        .expect("Setup: receive should succeed");
    let entries = build_delete_entries(received.into_iter().map(|m| m.receipt).collect());

    // Act
    let outcome = api
        .delete_message_batch(queue, &entries)
        .await
        .expect("Batch delete should succeed");

    // Assert
    assert!(outcome.is_complete_success());
    assert_eq!(outcome.successful_ids.len(), 3);
}

/// Queue lifecycle: exists after create, gone after delete
async fn test_queue_lifecycle<A: QueueApi>(api: &A, name: &str) {
    // Arrange
    let queue = QueueName::new(name.to_string()).unwrap();
    assert!(!api.queue_exists(&queue).await.unwrap());

    // Act
    api.create_queue(&queue, &default_attributes())
        .await
        .expect("Create should succeed");

    // Assert
    assert!(api.queue_exists(&queue).await.unwrap());
    api.delete_queue(&queue).await.expect("Delete should succeed");
    assert!(!api.queue_exists(&queue).await.unwrap());
}

// ============================================================================
// Contract Runs Against the In-Memory Provider
// ============================================================================

#[tokio::test]
async fn test_in_memory_send_receive_round_trip() {
    let api = InMemoryApi::new();
    let queue = create_queue(&api, "contract-round-trip").await;
    test_send_receive_round_trip(&api, &queue).await;
}

#[tokio::test]
async fn test_in_memory_send_to_unknown_queue() {
    let api = InMemoryApi::new();
    test_send_to_unknown_queue_fails(&api).await;
}

#[tokio::test]
async fn test_in_memory_delete_prevents_redelivery() {
    let api = InMemoryApi::new();
    let queue = create_queue(&api, "contract-delete").await;
    test_delete_prevents_redelivery(&api, &queue).await;
}

#[tokio::test]
async fn test_in_memory_batch_send_outcome() {
    let api = InMemoryApi::new();
    let queue = create_queue(&api, "contract-batch").await;
    test_batch_send_outcome(&api, &queue).await;
}

#[tokio::test]
async fn test_in_memory_batch_delete() {
    let api = InMemoryApi::new();
    let queue = create_queue(&api, "contract-batch-delete").await;
    test_batch_delete(&api, &queue).await;
}

#[tokio::test]
async fn test_in_memory_queue_lifecycle() {
    let api = InMemoryApi::new();
    test_queue_lifecycle(&api, "contract-lifecycle").await;
}

// ============================================================================
// Request and Outcome Types
// ============================================================================

#[test]
fn test_outbound_message_builders() {
    // Act
    let message = OutboundMessage::new("body")
        .with_delay_seconds(30)
        .with_group_id("group-1")
        .with_deduplication_id("dedup-1")
        .with_attribute("trace", AttributeValue::text("abc"));

    // Assert
    assert_eq!(message.body, "body");
    assert_eq!(message.delay_seconds, Some(30));
    assert_eq!(message.group_id.as_deref(), Some("group-1"));
    assert_eq!(message.deduplication_id.as_deref(), Some("dedup-1"));
    assert_eq!(message.attributes.len(), 1);
}

#[test]
fn test_receive_request_defaults() {
    let request = ReceiveRequest::default();
    assert_eq!(request.max_messages, 1);
    assert_eq!(request.wait_time_seconds, 0);
    assert!(request.visibility_timeout.is_none());
}

#[test]
fn test_batch_outcome_extend_preserves_order() {
    // Arrange
    let mut first = BatchSendOutcome {
        successful: vec![BatchSendSuccess {
            entry_id: "0".to_string(),
            message_id: MessageId::new(),
            sequence_number: None,
        }],
        failed: Vec::new(),
    };
    let second = BatchSendOutcome {
        successful: vec![BatchSendSuccess {
            entry_id: "1".to_string(),
            message_id: MessageId::new(),
            sequence_number: None,
        }],
        failed: vec![BatchEntryFailure {
            entry_id: "2".to_string(),
            code: "InternalError".to_string(),
            message: String::new(),
            sender_fault: false,
        }],
    };

    // Act
    first.extend(second);

    // Assert
    assert_eq!(first.len(), 3);
    assert_eq!(first.successful[0].entry_id, "0");
    assert_eq!(first.successful[1].entry_id, "1");
    assert!(!first.is_complete_success());
}
