//! Tests for the in-memory provider.

use super::*;
use crate::attributes::default_attributes;
use crate::batch::build_delete_entries;
use crate::client::{OutboundMessage, ReceiveRequest};
use crate::error::QueueError;

async fn queue_named(api: &InMemoryApi, name: &str) -> QueueName {
    let queue = QueueName::new(name.to_string()).unwrap();
    api.create_queue(&queue, &default_attributes()).await.unwrap();
    queue
}

// ============================================================================
// Visibility and Redelivery
// ============================================================================

#[tokio::test]
async fn test_received_message_is_hidden_until_visibility_expires() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-visibility").await;
    api.send_message(&queue, &OutboundMessage::new("hidden"))
        .await
        .unwrap();

    // Act - receive with a short visibility timeout
    let request = ReceiveRequest::new().with_visibility_timeout(1);
    let first = api.receive_messages(&queue, &request).await.unwrap();
    assert_eq!(first.len(), 1);

    // Assert - invisible while in flight
    let during = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();
    assert!(during.is_empty(), "In-flight message should be hidden");

    // After expiry the message comes back with a bumped receive count
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let redelivered = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].system.receive_count, 2);
    assert!(redelivered[0].system.first_received_at.is_some());
}

#[tokio::test]
async fn test_delayed_message_not_visible_before_delay() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-delay").await;
    api.send_message(&queue, &OutboundMessage::new("later").with_delay_seconds(1))
        .await
        .unwrap();

    // Act / Assert
    let now = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();
    assert!(now.is_empty(), "Delayed message should not be visible yet");

    let attributes = api.queue_attributes(&queue).await.unwrap();
    assert_eq!(
        attributes.get("ApproximateNumberOfMessagesDelayed"),
        Some(&"1".to_string())
    );
}

#[tokio::test]
async fn test_long_poll_returns_early_when_message_arrives() {
    // Arrange
    let api = std::sync::Arc::new(InMemoryApi::new());
    let queue = queue_named(api.as_ref(), "mem-long-poll").await;

    let sender_api = std::sync::Arc::clone(&api);
    let sender_queue = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        sender_api
            .send_message(&sender_queue, &OutboundMessage::new("late arrival"))
            .await
            .unwrap();
    });

    // Act - wait up to 5 seconds, expect the message well before that
    let started = std::time::Instant::now();
    let request = ReceiveRequest::new().with_wait_time_seconds(5);
    let messages = api.receive_messages(&queue, &request).await.unwrap();

    // Assert
    assert_eq!(messages.len(), 1);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
}

// ============================================================================
// Deletes and Receipts
// ============================================================================

#[tokio::test]
async fn test_delete_with_stale_receipt_fails() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-stale").await;

    // Act
    let receipt = ReceiptHandle::new("never-issued".to_string()).unwrap();
    let result = api.delete_message(&queue, &receipt).await;

    // Assert
    assert!(matches!(result, Err(QueueError::MessageNotFound { .. })));
}

#[tokio::test]
async fn test_batch_delete_reports_per_entry_failures() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-batch-delete").await;
    api.send_message(&queue, &OutboundMessage::new("real"))
        .await
        .unwrap();
    let received = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();

    let mut receipts = vec![received[0].receipt.clone()];
    receipts.push(ReceiptHandle::new("bogus".to_string()).unwrap());
    let entries = build_delete_entries(receipts);

    // Act
    let outcome = api.delete_message_batch(&queue, &entries).await.unwrap();

    // Assert - one entry succeeds, one fails, the call itself succeeds
    assert_eq!(outcome.successful_ids, vec!["0".to_string()]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].entry_id, "1");
    assert!(outcome.failed[0].sender_fault);
}

#[tokio::test]
async fn test_change_visibility_extends_the_hold() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-extend").await;
    api.send_message(&queue, &OutboundMessage::new("held"))
        .await
        .unwrap();
    let received = api
        .receive_messages(&queue, &ReceiveRequest::new().with_visibility_timeout(1))
        .await
        .unwrap();

    // Act - push the visibility out past the original one second
    api.change_message_visibility(&queue, &received[0].receipt, 30)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    // Assert
    let redelivered = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();
    assert!(
        redelivered.is_empty(),
        "Extended message should still be hidden"
    );
}

// ============================================================================
// FIFO and Attribute Probes
// ============================================================================

#[tokio::test]
async fn test_fifo_queue_assigns_sequence_numbers() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-order.fifo").await;

    // Act
    let first = api
        .send_message(
            &queue,
            &OutboundMessage::new("a").with_group_id("g").with_deduplication_id("d1"),
        )
        .await
        .unwrap();
    let second = api
        .send_message(
            &queue,
            &OutboundMessage::new("b").with_group_id("g").with_deduplication_id("d2"),
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(first.sequence_number.as_deref(), Some("1"));
    assert_eq!(second.sequence_number.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_queue_attributes_track_counts() {
    // Arrange
    let api = InMemoryApi::new();
    let queue = queue_named(&api, "mem-counts").await;
    for index in 0..3 {
        api.send_message(&queue, &OutboundMessage::new(format!("m-{}", index)))
            .await
            .unwrap();
    }
    let _held = api
        .receive_messages(&queue, &ReceiveRequest::new())
        .await
        .unwrap();

    // Act
    let attributes = api.queue_attributes(&queue).await.unwrap();

    // Assert - one in flight, two still visible
    assert_eq!(
        attributes.get("ApproximateNumberOfMessages"),
        Some(&"2".to_string())
    );
    assert_eq!(
        attributes.get("ApproximateNumberOfMessagesNotVisible"),
        Some(&"1".to_string())
    );
}
