//! Tests for message types and identifiers.

use super::*;
use bytes::Bytes;

// ============================================================================
// QueueName
// ============================================================================

#[test]
fn test_queue_name_accepts_valid_names() {
    for name in ["orders", "order-events_2", "a", "payments.fifo"] {
        assert!(
            QueueName::new(name.to_string()).is_ok(),
            "'{}' should be valid",
            name
        );
    }
}

#[test]
fn test_queue_name_rejects_empty_and_too_long() {
    assert!(QueueName::new(String::new()).is_err());
    assert!(QueueName::new("x".repeat(81)).is_err());
    // The suffix alone is not a name
    assert!(QueueName::new(".fifo".to_string()).is_err());
}

#[test]
fn test_queue_name_rejects_invalid_characters() {
    for name in ["or ders", "orders!", "café"] {
        assert!(
            QueueName::new(name.to_string()).is_err(),
            "'{}' should be rejected",
            name
        );
    }
}

#[test]
fn test_queue_name_prefix() {
    // Act
    let name = QueueName::with_prefix("dev-", "orders").unwrap();

    // Assert
    assert_eq!(name.as_str(), "dev-orders");
}

#[test]
fn test_queue_name_fifo_detection() {
    assert!(QueueName::new("payments.fifo".to_string()).unwrap().is_fifo());
    assert!(!QueueName::new("payments".to_string()).unwrap().is_fifo());
}

// ============================================================================
// MessageId / ReceiptHandle
// ============================================================================

#[test]
fn test_message_id_generation_is_unique() {
    let first = MessageId::new();
    let second = MessageId::new();
    assert_ne!(first, second);
}

#[test]
fn test_message_id_rejects_empty() {
    assert!("".parse::<MessageId>().is_err());
    assert!("abc-123".parse::<MessageId>().is_ok());
}

#[test]
fn test_receipt_handle_rejects_blank() {
    assert!(ReceiptHandle::new(String::new()).is_err());
    assert!(ReceiptHandle::new("   ".to_string()).is_err());
    assert!(ReceiptHandle::new("AQEB...".to_string()).is_ok());
}

// ============================================================================
// Timestamp
// ============================================================================

#[test]
fn test_timestamp_from_epoch_millis() {
    // Arrange
    let timestamp = Timestamp::from_epoch_millis(1_700_000_000_000).unwrap();

    // Assert
    assert_eq!(timestamp.as_datetime().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn test_timestamp_ordering() {
    let earlier = Timestamp::from_epoch_millis(1_000).unwrap();
    let later = Timestamp::from_epoch_millis(2_000).unwrap();
    assert!(earlier < later);
}

// ============================================================================
// AttributeValue
// ============================================================================

#[test]
fn test_attribute_value_data_types() {
    assert_eq!(AttributeValue::text("a").data_type(), "String");
    assert_eq!(AttributeValue::number(42).data_type(), "Number");
    assert_eq!(
        AttributeValue::binary(Bytes::from_static(b"\x01\x02")).data_type(),
        "Binary"
    );
}

#[test]
fn test_attribute_value_accessors() {
    // Arrange
    let text = AttributeValue::text("hello");
    let number = AttributeValue::number(7);
    let binary = AttributeValue::binary(Bytes::from_static(b"raw"));

    // Assert
    assert_eq!(text.as_text(), Some("hello"));
    assert_eq!(number.as_number(), Some("7"));
    assert_eq!(binary.as_binary(), Some(&Bytes::from_static(b"raw")));
    assert_eq!(text.as_number(), None);
    assert_eq!(binary.as_text(), None);
}

#[test]
fn test_binary_attribute_clones_share_content() {
    // Bytes hands out cheap immutable views; a clone always reads the same
    // content as the original.
    let original = AttributeValue::binary(Bytes::from(vec![1u8, 2, 3]));
    let cloned = original.clone();
    assert_eq!(original, cloned);
}

// ============================================================================
// QueueMessage
// ============================================================================

#[test]
fn test_queue_message_attribute_lookup() {
    // Arrange
    let message = QueueMessage {
        id: MessageId::new(),
        receipt: ReceiptHandle::new("r-1".to_string()).unwrap(),
        body: "{}".to_string(),
        system: SystemAttributes::default(),
        attributes: std::collections::HashMap::from([(
            "trace".to_string(),
            AttributeValue::text("abc"),
        )]),
    };

    // Assert
    assert_eq!(
        message.attribute("trace").and_then(AttributeValue::as_text),
        Some("abc")
    );
    assert!(message.attribute("missing").is_none());
}
