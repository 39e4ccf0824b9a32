//! Tests for operation descriptors and client definitions.

use super::*;
use crate::error::{ConfigurationError, QueueError};

fn assert_configuration_error(result: Result<(), QueueError>) {
    match result {
        Err(QueueError::ConfigurationError(_)) => {}
        other => panic!("Expected ConfigurationError, got: {:?}", other),
    }
}

// ============================================================================
// Descriptor Builders
// ============================================================================

#[test]
fn test_send_descriptor_defaults() {
    // Act
    let descriptor = OperationDescriptor::send();

    // Assert
    assert_eq!(descriptor.kind, OperationKind::Send);
    assert!(descriptor.queue.is_none());
    assert_eq!(descriptor.delay_seconds, 0);
    assert!(!descriptor.fifo);
    assert!(!descriptor.auto_delete);
}

#[test]
fn test_descriptor_builder_chain() {
    // Act
    let descriptor = OperationDescriptor::receive()
        .with_queue("orders")
        .with_max_messages(5)
        .with_wait_time_seconds(20)
        .auto_delete();

    // Assert
    assert_eq!(descriptor.queue.as_deref(), Some("orders"));
    assert_eq!(descriptor.max_messages, Some(5));
    assert_eq!(descriptor.wait_time_seconds, Some(20));
    assert!(descriptor.auto_delete);
}

// ============================================================================
// Descriptor Validation
// ============================================================================

#[test]
fn test_valid_descriptors_pass() {
    let cases = [
        OperationDescriptor::send().with_queue("orders").with_delay_seconds(900),
        OperationDescriptor::send().fifo(),
        OperationDescriptor::send_batch().with_batch_size(10),
        OperationDescriptor::receive().with_max_messages(10).auto_delete(),
        OperationDescriptor::start_poll().with_wait_time_seconds(20),
    ];

    for descriptor in cases {
        assert!(descriptor.validate("Client", "op").is_ok());
    }
}

#[test]
fn test_delay_over_ceiling_is_a_configuration_error() {
    let descriptor = OperationDescriptor::send().with_delay_seconds(901);
    assert_configuration_error(descriptor.validate("Client", "op"));
}

#[test]
fn test_settings_must_match_kind() {
    // Each setting is only meaningful on its operation kind
    let mismatched = [
        OperationDescriptor::receive().with_delay_seconds(5),
        OperationDescriptor::send_batch().fifo(),
        OperationDescriptor::send().with_batch_size(5),
        OperationDescriptor::send().with_max_messages(5),
        OperationDescriptor::start_poll().auto_delete(),
        OperationDescriptor::send().with_wait_time_seconds(5),
    ];

    for descriptor in mismatched {
        assert_configuration_error(descriptor.validate("Client", "op"));
    }
}

#[test]
fn test_numeric_settings_are_range_checked() {
    let out_of_range = [
        OperationDescriptor::send_batch().with_batch_size(0),
        OperationDescriptor::send_batch().with_batch_size(11),
        OperationDescriptor::receive().with_max_messages(0),
        OperationDescriptor::receive().with_max_messages(11),
        OperationDescriptor::start_poll().with_wait_time_seconds(21),
    ];

    for descriptor in out_of_range {
        assert_configuration_error(descriptor.validate("Client", "op"));
    }
}

#[test]
fn test_declared_queue_name_is_validated() {
    let descriptor = OperationDescriptor::send().with_queue("not a queue!");
    assert_configuration_error(descriptor.validate("Client", "op"));
}

// ============================================================================
// Client Definitions
// ============================================================================

#[test]
fn test_definition_collects_operations_in_order() {
    // Act
    let definition = ClientDefinition::builder("OrderClient")
        .operation("send_order", OperationDescriptor::send().with_queue("orders"))
        .operation("drain", OperationDescriptor::receive().with_queue("orders"))
        .build();

    // Assert
    assert_eq!(definition.name(), "OrderClient");
    let names: Vec<&str> = definition
        .operations()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["send_order", "drain"]);
    assert!(definition.validate().is_ok());
}

#[test]
fn test_definition_rejects_blank_client_name() {
    let definition = ClientDefinition::builder("  ")
        .operation("op", OperationDescriptor::send())
        .build();
    assert_configuration_error(definition.validate());
}

#[test]
fn test_definition_rejects_empty_operation_table() {
    let definition = ClientDefinition::builder("EmptyClient").build();
    assert_configuration_error(definition.validate());
}

#[test]
fn test_definition_rejects_duplicate_operation_names() {
    // Arrange
    let definition = ClientDefinition::builder("DupClient")
        .operation("send", OperationDescriptor::send().with_queue("a"))
        .operation("send", OperationDescriptor::send().with_queue("b"))
        .build();

    // Act / Assert
    match definition.validate() {
        Err(QueueError::ConfigurationError(ConfigurationError::DuplicateOperation {
            client,
            operation,
        })) => {
            assert_eq!(client, "DupClient");
            assert_eq!(operation, "send");
        }
        other => panic!("Expected DuplicateOperation, got: {:?}", other),
    }
}

#[test]
fn test_definition_rejects_blank_operation_name() {
    let definition = ClientDefinition::builder("Client")
        .operation("", OperationDescriptor::send())
        .build();
    assert_configuration_error(definition.validate());
}

#[test]
fn test_definition_surfaces_descriptor_errors() {
    let definition = ClientDefinition::builder("Client")
        .operation("bad", OperationDescriptor::send().with_delay_seconds(10_000))
        .build();
    assert_configuration_error(definition.validate());
}
