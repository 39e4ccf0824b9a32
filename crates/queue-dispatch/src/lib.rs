//! # Queue Dispatch
//!
//! Declarative queue client runtime: declare queue operations once as a named
//! table, then dispatch calls that are validated, serialized, batched and
//! routed onto a minimal provider API.
//!
//! This library provides:
//! - A declaration surface (client definitions with per-operation descriptors)
//! - A dispatch core with send routing, argument binding and a blocking facade
//! - Orchestration for chunked batch sends and receive-process workflows
//! - Continuous polling with per-queue cooperative cancellation
//! - AWS SQS and in-memory provider implementations
//!
//! ## Module Organization
//!
//! - [error] - Error types for all queue operations
//! - [message] - Message structures, identifiers and attributes
//! - [serializer] - Payload serialization to and from wire strings
//! - [batch] - Batch validation and entry construction
//! - [attributes] - Queue attribute translation and presets
//! - [client] - The primitive provider API
//! - [providers] - SQS and in-memory provider implementations
//! - [config] - Runtime configuration
//! - [service] - Orchestration of declared operations
//! - [polling] - Continuous polling sessions
//! - [descriptor] - Operation descriptors and client definitions
//! - [dispatch] - The dispatch core
//! - [registry] - The client registry

// Module declarations
pub mod attributes;
pub mod batch;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod polling;
pub mod providers;
pub mod registry;
pub mod serializer;
pub mod service;

// Re-export commonly used types at crate root for convenience
pub use client::{
    BatchDeleteOutcome, BatchEntryFailure, BatchSendOutcome, BatchSendSuccess, OutboundMessage,
    QueueApi, ReceiveRequest, SendReceipt,
};
pub use config::DispatchConfig;
pub use descriptor::{ClientDefinition, OperationDescriptor, OperationKind};
pub use dispatch::{CallArguments, DeclaredQueueClient, DispatchOutcome};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    AttributeValue, MessageId, QueueMessage, QueueName, ReceiptHandle, SystemAttributes, Timestamp,
};
pub use polling::{PollSettings, PollingState};
pub use providers::{InMemoryApi, SqsApi};
pub use registry::ClientRegistry;
pub use serializer::{JsonSerializer, MessageSerializer};
pub use service::{handler_fn, FnHandler, MessageHandler, QueueService};

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
