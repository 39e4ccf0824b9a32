//! Dispatch core: binds call arguments to a declared operation and routes it
//! to the orchestration service.
//!
//! Every call runs the same pipeline: resolve the operation's descriptor,
//! merge per-call arguments over its defaults, apply the configured
//! queue-name prefix, validate completeness for the operation kind, then
//! route. Configuration and caller errors surface before any provider call;
//! provider errors propagate unchanged. Reflective identity queries never
//! touch the service at all.

use crate::client::{BatchSendOutcome, SendReceipt};
use crate::descriptor::{ClientDefinition, OperationDescriptor, OperationKind};
use crate::error::{ConfigurationError, QueueError, SerializationError, ValidationError};
use crate::message::{AttributeValue, QueueMessage, QueueName};
use crate::service::{MessageHandler, QueueService};
use serde::Serialize;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

// ============================================================================
// Call Arguments
// ============================================================================

/// Per-call arguments, bound to explicit roles.
///
/// Every value states the role it fills; nothing is inferred from position
/// or type. Created per call and discarded after dispatch.
#[derive(Default)]
pub struct CallArguments {
    queue: Option<String>,
    body: Option<Value>,
    bodies: Vec<Value>,
    attributes: HashMap<String, AttributeValue>,
    group_id: Option<String>,
    deduplication_id: Option<String>,
    max_messages: Option<u32>,
    entry_ids: Option<Vec<String>>,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl CallArguments {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the operation's queue name for this call
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the message payload for a send
    pub fn body<T: Serialize>(mut self, payload: &T) -> Result<Self, QueueError> {
        let value = serde_json::to_value(payload).map_err(SerializationError::from)?;
        self.body = Some(value);
        Ok(self)
    }

    /// Set the payload list for a batch send
    pub fn payloads<T: Serialize>(mut self, payloads: &[T]) -> Result<Self, QueueError> {
        let mut bodies = Vec::with_capacity(payloads.len());
        for payload in payloads {
            bodies.push(serde_json::to_value(payload).map_err(SerializationError::from)?);
        }
        self.bodies = bodies;
        Ok(self)
    }

    /// Attach a user attribute to a send
    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set the FIFO message group
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set an explicit FIFO deduplication id
    pub fn with_deduplication_id(mut self, deduplication_id: impl Into<String>) -> Self {
        self.deduplication_id = Some(deduplication_id.into());
        self
    }

    /// Override the operation's receive count for this call
    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Label batch entries with caller-supplied ids
    pub fn with_entry_ids(mut self, entry_ids: Vec<String>) -> Self {
        self.entry_ids = Some(entry_ids);
        self
    }

    /// Set the processor for receive and poll operations
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

/// Result of one dispatched call
#[derive(Debug)]
pub enum DispatchOutcome {
    Sent(SendReceipt),
    SentBatch(BatchSendOutcome),
    Received(Vec<QueueMessage>),
    /// Whether a new polling session was started (`false` on a duplicate
    /// start, which is a warned no-op)
    PollingStarted(bool),
}

impl DispatchOutcome {
    /// The send receipt, when the call was a single send
    pub fn into_receipt(self) -> Option<SendReceipt> {
        match self {
            Self::Sent(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// The batch outcome, when the call was a batch send
    pub fn into_batch(self) -> Option<BatchSendOutcome> {
        match self {
            Self::SentBatch(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// The received messages, when the call was a receive
    pub fn into_messages(self) -> Option<Vec<QueueMessage>> {
        match self {
            Self::Received(messages) => Some(messages),
            _ => None,
        }
    }
}

// ============================================================================
// Declared Client
// ============================================================================

/// A dispatch-bound client built from a [ClientDefinition].
///
/// Holds the resolved operation table and a reference to the orchestration
/// service. Construction validates the whole declaration up front; an
/// instance that exists can dispatch every operation it declares.
pub struct DeclaredQueueClient {
    name: String,
    operations: HashMap<String, OperationDescriptor>,
    service: Arc<QueueService>,
}

impl DeclaredQueueClient {
    pub(crate) fn new(
        definition: ClientDefinition,
        service: Arc<QueueService>,
    ) -> Result<Self, QueueError> {
        definition.validate()?;

        let operations = definition
            .operations()
            .iter()
            .cloned()
            .collect::<HashMap<_, _>>();

        Ok(Self {
            name: definition.name().to_string(),
            operations,
            service,
        })
    }

    /// Declared client name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable hash derived from the declared name
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        hasher.finish()
    }

    /// Reference equality: two handles are the same client only when they
    /// point at the same instance
    pub fn same_instance(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }

    /// Descriptor for a declared operation
    pub fn descriptor(&self, operation: &str) -> Option<&OperationDescriptor> {
        self.operations.get(operation)
    }

    /// Execute a declared operation.
    ///
    /// Routing for sends runs in mutually exclusive priority order: FIFO,
    /// then delayed, then attributed, then plain. Receives route on the
    /// declared auto-delete flag.
    pub async fn dispatch(
        &self,
        operation: &str,
        arguments: CallArguments,
    ) -> Result<DispatchOutcome, QueueError> {
        let descriptor = self.operations.get(operation).ok_or_else(|| {
            ConfigurationError::UnknownOperation {
                client: self.name.clone(),
                operation: operation.to_string(),
            }
        })?;

        let queue = self.resolve_queue(descriptor, &arguments)?;

        match descriptor.kind {
            OperationKind::Send => {
                let body = arguments.body.as_ref().ok_or_else(|| {
                    QueueError::from(ValidationError::Required {
                        field: "body".to_string(),
                    })
                })?;

                let receipt = if descriptor.fifo {
                    let group_id = arguments.group_id.as_deref().ok_or_else(|| {
                        QueueError::from(ValidationError::Required {
                            field: "group_id".to_string(),
                        })
                    })?;
                    self.service
                        .send_fifo(
                            &queue,
                            body,
                            group_id,
                            arguments.deduplication_id.clone(),
                            &arguments.attributes,
                        )
                        .await?
                } else if descriptor.delay_seconds > 0 {
                    self.service
                        .send_delayed(
                            &queue,
                            body,
                            descriptor.delay_seconds,
                            &arguments.attributes,
                        )
                        .await?
                } else if !arguments.attributes.is_empty() {
                    self.service
                        .send_attributed(&queue, body, &arguments.attributes)
                        .await?
                } else {
                    self.service.send_plain(&queue, body).await?
                };

                Ok(DispatchOutcome::Sent(receipt))
            }

            OperationKind::SendBatch => {
                if arguments.bodies.is_empty() {
                    return Err(ValidationError::Required {
                        field: "payloads".to_string(),
                    }
                    .into());
                }

                let outcome = self
                    .service
                    .send_batch(
                        &queue,
                        &arguments.bodies,
                        arguments.entry_ids.as_deref(),
                        descriptor.batch_size,
                    )
                    .await?;
                Ok(DispatchOutcome::SentBatch(outcome))
            }

            OperationKind::Receive => {
                let handler = arguments.handler.clone().ok_or_else(|| {
                    QueueError::from(ValidationError::Required {
                        field: "processor".to_string(),
                    })
                })?;

                let max_messages = arguments
                    .max_messages
                    .or(descriptor.max_messages)
                    .unwrap_or(1);

                let messages = if descriptor.auto_delete {
                    self.service
                        .receive_and_delete(
                            &queue,
                            max_messages,
                            descriptor.wait_time_seconds,
                            handler,
                        )
                        .await?
                } else {
                    self.service
                        .receive_and_process(
                            &queue,
                            max_messages,
                            descriptor.wait_time_seconds,
                            handler,
                        )
                        .await?
                };

                Ok(DispatchOutcome::Received(messages))
            }

            OperationKind::StartPoll => {
                let handler = arguments.handler.clone().ok_or_else(|| {
                    QueueError::from(ValidationError::Required {
                        field: "processor".to_string(),
                    })
                })?;

                let settings = self.service.poll_settings(
                    descriptor.wait_time_seconds,
                    arguments.max_messages.or(descriptor.max_messages),
                );
                let started = self.service.start_polling(&queue, settings, handler).await;
                Ok(DispatchOutcome::PollingStarted(started))
            }
        }
    }

    /// Synchronous facade over [Self::dispatch].
    ///
    /// Inside a runtime this requires the multi-thread flavor; outside any
    /// runtime a one-off current-thread runtime drives the call.
    pub fn dispatch_blocking(
        &self,
        operation: &str,
        arguments: CallArguments,
    ) -> Result<DispatchOutcome, QueueError> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| {
                handle.block_on(self.dispatch(operation, arguments))
            }),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| ConfigurationError::Invalid {
                        message: format!("failed to start runtime for blocking dispatch: {}", e),
                    })?;
                runtime.block_on(self.dispatch(operation, arguments))
            }
        }
    }

    /// Resolve and prefix the queue name for a call.
    ///
    /// A per-call override beats the declared name; an unresolvable name is a
    /// terminal validation failure, never defaulted.
    fn resolve_queue(
        &self,
        descriptor: &OperationDescriptor,
        arguments: &CallArguments,
    ) -> Result<QueueName, QueueError> {
        let name = arguments
            .queue
            .clone()
            .or_else(|| descriptor.queue.clone())
            .ok_or_else(|| ValidationError::Required {
                field: "queue_name".to_string(),
            })?;

        let queue = match self.service.config().queue_prefix.as_deref() {
            Some(prefix) => QueueName::with_prefix(prefix, &name)?,
            None => QueueName::from_str(&name)?,
        };
        Ok(queue)
    }
}

impl std::fmt::Debug for DeclaredQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclaredQueueClient")
            .field("name", &self.name)
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl std::fmt::Display for DeclaredQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl PartialEq for DeclaredQueueClient {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for DeclaredQueueClient {}

impl Hash for DeclaredQueueClient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
