//! The declaration surface: operation descriptors and client definitions.
//!
//! Application code declares each queue operation once, as a named entry of a
//! [ClientDefinition] carrying an [OperationDescriptor]. The definition is a
//! registration table; the dispatch layer resolves every call against it and
//! never re-reads the declaration afterwards.

use crate::attributes::{MAX_DELAY_SECONDS, MAX_RECEIVE_MESSAGES, MAX_WAIT_TIME_SECONDS};
use crate::batch::MAX_BATCH_ENTRIES;
use crate::error::{ConfigurationError, QueueError};
use crate::message::QueueName;
use std::collections::HashSet;
use std::str::FromStr;

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;

/// The four operation kinds a client can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Send,
    SendBatch,
    Receive,
    StartPoll,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::SendBatch => "send-batch",
            Self::Receive => "receive",
            Self::StartPoll => "start-poll",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static per-operation configuration, resolved once and reused every call
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    /// Fixed queue name; a per-call override takes precedence
    pub queue: Option<String>,
    /// Delivery delay for send operations; zero means immediate
    pub delay_seconds: u32,
    /// Whether the send targets a FIFO queue
    pub fifo: bool,
    /// Messages per receive call
    pub max_messages: Option<u32>,
    /// Whether received messages are deleted after successful processing
    pub auto_delete: bool,
    /// Long-poll wait for receive and poll operations
    pub wait_time_seconds: Option<u32>,
    /// Per-call chunk ceiling for batch sends
    pub batch_size: Option<usize>,
}

impl OperationDescriptor {
    fn of_kind(kind: OperationKind) -> Self {
        Self {
            kind,
            queue: None,
            delay_seconds: 0,
            fifo: false,
            max_messages: None,
            auto_delete: false,
            wait_time_seconds: None,
            batch_size: None,
        }
    }

    /// Declare a single-message send
    pub fn send() -> Self {
        Self::of_kind(OperationKind::Send)
    }

    /// Declare a batch send
    pub fn send_batch() -> Self {
        Self::of_kind(OperationKind::SendBatch)
    }

    /// Declare a receive-and-process operation
    pub fn receive() -> Self {
        Self::of_kind(OperationKind::Receive)
    }

    /// Declare a continuous-polling starter
    pub fn start_poll() -> Self {
        Self::of_kind(OperationKind::StartPoll)
    }

    /// Bind the operation to a fixed queue name
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set a delivery delay
    pub fn with_delay_seconds(mut self, delay_seconds: u32) -> Self {
        self.delay_seconds = delay_seconds;
        self
    }

    /// Mark the send as targeting a FIFO queue
    pub fn fifo(mut self) -> Self {
        self.fifo = true;
        self
    }

    /// Set the per-receive message count
    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Delete each message after its handler succeeds
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Set the long-poll wait
    pub fn with_wait_time_seconds(mut self, wait_time_seconds: u32) -> Self {
        self.wait_time_seconds = Some(wait_time_seconds);
        self
    }

    /// Set the batch chunk ceiling
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Validate declared settings against their operation kind and the
    /// provider limits. Failures are configuration errors raised at client
    /// construction, before anything dispatches.
    pub(crate) fn validate(&self, client: &str, operation: &str) -> Result<(), QueueError> {
        let invalid = |message: String| -> QueueError {
            ConfigurationError::Invalid {
                message: format!("operation '{}' on client '{}': {}", operation, client, message),
            }
            .into()
        };

        if let Some(queue) = &self.queue {
            QueueName::from_str(queue)
                .map_err(|e| invalid(format!("queue name '{}' is invalid: {}", queue, e)))?;
        }

        if self.delay_seconds > MAX_DELAY_SECONDS {
            return Err(invalid(format!(
                "delay {}s exceeds maximum {}s",
                self.delay_seconds, MAX_DELAY_SECONDS
            )));
        }
        if self.delay_seconds > 0 && self.kind != OperationKind::Send {
            return Err(invalid("delay applies only to send operations".to_string()));
        }

        if self.fifo && self.kind != OperationKind::Send {
            return Err(invalid(
                "fifo applies only to send operations".to_string(),
            ));
        }

        if let Some(batch_size) = self.batch_size {
            if self.kind != OperationKind::SendBatch {
                return Err(invalid(
                    "batch size applies only to batch sends".to_string(),
                ));
            }
            if batch_size == 0 || batch_size > MAX_BATCH_ENTRIES {
                return Err(invalid(format!(
                    "batch size {} is outside 1..={}",
                    batch_size, MAX_BATCH_ENTRIES
                )));
            }
        }

        if let Some(max_messages) = self.max_messages {
            if !matches!(self.kind, OperationKind::Receive | OperationKind::StartPoll) {
                return Err(invalid(
                    "max messages applies only to receive and poll operations".to_string(),
                ));
            }
            if max_messages == 0 || max_messages > MAX_RECEIVE_MESSAGES {
                return Err(invalid(format!(
                    "max messages {} is outside 1..={}",
                    max_messages, MAX_RECEIVE_MESSAGES
                )));
            }
        }

        if self.auto_delete && self.kind != OperationKind::Receive {
            return Err(invalid(
                "auto delete applies only to receive operations".to_string(),
            ));
        }

        if let Some(wait) = self.wait_time_seconds {
            if !matches!(self.kind, OperationKind::Receive | OperationKind::StartPoll) {
                return Err(invalid(
                    "wait time applies only to receive and poll operations".to_string(),
                ));
            }
            if wait > MAX_WAIT_TIME_SECONDS {
                return Err(invalid(format!(
                    "wait time {}s exceeds maximum {}s",
                    wait, MAX_WAIT_TIME_SECONDS
                )));
            }
        }

        Ok(())
    }
}

/// A declared queue client: a name plus its operation table
#[derive(Debug, Clone)]
pub struct ClientDefinition {
    name: String,
    operations: Vec<(String, OperationDescriptor)>,
}

impl ClientDefinition {
    /// Start declaring a client
    pub fn builder(name: impl Into<String>) -> ClientDefinitionBuilder {
        ClientDefinitionBuilder {
            name: name.into(),
            operations: Vec::new(),
        }
    }

    /// Declared client name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared operations in declaration order
    pub fn operations(&self) -> &[(String, OperationDescriptor)] {
        &self.operations
    }

    /// Validate the whole declaration.
    ///
    /// Checks the client shape (non-blank name, at least one operation, no
    /// duplicate names) and every descriptor's settings.
    pub(crate) fn validate(&self) -> Result<(), QueueError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                message: "client name must not be blank".to_string(),
            }
            .into());
        }

        if self.operations.is_empty() {
            return Err(ConfigurationError::Invalid {
                message: format!("client '{}' declares no operations", self.name),
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(self.operations.len());
        for (operation, descriptor) in &self.operations {
            if operation.trim().is_empty() {
                return Err(ConfigurationError::Invalid {
                    message: format!("client '{}' declares a blank operation name", self.name),
                }
                .into());
            }
            if !seen.insert(operation.as_str()) {
                return Err(ConfigurationError::DuplicateOperation {
                    client: self.name.clone(),
                    operation: operation.clone(),
                }
                .into());
            }
            descriptor.validate(&self.name, operation)?;
        }

        Ok(())
    }
}

/// Builder collecting a client's operation declarations
pub struct ClientDefinitionBuilder {
    name: String,
    operations: Vec<(String, OperationDescriptor)>,
}

impl ClientDefinitionBuilder {
    /// Declare one operation
    pub fn operation(
        mut self,
        name: impl Into<String>,
        descriptor: OperationDescriptor,
    ) -> Self {
        self.operations.push((name.into(), descriptor));
        self
    }

    /// Finish the declaration.
    ///
    /// The definition is validated when a client is constructed from it, not
    /// here; an invalid declaration fails deterministically at that point.
    pub fn build(self) -> ClientDefinition {
        ClientDefinition {
            name: self.name,
            operations: self.operations,
        }
    }
}
