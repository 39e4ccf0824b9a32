//! Queue attribute translation and validation.
//!
//! Converts the string-keyed attribute maps accepted at the API surface into
//! validated, typed provider attributes. An unrecognized key is a hard
//! configuration error, never silently dropped.

use crate::error::{ConfigurationError, QueueError, ValidationError};
use std::collections::HashMap;
use std::str::FromStr;

#[cfg(test)]
#[path = "attributes_tests.rs"]
mod tests;

/// Provider ceiling on a message delay, in seconds
pub const MAX_DELAY_SECONDS: u32 = 900;
/// Provider ceiling on a visibility timeout, in seconds
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;
/// Provider ceiling on a long-poll wait, in seconds
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;
/// Provider ceiling on messages per receive call
pub const MAX_RECEIVE_MESSAGES: u32 = 10;

/// Queue attributes recognized by the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueAttributeKey {
    DelaySeconds,
    MaximumMessageSize,
    MessageRetentionPeriod,
    Policy,
    ReceiveMessageWaitTimeSeconds,
    RedrivePolicy,
    VisibilityTimeout,
    FifoQueue,
    ContentBasedDeduplication,
}

impl QueueAttributeKey {
    /// Provider wire name for this attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DelaySeconds => "DelaySeconds",
            Self::MaximumMessageSize => "MaximumMessageSize",
            Self::MessageRetentionPeriod => "MessageRetentionPeriod",
            Self::Policy => "Policy",
            Self::ReceiveMessageWaitTimeSeconds => "ReceiveMessageWaitTimeSeconds",
            Self::RedrivePolicy => "RedrivePolicy",
            Self::VisibilityTimeout => "VisibilityTimeout",
            Self::FifoQueue => "FifoQueue",
            Self::ContentBasedDeduplication => "ContentBasedDeduplication",
        }
    }

    /// Validate a value for this attribute
    fn validate(&self, value: &str) -> Result<(), QueueError> {
        match self {
            Self::VisibilityTimeout => {
                validate_numeric_range(self.as_str(), value, 0, MAX_VISIBILITY_TIMEOUT_SECONDS)
            }
            Self::ReceiveMessageWaitTimeSeconds => {
                validate_numeric_range(self.as_str(), value, 0, MAX_WAIT_TIME_SECONDS)
            }
            Self::DelaySeconds => validate_numeric_range(self.as_str(), value, 0, MAX_DELAY_SECONDS),
            Self::MaximumMessageSize | Self::MessageRetentionPeriod => {
                validate_numeric(self.as_str(), value)
            }
            Self::Policy | Self::RedrivePolicy => validate_non_blank(self.as_str(), value),
            Self::FifoQueue | Self::ContentBasedDeduplication => {
                validate_boolean(self.as_str(), value)
            }
        }
    }
}

impl std::fmt::Display for QueueAttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueAttributeKey {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DelaySeconds" => Ok(Self::DelaySeconds),
            "MaximumMessageSize" => Ok(Self::MaximumMessageSize),
            "MessageRetentionPeriod" => Ok(Self::MessageRetentionPeriod),
            "Policy" => Ok(Self::Policy),
            "ReceiveMessageWaitTimeSeconds" => Ok(Self::ReceiveMessageWaitTimeSeconds),
            "RedrivePolicy" => Ok(Self::RedrivePolicy),
            "VisibilityTimeout" => Ok(Self::VisibilityTimeout),
            "FifoQueue" => Ok(Self::FifoQueue),
            "ContentBasedDeduplication" => Ok(Self::ContentBasedDeduplication),
            other => Err(ConfigurationError::UnknownAttribute {
                key: other.to_string(),
            }),
        }
    }
}

/// Translate a string attribute map into validated provider attributes
pub fn translate_attributes(
    raw: &HashMap<String, String>,
) -> Result<HashMap<QueueAttributeKey, String>, QueueError> {
    let mut translated = HashMap::with_capacity(raw.len());

    for (key, value) in raw {
        let attribute = QueueAttributeKey::from_str(key)?;
        attribute.validate(value)?;
        translated.insert(attribute, value.clone());
    }

    Ok(translated)
}

/// Default attributes applied to newly created queues
pub fn default_attributes() -> HashMap<QueueAttributeKey, String> {
    HashMap::from([
        (QueueAttributeKey::VisibilityTimeout, "30".to_string()),
        (QueueAttributeKey::DelaySeconds, "0".to_string()),
    ])
}

/// Attributes enabling long polling with the given receive wait
pub fn long_polling_attributes(
    wait_time_seconds: u32,
) -> Result<HashMap<QueueAttributeKey, String>, QueueError> {
    let value = wait_time_seconds.to_string();
    QueueAttributeKey::ReceiveMessageWaitTimeSeconds.validate(&value)?;

    let mut attributes = default_attributes();
    attributes.insert(QueueAttributeKey::ReceiveMessageWaitTimeSeconds, value);
    Ok(attributes)
}

fn validate_numeric(field: &str, value: &str) -> Result<(), QueueError> {
    value.parse::<u64>().map(|_| ()).map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            message: format!("'{}' is not a number", value),
        }
        .into()
    })
}

fn validate_numeric_range(field: &str, value: &str, min: u32, max: u32) -> Result<(), QueueError> {
    let parsed: u32 = value.parse().map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        message: format!("'{}' is not a number", value),
    })?;

    if parsed < min || parsed > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("{} is outside {}..={}", parsed, min, max),
        }
        .into());
    }

    Ok(())
}

fn validate_non_blank(field: &str, value: &str) -> Result<(), QueueError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_boolean(field: &str, value: &str) -> Result<(), QueueError> {
    match value {
        "true" | "false" => Ok(()),
        other => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: format!("'{}' is not 'true' or 'false'", other),
        }
        .into()),
    }
}
