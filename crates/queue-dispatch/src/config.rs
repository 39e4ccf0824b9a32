//! Client configuration.

use crate::batch::MAX_BATCH_ENTRIES;
use crate::error::{ConfigurationError, QueueError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Configuration for the dispatch runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-call batch-size ceiling; clamped to the provider limit
    pub max_batch_size: usize,

    /// Default long-poll wait applied to receive operations, in seconds
    pub default_wait_time_seconds: u32,

    /// Prefix applied to every resolved queue name
    pub queue_prefix: Option<String>,

    /// Fixed backoff between failed polling iterations, in seconds
    pub poll_backoff_seconds: u64,

    /// Grace added to the long-poll wait before a polling iteration is
    /// considered timed out, in seconds
    pub poll_grace_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_ENTRIES,
            default_wait_time_seconds: 10,
            queue_prefix: None,
            poll_backoff_seconds: 5,
            poll_grace_seconds: 5,
        }
    }
}

impl DispatchConfig {
    /// Effective chunk size for batch sends.
    ///
    /// The configured ceiling never exceeds the provider limit and never
    /// drops below one.
    pub fn effective_batch_size(&self) -> usize {
        self.max_batch_size.clamp(1, MAX_BATCH_ENTRIES)
    }

    /// Load configuration from an optional YAML file plus `QD__`-prefixed
    /// environment variables. Later sources override earlier ones.
    pub fn load(path: Option<&Path>) -> Result<Self, QueueError> {
        let mut builder = config::Config::builder().add_source(
            config::File::with_name("config/dispatch")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        builder
            .add_source(config::Environment::with_prefix("QD").separator("__"))
            .build()
            .and_then(|loaded| loaded.try_deserialize())
            .map_err(|e| {
                QueueError::ConfigurationError(ConfigurationError::Parsing {
                    message: e.to_string(),
                })
            })
    }
}
