//! Client registry: one dispatch-bound client per declared definition.
//!
//! The registry is the explicit rendition of a process-wide client cache,
//! with a documented lifecycle: created at startup around one
//! [QueueService], queried for clients thereafter, torn down at shutdown.
//! Construction is memoized by client name; concurrent first requests for
//! the same name are serialized so exactly one client is ever built, and a
//! definition that failed construction keeps failing deterministically
//! without ever exposing a partially built client.

use crate::descriptor::ClientDefinition;
use crate::dispatch::DeclaredQueueClient;
use crate::error::{ConfigurationError, QueueError};
use crate::service::QueueService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

enum BuildEntry {
    Ready(Arc<DeclaredQueueClient>),
    Failed(String),
}

/// Registry building and caching declared clients
pub struct ClientRegistry {
    service: Arc<QueueService>,
    clients: Mutex<HashMap<String, BuildEntry>>,
}

impl ClientRegistry {
    /// Create a registry over an orchestration service
    pub fn new(service: Arc<QueueService>) -> Self {
        Self {
            service,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The orchestration service backing every client
    pub fn service(&self) -> &Arc<QueueService> {
        &self.service
    }

    /// Get or build the client for a definition.
    ///
    /// Repeated requests for the same client name return the identical
    /// cached instance; the definition is only read on first construction.
    /// A failed construction is cached too and re-fails with the same
    /// message on every later request.
    pub fn client(
        &self,
        definition: ClientDefinition,
    ) -> Result<Arc<DeclaredQueueClient>, QueueError> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = clients.get(definition.name()) {
            return match entry {
                BuildEntry::Ready(client) => Ok(Arc::clone(client)),
                BuildEntry::Failed(message) => Err(ConfigurationError::Invalid {
                    message: message.clone(),
                }
                .into()),
            };
        }

        let name = definition.name().to_string();
        match DeclaredQueueClient::new(definition, Arc::clone(&self.service)) {
            Ok(client) => {
                let client = Arc::new(client);
                debug!(client = %name, "client constructed");
                clients.insert(name, BuildEntry::Ready(Arc::clone(&client)));
                Ok(client)
            }
            Err(error) => {
                let message = error.to_string();
                clients.insert(name, BuildEntry::Failed(message.clone()));
                Err(ConfigurationError::Invalid { message }.into())
            }
        }
    }

    /// Look up an already-built client by name
    pub fn get(&self, name: &str) -> Option<Arc<DeclaredQueueClient>> {
        let clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match clients.get(name) {
            Some(BuildEntry::Ready(client)) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    /// Tear the runtime down: stop every polling session and drain the pool
    /// under the bounded wait.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.service.shutdown(drain_timeout).await;
    }
}
