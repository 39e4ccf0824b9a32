//! Continuous polling sessions.
//!
//! One background loop per queue name: long-poll receive, process each
//! message, delete on success. Sessions are tracked in a concurrent registry
//! keyed by queue name; a name never has two concurrent loops, while distinct
//! names poll fully in parallel.
//!
//! Cancellation is cooperative: each session carries a stop flag checked once
//! per loop iteration, and an in-flight receive is awaited up to a bounded
//! per-iteration timeout rather than forcibly interrupted mid-call. Stopping
//! returns once cancellation has been requested, not once the loop drains.

use crate::client::{QueueApi, ReceiveRequest};
use crate::message::QueueName;
use crate::service::MessageHandler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "polling_tests.rs"]
mod tests;

/// Settings for one polling session
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Messages requested per receive call
    pub max_messages: u32,
    /// Long-poll wait per receive call, in seconds
    pub wait_time_seconds: u32,
    /// Fixed backoff after a failed or timed-out iteration
    pub backoff: Duration,
    /// Grace added to the wait before an iteration counts as timed out
    pub iteration_grace: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time_seconds: 10,
            backoff: Duration::from_secs(5),
            iteration_grace: Duration::from_secs(5),
        }
    }
}

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingState {
    /// No session exists for the name (also the terminal state after a stop,
    /// since stopped sessions are removed from the registry)
    NotStarted,
    Running,
    /// Stop has been requested but the task has not been reaped yet
    Stopping,
    /// The task ended on its own (abort or panic) without a stop request
    Stopped,
}

struct PollingSession {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Registry of active polling sessions, keyed by queue name.
///
/// This is the only shared mutable state in the crate; all access goes
/// through the async lock so start/stop from arbitrary tasks is race-free.
pub struct PollingRegistry {
    sessions: RwLock<HashMap<QueueName, PollingSession>>,
}

impl PollingRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a polling session for a queue.
    ///
    /// Returns `false` without side effects when a session for the name is
    /// already active.
    pub async fn start(
        &self,
        api: Arc<dyn QueueApi>,
        queue: QueueName,
        settings: PollSettings,
        handler: Arc<dyn MessageHandler>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get(&queue) {
            if !existing.handle.is_finished() {
                warn!(queue = %queue, "polling already active; start request ignored");
                return false;
            }
            // The previous task died without a stop request; replace it
            sessions.remove(&queue);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_loop(
            api,
            queue.clone(),
            settings,
            handler,
            Arc::clone(&stop),
        ));

        info!(queue = %queue, "polling started");
        sessions.insert(queue, PollingSession { stop, handle });
        true
    }

    /// Request cancellation of a queue's polling session.
    ///
    /// Flips the cooperative flag, cancels the task and removes the
    /// bookkeeping. Returns once cancellation has been requested; a request
    /// for an absent session is a no-op returning `false`.
    pub async fn stop(&self, queue: &QueueName) -> bool {
        let mut sessions = self.sessions.write().await;

        match sessions.remove(queue) {
            Some(session) => {
                session.stop.store(true, Ordering::Release);
                session.handle.abort();
                info!(queue = %queue, "polling stop requested");
                true
            }
            None => {
                debug!(queue = %queue, "stop requested for inactive queue");
                false
            }
        }
    }

    /// Observable state of a queue's polling session
    pub async fn state(&self, queue: &QueueName) -> PollingState {
        let sessions = self.sessions.read().await;
        match sessions.get(queue) {
            None => PollingState::NotStarted,
            Some(session) if session.stop.load(Ordering::Acquire) => PollingState::Stopping,
            Some(session) if session.handle.is_finished() => PollingState::Stopped,
            Some(_) => PollingState::Running,
        }
    }

    /// Names with a session currently registered
    pub async fn active_queues(&self) -> Vec<QueueName> {
        let sessions = self.sessions.read().await;
        sessions.keys().cloned().collect()
    }

    /// Stop every session and wait for the tasks to wind down.
    ///
    /// Every stop flag is flipped before any task is awaited, so no session
    /// picks up new work while its siblings drain. Tasks still running after
    /// `drain_timeout` are abandoned with a warning.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        let drained: Vec<(QueueName, PollingSession)> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().collect()
        };

        for (_, session) in &drained {
            session.stop.store(true, Ordering::Release);
        }

        for (queue, session) in drained {
            session.handle.abort();
            if tokio::time::timeout(drain_timeout, session.handle)
                .await
                .is_err()
            {
                warn!(queue = %queue, "polling task did not stop within drain timeout");
            }
        }
    }
}

impl Default for PollingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One queue's polling loop.
///
/// Per-message handler errors are logged and the message is left for
/// redelivery; receive-level errors and iteration timeouts are logged and
/// retried after the configured backoff. One bad iteration never terminates
/// the session.
async fn run_loop(
    api: Arc<dyn QueueApi>,
    queue: QueueName,
    settings: PollSettings,
    handler: Arc<dyn MessageHandler>,
    stop: Arc<AtomicBool>,
) {
    let iteration_timeout =
        Duration::from_secs(u64::from(settings.wait_time_seconds)) + settings.iteration_grace;
    let request = ReceiveRequest::new()
        .with_max_messages(settings.max_messages)
        .with_wait_time_seconds(settings.wait_time_seconds);

    while !stop.load(Ordering::Acquire) {
        match tokio::time::timeout(iteration_timeout, api.receive_messages(&queue, &request)).await
        {
            Err(_) => {
                warn!(
                    queue = %queue,
                    timeout = ?iteration_timeout,
                    "receive iteration timed out; backing off"
                );
                tokio::time::sleep(settings.backoff).await;
            }
            Ok(Err(error)) => {
                warn!(
                    queue = %queue,
                    error = %error,
                    transient = error.is_transient(),
                    "receive failed; backing off"
                );
                tokio::time::sleep(settings.backoff).await;
            }
            Ok(Ok(messages)) => {
                for message in messages {
                    let receipt = message.receipt.clone();
                    match handler.handle(message).await {
                        Ok(()) => {
                            if let Err(error) = api.delete_message(&queue, &receipt).await {
                                warn!(
                                    queue = %queue,
                                    error = %error,
                                    "failed to delete processed message"
                                );
                            }
                        }
                        Err(error) => {
                            error!(
                                queue = %queue,
                                error = %error,
                                "handler failed; message left for redelivery"
                            );
                        }
                    }
                }
            }
        }
    }

    debug!(queue = %queue, "polling loop exited");
}
