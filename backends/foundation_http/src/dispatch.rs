//! Routing completion callbacks onto a session's execution context.
//!
//! WHY: Applications that serve several sessions want a request's
//! completion to run with the session that started it, not on whichever
//! runtime worker finished the I/O.
//!
//! WHAT: The `SessionDispatcher` capability and `SessionQueue`, a dispatcher
//! that gives every session its own ordered worker task.
//!
//! HOW: `SessionQueue` keeps one unbounded tokio channel per session id. The
//! worker behind it runs callbacks one at a time in the order they were
//! posted, and stops when the session is closed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A zero-argument callback run on behalf of a session.
pub type SessionCallback = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks on behalf of a named session.
pub trait SessionDispatcher: Send + Sync {
    /// Schedules `callback` for `session_id`. Must not block.
    fn post(&self, session_id: &str, callback: SessionCallback);
}

/// Per-session ordered callback queues on a tokio runtime.
#[derive(Debug)]
pub struct SessionQueue {
    runtime: Handle,
    workers: Mutex<HashMap<String, mpsc::UnboundedSender<SessionCallback>>>,
}

impl SessionQueue {
    /// Creates a queue whose workers run on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions with a live worker.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Stops the session's worker once its queued callbacks have run.
    ///
    /// Returns `false` if the session had no worker.
    pub fn close(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<SessionCallback>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_worker(&self, session_id: &str) -> mpsc::UnboundedSender<SessionCallback> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<SessionCallback>();
        let session = session_id.to_string();

        self.runtime.spawn(async move {
            tracing::debug!(session = %session, "session worker started");
            while let Some(callback) = receiver.recv().await {
                callback();
            }
            tracing::debug!(session = %session, "session worker stopped");
        });

        sender
    }
}

impl SessionDispatcher for SessionQueue {
    fn post(&self, session_id: &str, callback: SessionCallback) {
        let mut workers = self.lock();

        let callback = match workers.get(session_id) {
            Some(sender) => match sender.send(callback) {
                Ok(()) => return,
                Err(mpsc::error::SendError(callback)) => {
                    tracing::warn!(session = session_id, "session worker gone, restarting");
                    callback
                }
            },
            None => callback,
        };

        let sender = self.spawn_worker(session_id);
        if sender.send(callback).is_err() {
            tracing::error!(session = session_id, "new session worker rejected callback");
        }
        workers.insert(session_id.to_string(), sender);
    }
}
