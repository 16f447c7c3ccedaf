use crate::errors::HttpClientError;
use crate::message::Response;
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome handed to completion subscribers.
pub type Completion = Result<Response, HttpClientError>;

type Subscriber = Arc<dyn Fn(&Completion) + Send + Sync>;

/// Completion event of an [`HttpClient`](super::HttpClient).
///
/// Subscribers are called in the order they connected, once per accepted
/// request that was not aborted. The subscriber list is not locked while
/// they run, so a subscriber may connect further subscribers; those see the
/// next emission.
#[derive(Default)]
pub struct CompletionSignal {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl CompletionSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber.
    pub fn connect<F>(&self, subscriber: F)
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.lock().push(Arc::new(subscriber));
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Calls every subscriber with `outcome`.
    pub fn emit(&self, outcome: &Completion) {
        let subscribers = self.lock().clone();
        tracing::debug!(
            subscribers = subscribers.len(),
            ok = outcome.is_ok(),
            "emitting completion"
        );
        for subscriber in &subscribers {
            subscriber(outcome);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
