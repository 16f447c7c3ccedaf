//! Deadline and cancellation guard for the connection state machine.
//!
//! WHY: Every transport operation must race against both the configured
//! timeout and an explicit abort from the owning client, and the terminal
//! error has to say which of the two won.
//!
//! WHAT: `AbortHandle`/`AbortSignal` pair, the `Watchdog` that guards one
//! operation at a time, and the `ResponseSize` counter.
//!
//! HOW: `Watchdog::guard` runs a biased `tokio::select!` over the abort
//! signal, the operation and a fresh `sleep`. Losing the race drops the
//! operation future, which cancels the pending I/O; the caller then closes
//! the transport.

use crate::errors::HttpClientError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Owner side of an abort signal.
#[derive(Debug)]
pub struct AbortHandle {
    sender: watch::Sender<bool>,
}

impl AbortHandle {
    /// Creates a handle and the signal the state machine listens on.
    #[must_use]
    pub fn new() -> (Self, AbortSignal) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, AbortSignal { receiver })
    }

    /// Requests cancellation. Calling it again has no further effect.
    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Listener side of an [`AbortHandle`].
///
/// Dropping the handle without calling `abort` never fires the signal.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, signal) = AbortHandle::new();
        signal
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the owner has aborted.
    pub async fn aborted(&mut self) {
        let sender_gone = self.receiver.wait_for(|aborted| *aborted).await.is_err();
        if sender_gone {
            std::future::pending::<()>().await;
        }
    }
}

/// Why a guarded operation did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    TimedOut,
    Aborted,
}

impl From<Interrupt> for HttpClientError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::TimedOut => HttpClientError::TimedOut,
            Interrupt::Aborted => HttpClientError::Aborted,
        }
    }
}

/// Races each operation against the timeout and the abort signal.
///
/// A new deadline is armed for every guarded operation and disarmed when it
/// completes, so the timeout bounds each stage rather than the request.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Option<Duration>,
    abort: AbortSignal,
}

impl Watchdog {
    /// `None` disables the deadline; the abort signal is always honoured.
    #[must_use]
    pub fn new(timeout: Option<Duration>, abort: AbortSignal) -> Self {
        Self { timeout, abort }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `operation` until it completes, the deadline passes or the
    /// owner aborts, whichever happens first.
    ///
    /// An abort that is already pending wins over an operation that is
    /// already ready.
    ///
    /// # Errors
    ///
    /// The [`Interrupt`] that stopped the operation.
    pub async fn guard<F>(&mut self, operation: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.abort.aborted() => Err(Interrupt::Aborted),
            output = operation => Ok(output),
            () = deadline => Err(Interrupt::TimedOut),
        }
    }
}

/// Running total of response bytes checked against a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSize {
    limit: usize,
    received: usize,
}

impl ResponseSize {
    /// `limit` of 0 means unlimited.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, received: 0 }
    }

    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Bytes that may still arrive before the limit is crossed. `None` when
    /// unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<usize> {
        (self.limit != 0).then(|| self.limit.saturating_sub(self.received))
    }

    /// The error reported once the limit is crossed.
    #[must_use]
    pub fn exceeded(&self) -> HttpClientError {
        HttpClientError::ResponseTooLarge { limit: self.limit }
    }

    /// Adds `bytes` to the total.
    ///
    /// # Errors
    ///
    /// `HttpClientError::ResponseTooLarge` once the total exceeds the limit.
    pub fn record(&mut self, bytes: usize) -> Result<(), HttpClientError> {
        self.received = self.received.saturating_add(bytes);
        if self.limit != 0 && self.received > self.limit {
            return Err(self.exceeded());
        }
        Ok(())
    }
}
