//! One-shot, memoized asynchronous initialization.
//!
//! [`ConnectionFuture`] runs its initializer exactly once on a background task
//! and replays the outcome to every caller, whether they asked before, during
//! or after completion.

use std::fmt;
use std::future::Future;
use tokio::sync::watch;

/// Why a connection could not be produced.
///
/// Kept as a message so the same failure can be replayed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectError(String);

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConnectError {}

/// A value produced once by a slow, fallible initializer.
///
/// Cloning is cheap; clones observe the same underlying initialization.
#[derive(Debug, Clone)]
pub struct ConnectionFuture<T> {
    outcome: watch::Receiver<Option<Result<T, ConnectError>>>,
}

impl<T> ConnectionFuture<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Starts `initializer` on a background task and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(initializer: F) -> Self
    where
        F: Future<Output = Result<T, ConnectError>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);

        tokio::spawn(async move {
            let outcome = initializer.await;
            // Fails only when every handle is gone already.
            let _ = tx.send(Some(outcome));
        });

        Self { outcome: rx }
    }

    /// Returns the value if initialization has succeeded.
    ///
    /// `None` means "pending or failed"; use [`try_result`](Self::try_result)
    /// or [`wait`](Self::wait) to tell the two apart.
    pub fn peek(&self) -> Option<T> {
        match &*self.outcome.borrow() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the outcome without waiting, or `None` while still pending.
    pub fn try_result(&self) -> Option<Result<T, ConnectError>> {
        self.outcome.borrow().clone()
    }

    /// Waits for the initializer to finish and returns its outcome.
    pub async fn wait(&self) -> Result<T, ConnectError> {
        let mut outcome = self.outcome.clone();
        let resolved = outcome
            .wait_for(|state| state.is_some())
            .await
            .map(|state| (*state).clone());

        match resolved {
            Ok(Some(result)) => result,
            // The sender only drops without sending if the initializer task
            // panicked or the runtime shut down underneath it.
            _ => Err(ConnectError::new(
                "connection initializer terminated without a result",
            )),
        }
    }
}
