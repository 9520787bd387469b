//! Ordered error-handler chain for lifecycle callback failures.
//!
//! Every hook, condition, mapping, action and trigger call runs through
//! [`ErrorHandling`]. Cancellation tied to the operation's own token skips
//! the chain entirely; every other error is offered to each handler in
//! registration order until one decides what to raise.

use crate::error::EngineError;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Marker error a callback returns to report that it observed cancellation.
///
/// # Example
///
/// ```rust
/// use phaseline::core::Cancelled;
/// use tokio_util::sync::CancellationToken;
///
/// fn step(token: &CancellationToken) -> anyhow::Result<()> {
///     if token.is_cancelled() {
///         return Err(Cancelled.into());
///     }
///     Ok(())
/// }
///
/// let token = CancellationToken::new();
/// token.cancel();
/// assert!(step(&token).unwrap_err().is::<Cancelled>());
/// ```
#[derive(Debug, Clone, Copy, Default, Error, PartialEq, Eq)]
#[error("operation was cancelled")]
pub struct Cancelled;

/// What an error handler wants done with a failure.
#[derive(Debug)]
pub enum ErrorAction {
    /// Raise the original error unchanged. No further handlers run.
    Rethrow,
    /// Raise this error instead of the original. No further handlers run.
    Throw(anyhow::Error),
    /// Defer to the next handler; the original is raised if none remain.
    Continue,
}

/// A registered error handler.
///
/// A handler that itself returns `Err` raises that error immediately.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error) -> anyhow::Result<ErrorAction> + Send + Sync>;

/// Whether `error` is a cancellation signal, including an engine
/// cancellation propagated out of a nested machine call.
pub fn is_cancellation(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Cancelled>().is_some()
        || matches!(error.downcast_ref::<EngineError>(), Some(EngineError::Cancelled))
}

/// The ordered handler chain.
#[derive(Clone, Default)]
pub struct ErrorHandling {
    handlers: Vec<ErrorHandler>,
}

impl ErrorHandling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, handler: F)
    where
        F: Fn(&anyhow::Error) -> anyhow::Result<ErrorAction> + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&anyhow::Error) -> anyhow::Result<ErrorAction> + Send + Sync + 'static,
    {
        self.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Await `body`, routing a failure through the chain.
    pub async fn run<T, F>(&self, body: F, token: &CancellationToken) -> Result<T, EngineError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        body.await.map_err(|error| self.raise(error, token))
    }

    /// Await `body`, routing a failure through the chain.
    ///
    /// With `suppress_cancellation`, a cancellation tied to `token` is
    /// swallowed and `Ok(None)` is returned. Detached background actions use
    /// this so that cancelling them on state exit is silent.
    pub async fn run_with_handling<T, F>(
        &self,
        body: F,
        token: &CancellationToken,
        suppress_cancellation: bool,
    ) -> Result<Option<T>, EngineError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match body.await {
            Ok(value) => Ok(Some(value)),
            Err(error)
                if suppress_cancellation && is_cancellation(&error) && token.is_cancelled() =>
            {
                tracing::debug!("cancellation suppressed");
                Ok(None)
            }
            Err(error) => Err(self.raise(error, token)),
        }
    }

    /// Decide which error to raise for a failed callback.
    pub fn raise(&self, error: anyhow::Error, token: &CancellationToken) -> EngineError {
        if is_cancellation(&error) && token.is_cancelled() {
            return EngineError::Cancelled;
        }

        for handler in &self.handlers {
            match handler(&error) {
                Ok(ErrorAction::Continue) => continue,
                Ok(ErrorAction::Rethrow) => return EngineError::Failed(error),
                Ok(ErrorAction::Throw(replacement)) => {
                    tracing::debug!(
                        original = %error,
                        replacement = %replacement,
                        "error replaced by handler"
                    );
                    return EngineError::Failed(replacement);
                }
                Err(handler_error) => {
                    tracing::warn!(
                        original = %error,
                        error = %handler_error,
                        "error handler failed"
                    );
                    return EngineError::Failed(handler_error);
                }
            }
        }

        EngineError::Failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Error)]
    #[error("invalid operation: {0}")]
    struct InvalidOperation(&'static str);

    fn counting(
        calls: &Arc<AtomicUsize>,
        action: fn() -> ErrorAction,
    ) -> impl Fn(&anyhow::Error) -> anyhow::Result<ErrorAction> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(action())
        }
    }

    #[tokio::test]
    async fn success_never_invokes_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling =
            ErrorHandling::new().with_handler(counting(&calls, || ErrorAction::Rethrow));

        let value = handling
            .run(async { Ok::<_, anyhow::Error>(7) }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn continue_falls_through_to_original() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling = ErrorHandling::new()
            .with_handler(counting(&calls, || ErrorAction::Continue))
            .with_handler(counting(&calls, || ErrorAction::Continue));

        let err = handling
            .run(
                async { Err::<(), _>(InvalidOperation("exit").into()) },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let failure = err.failure().unwrap();
        assert!(failure.is::<InvalidOperation>());
    }

    #[tokio::test]
    async fn rethrow_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling = ErrorHandling::new()
            .with_handler(counting(&calls, || ErrorAction::Rethrow))
            .with_handler(counting(&calls, || ErrorAction::Continue));

        let err = handling
            .run(
                async { Err::<(), _>(InvalidOperation("entry").into()) },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.failure().unwrap().is::<InvalidOperation>());
    }

    #[tokio::test]
    async fn throw_replaces_the_original() {
        let handling = ErrorHandling::new()
            .with_handler(|_| Ok(ErrorAction::Throw(anyhow::anyhow!("replacement"))));

        let err = handling
            .run(
                async { Err::<(), _>(InvalidOperation("entry").into()) },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "replacement");
    }

    #[tokio::test]
    async fn failing_handler_bypasses_remaining_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling = ErrorHandling::new()
            .with_handler(|_| Err(anyhow::anyhow!("handler broke")))
            .with_handler(counting(&calls, || ErrorAction::Rethrow));

        let err = handling
            .run(
                async { Err::<(), _>(InvalidOperation("entry").into()) },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "handler broke");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn own_cancellation_bypasses_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling =
            ErrorHandling::new().with_handler(counting(&calls, || ErrorAction::Rethrow));
        let token = CancellationToken::new();
        token.cancel();

        let err = handling
            .run(async { Err::<(), _>(Cancelled.into()) }, &token)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn foreign_cancellation_goes_through_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling =
            ErrorHandling::new().with_handler(counting(&calls, || ErrorAction::Continue));

        let err = handling
            .run(async { Err::<(), _>(Cancelled.into()) }, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.failure().unwrap().is::<Cancelled>());
    }

    #[tokio::test]
    async fn suppressed_cancellation_produces_no_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handling =
            ErrorHandling::new().with_handler(counting(&calls, || ErrorAction::Rethrow));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = handling
            .run_with_handling(async { Err::<(), _>(Cancelled.into()) }, &token, true)
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn nested_engine_cancellation_counts_as_cancellation() {
        let error = anyhow::Error::from(EngineError::Cancelled);
        assert!(is_cancellation(&error));
        assert!(!is_cancellation(&anyhow::anyhow!("plain")));
    }
}
