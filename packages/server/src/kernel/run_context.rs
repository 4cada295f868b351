//! Cancellation + deadline carried through one import run.
//!
//! A `RunContext` is checked before every chapter iteration and wraps every
//! network call via [`RunContext::guard`], so a cancelled run stops at the next
//! suspension point. It carries no cancellation *reason*: the run task decides
//! pause vs. cancel itself by re-reading persisted status after it stops.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// Context that never expires; cancelled only through `token`.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Detached context for one-off CLI imports and tests.
    pub fn background() -> Self {
        Self::new(CancellationToken::new())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why this context is done, if it is.
    pub fn err(&self) -> Option<RunContextError> {
        if self.token.is_cancelled() {
            return Some(RunContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(RunContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), RunContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> RunContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => RunContextError::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => RunContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                RunContextError::Cancelled
            }
        }
    }

    /// Race `fut` against cancellation. The future is dropped if the context
    /// finishes first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, RunContextError>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_context_is_live() {
        let ctx = RunContext::background();
        assert_eq!(ctx.err(), None);
        assert!(ctx.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_is_observed() {
        let ctx = RunContext::background();
        ctx.cancel();
        assert_eq!(ctx.err(), Some(RunContextError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = RunContext::with_timeout(CancellationToken::new(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(ctx.err(), Some(RunContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_guard_returns_output() {
        let ctx = RunContext::background();
        let out = ctx.guard(async { 42 }).await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test]
    async fn test_guard_aborts_pending_future_on_cancel() {
        let ctx = RunContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        let out = ctx.guard(std::future::pending::<()>()).await;
        assert_eq!(out, Err(RunContextError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_wins_over_deadline() {
        let ctx = RunContext::with_timeout(CancellationToken::new(), Duration::from_millis(0));
        ctx.cancel();
        assert_eq!(ctx.err(), Some(RunContextError::Cancelled));
    }
}
