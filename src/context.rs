//! Request context: caller cancellation plus an optional deadline.
//!
//! Every suspension point in the ledger (storage I/O, the rate lookup) is
//! awaited through [`RequestContext::run`], which turns an expired deadline or
//! an explicit cancel into [`LedgerError::Cancelled`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::LedgerError;

#[derive(Debug, Clone)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that is never cancelled unless [`cancel`](Self::cancel) is called.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        if self.is_done() {
            return Err(LedgerError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.done() => Err(LedgerError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let out = ctx.run(async { Ok::<_, LedgerError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, LedgerError>(())
            })
            .await;
        assert!(matches!(out, Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_explicit_cancel() {
        let ctx = RequestContext::background();
        ctx.cancel();
        assert!(ctx.is_done());
        let out = ctx.run(async { Ok::<_, LedgerError>(()) }).await;
        assert!(matches!(out, Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_clone_shares_cancellation() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(60));
        let clone = ctx.clone();
        assert_eq!(clone.deadline(), ctx.deadline());

        ctx.cancel();
        assert!(clone.is_done());
    }

    #[test]
    fn test_background_is_unbounded() {
        let ctx = RequestContext::default();
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_done());
    }
}
