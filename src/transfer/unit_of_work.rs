//! Unit-of-Work / Transaction Boundary
//!
//! [`exec_tx`] runs a closure against a [`TxScope`] and guarantees one of two
//! outcomes: every write inside the scope commits, or none of them does.
//!
//! # Rules
//! 1. `work` error → rollback, the work error is returned.
//! 2. Caller cancellation mid-work → the work future is dropped, rollback,
//!    `Cancelled` is returned.
//! 3. Rollback failure → `RollbackFailed` carrying both errors.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::types::{NewTransfer, Transfer};
use crate::account::Account;
use crate::context::RequestContext;
use crate::core_types::AccountId;
use crate::error::LedgerError;
use crate::money::Money;

/// Writes available inside an open storage transaction.
#[async_trait]
pub trait TxScope: Send {
    /// `balance = balance + delta` as a single statement; returns the new row.
    async fn add_balance(&mut self, id: AccountId, delta: Money)
    -> Result<Account, LedgerError>;

    async fn insert_transfer(&mut self, transfer: NewTransfer) -> Result<Transfer, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Factory for storage-level atomic transactions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn TxScope>, LedgerError>;
}

/// Run `work` inside one storage transaction.
///
/// The commit itself is not interrupted once started: a cancellation that
/// arrives after `work` finished but before commit rolls back instead.
pub async fn exec_tx<T, F>(
    uow: &dyn UnitOfWork,
    ctx: &RequestContext,
    work: F,
) -> Result<T, LedgerError>
where
    T: Send,
    F: for<'a> FnOnce(&'a mut dyn TxScope) -> BoxFuture<'a, Result<T, LedgerError>> + Send,
{
    let mut scope = ctx.run(uow.begin(ctx)).await?;

    let outcome = ctx.run(work(scope.as_mut())).await;

    match outcome {
        Ok(_) if ctx.is_done() => {
            warn!("Context finished before commit, rolling back");
            Err(rollback_with(scope, LedgerError::Cancelled).await)
        }
        Ok(value) => {
            scope.commit().await?;
            debug!("Unit of work committed");
            Ok(value)
        }
        Err(err) => Err(rollback_with(scope, err).await),
    }
}

async fn rollback_with(scope: Box<dyn TxScope>, err: LedgerError) -> LedgerError {
    match scope.rollback().await {
        Ok(()) => {
            debug!(error = %err, "Unit of work rolled back");
            err
        }
        Err(rollback_err) => {
            error!(
                error = %err,
                rollback_error = %rollback_err,
                "Rollback failed"
            );
            err.with_rollback_failure(rollback_err)
        }
    }
}
