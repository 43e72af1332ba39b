//! Account store seam
//!
//! One capability, two implementations: [`crate::store::PgStore`] for
//! production and [`crate::store::MemoryStore`] for tests and local runs.

use async_trait::async_trait;

use super::models::{Account, AccountPatch, NewAccount};
use crate::context::RequestContext;
use crate::core_types::AccountId;
use crate::error::LedgerError;
use crate::money::Money;

/// Durable id -> balance mapping.
///
/// Every read goes to the store; implementations must not cache balances.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an account; the store assigns `id` and `created_at`.
    async fn insert(&self, ctx: &RequestContext, account: NewAccount)
    -> Result<Account, LedgerError>;

    /// Point lookup. Missing or invalid (`<= 0`) ids yield `NotFound`.
    async fn get(&self, ctx: &RequestContext, id: AccountId) -> Result<Account, LedgerError>;

    /// Replace balance and currency of `account.id`; returns the stored row.
    async fn update(&self, ctx: &RequestContext, account: &Account)
    -> Result<Account, LedgerError>;

    /// Set only the fields present in `patch`, in one write.
    ///
    /// A currency-only patch never rewrites the balance, so balance deltas
    /// committed concurrently are kept.
    async fn patch(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<Account, LedgerError>;

    /// Hard delete. Zero affected rows is `NotFound`, not success.
    async fn delete(&self, ctx: &RequestContext, id: AccountId) -> Result<(), LedgerError>;

    /// All accounts ordered by id. A cancelled scan fails with `Cancelled`,
    /// never with a silently truncated list.
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, LedgerError>;

    /// Atomically apply `delta` (`balance = balance + delta`) and return the new row.
    async fn add_balance(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        delta: Money,
    ) -> Result<Account, LedgerError>;

    /// Fetch both accounts in one pass, returned as `[first, second]`.
    ///
    /// Fails with `AccountsMissing` unless exactly two rows exist.
    async fn validate_accounts(
        &self,
        ctx: &RequestContext,
        first: AccountId,
        second: AccountId,
    ) -> Result<[Account; 2], LedgerError>;
}

/// Arrange rows fetched with `WHERE id IN (first, second)` into request order.
pub(crate) fn pair_in_order(
    rows: Vec<Account>,
    first: AccountId,
    second: AccountId,
) -> Result<[Account; 2], LedgerError> {
    if rows.len() != 2 {
        return Err(LedgerError::AccountsMissing);
    }
    let mut first_row = None;
    let mut second_row = None;
    for row in rows {
        if row.id == first && first_row.is_none() {
            first_row = Some(row);
        } else if row.id == second {
            second_row = Some(row);
        }
    }
    match (first_row, second_row) {
        (Some(a), Some(b)) => Ok([a, b]),
        _ => Err(LedgerError::AccountsMissing),
    }
}
