//! In-memory ledger store.
//!
//! Substitutable for [`super::PgStore`] in tests and local runs. A unit of
//! work holds the table lock for its whole lifetime and keeps an undo log,
//! so rollback (explicit or on drop) restores every touched balance and
//! drops every transfer appended inside it.
//!
//! Fault injection lets tests break the transfer-log insert or the rollback
//! itself without a real database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::debug;

use crate::account::repository::pair_in_order;
use crate::account::{Account, AccountPatch, AccountStore, NewAccount};
use crate::context::RequestContext;
use crate::core_types::{is_valid_id, AccountId, TransferId};
use crate::error::LedgerError;
use crate::money::Money;
use crate::transfer::{NewTransfer, Transfer, TransferLog, TxScope, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    transfers: BTreeMap<TransferId, Transfer>,
    last_account_id: AccountId,
    last_transfer_id: TransferId,
}

impl Tables {
    fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        if !is_valid_id(id) {
            return Err(LedgerError::account_not_found(id));
        }
        self.accounts
            .get(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    fn add_balance(&mut self, id: AccountId, delta: Money) -> Result<Account, LedgerError> {
        let account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Storage(format!("balance overflow on account {}", id)))?;
        Ok(account.clone())
    }

    fn append_transfer(
        &mut self,
        faults: &Faults,
        transfer: NewTransfer,
    ) -> Result<Transfer, LedgerError> {
        if faults.fail_transfer_insert.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage("injected transfer insert failure".into()));
        }
        if !transfer.amount.is_positive() {
            return Err(LedgerError::Storage(format!(
                "transfer amount {} violates amount > 0",
                transfer.amount
            )));
        }
        // Like a sequence, ids are not reused after a rollback.
        self.last_transfer_id += 1;
        let stored = Transfer {
            id: self.last_transfer_id,
            source_account_id: transfer.source_account_id,
            target_account_id: transfer.target_account_id,
            amount: transfer.amount,
            currency: transfer.currency,
            created_at: Utc::now(),
        };
        self.transfers.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_transfer_insert: AtomicBool,
    fail_rollback: AtomicBool,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next transfer-log insert (inside or outside a unit of work) fails.
    pub fn fail_next_transfer_insert(&self) {
        self.faults.fail_transfer_insert.store(true, Ordering::SeqCst);
    }

    /// The next rollback restores state but still reports failure.
    pub fn fail_next_rollback(&self) {
        self.faults.fail_rollback.store(true, Ordering::SeqCst);
    }

    async fn lock(&self, ctx: &RequestContext) -> Result<MutexGuard<'_, Tables>, LedgerError> {
        ctx.run(async { Ok(self.tables.lock().await) }).await
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert(
        &self,
        ctx: &RequestContext,
        account: NewAccount,
    ) -> Result<Account, LedgerError> {
        let mut tables = self.lock(ctx).await?;
        tables.last_account_id += 1;
        let stored = Account {
            id: tables.last_account_id,
            balance: account.balance,
            currency: account.currency,
            created_at: Utc::now(),
        };
        tables.accounts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, ctx: &RequestContext, id: AccountId) -> Result<Account, LedgerError> {
        let tables = self.lock(ctx).await?;
        tables.account(id).cloned()
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        account: &Account,
    ) -> Result<Account, LedgerError> {
        let mut tables = self.lock(ctx).await?;
        tables.account(account.id)?;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| LedgerError::account_not_found(account.id))?;
        stored.balance = account.balance;
        stored.currency = account.currency.clone();
        Ok(stored.clone())
    }

    async fn patch(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<Account, LedgerError> {
        let mut tables = self.lock(ctx).await?;
        tables.account(id)?;
        let stored = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        if let Some(balance) = patch.balance {
            stored.balance = balance;
        }
        if let Some(currency) = patch.currency {
            stored.currency = currency;
        }
        Ok(stored.clone())
    }

    async fn delete(&self, ctx: &RequestContext, id: AccountId) -> Result<(), LedgerError> {
        let mut tables = self.lock(ctx).await?;
        match tables.accounts.remove(&id) {
            Some(_) => Ok(()),
            None => Err(LedgerError::account_not_found(id)),
        }
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, LedgerError> {
        let tables = self.lock(ctx).await?;
        Ok(tables.accounts.values().cloned().collect())
    }

    async fn add_balance(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        delta: Money,
    ) -> Result<Account, LedgerError> {
        let mut tables = self.lock(ctx).await?;
        tables.add_balance(id, delta)
    }

    async fn validate_accounts(
        &self,
        ctx: &RequestContext,
        first: AccountId,
        second: AccountId,
    ) -> Result<[Account; 2], LedgerError> {
        let tables = self.lock(ctx).await?;
        let mut ids = vec![first, second];
        ids.dedup();
        let rows = ids
            .iter()
            .filter_map(|id| tables.accounts.get(id).cloned())
            .collect();
        pair_in_order(rows, first, second)
    }
}

#[async_trait]
impl TransferLog for MemoryStore {
    async fn insert(
        &self,
        ctx: &RequestContext,
        transfer: NewTransfer,
    ) -> Result<Transfer, LedgerError> {
        let mut tables = self.lock(ctx).await?;
        tables.append_transfer(&self.faults, transfer)
    }

    async fn get(&self, ctx: &RequestContext, id: TransferId) -> Result<Transfer, LedgerError> {
        let tables = self.lock(ctx).await?;
        if !is_valid_id(id) {
            return Err(LedgerError::transfer_not_found(id));
        }
        tables
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::transfer_not_found(id))
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Transfer>, LedgerError> {
        let tables = self.lock(ctx).await?;
        Ok(tables.transfers.values().cloned().collect())
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn TxScope>, LedgerError> {
        let tables = self.tables.clone();
        let guard = ctx.run(async { Ok(tables.lock_owned().await) }).await?;
        Ok(Box::new(MemoryTx {
            tables: guard,
            faults: self.faults.clone(),
            original_balances: HashMap::new(),
            appended: Vec::new(),
            finished: false,
        }))
    }
}

/// Open unit of work over the memory tables.
struct MemoryTx {
    tables: OwnedMutexGuard<Tables>,
    faults: Arc<Faults>,
    /// Balance of each touched account as it was before this unit of work.
    original_balances: HashMap<AccountId, Money>,
    appended: Vec<TransferId>,
    finished: bool,
}

impl MemoryTx {
    fn undo(&mut self) {
        for (id, balance) in self.original_balances.drain() {
            if let Some(account) = self.tables.accounts.get_mut(&id) {
                account.balance = balance;
            }
        }
        for id in self.appended.drain(..) {
            self.tables.transfers.remove(&id);
        }
        self.finished = true;
    }
}

#[async_trait]
impl TxScope for MemoryTx {
    async fn add_balance(
        &mut self,
        id: AccountId,
        delta: Money,
    ) -> Result<Account, LedgerError> {
        if let Some(account) = self.tables.accounts.get(&id) {
            self.original_balances.entry(id).or_insert(account.balance);
        }
        self.tables.add_balance(id, delta)
    }

    async fn insert_transfer(&mut self, transfer: NewTransfer) -> Result<Transfer, LedgerError> {
        let stored = self.tables.append_transfer(&self.faults, transfer)?;
        self.appended.push(stored.id);
        Ok(stored)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.undo();
        if self.faults.fail_rollback.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage("injected rollback failure".into()));
        }
        debug!("Memory unit of work rolled back");
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.undo();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::CurrencyCode;
    use crate::transfer::exec_tx;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    async fn seed(store: &MemoryStore, balances: &[Money]) -> Vec<Account> {
        let ctx = RequestContext::background();
        let mut out = Vec::new();
        for balance in balances {
            out.push(
                AccountStore::insert(store, &ctx, NewAccount::new(*balance, usd()))
                    .await
                    .unwrap(),
            );
        }
        out
    }

    fn new_transfer(source: AccountId, target: AccountId, amount: Money) -> NewTransfer {
        NewTransfer {
            source_account_id: source,
            target_account_id: target,
            amount,
            currency: usd(),
        }
    }

    #[tokio::test]
    async fn test_account_crud() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let a = seed(&store, &[Money::new(dec!(10))]).await.remove(0);
        assert_eq!(a.id, 1);

        let mut changed = a.clone();
        changed.balance = Money::new(dec!(25.50));
        changed.currency = CurrencyCode::new("EUR").unwrap();
        let updated = store.update(&ctx, &changed).await.unwrap();
        assert_eq!(updated.balance, Money::new(dec!(25.50)));
        assert_eq!(updated.created_at, a.created_at);

        AccountStore::delete(&store, &ctx, a.id).await.unwrap();
        assert!(matches!(
            AccountStore::get(&store, &ctx, a.id).await,
            Err(LedgerError::NotFound { .. })
        ));
        // Deleting twice is an error, not a no-op
        assert!(matches!(
            store.delete(&ctx, a.id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_ids_not_found() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        assert!(matches!(
            AccountStore::get(&store, &ctx, 0).await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            TransferLog::get(&store, &ctx, -3).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_currency_patch_keeps_concurrent_credit() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let a = seed(&store, &[Money::new(dec!(100))]).await.remove(0);

        // A transfer credits the account after a reader took its snapshot.
        let snapshot = AccountStore::get(&store, &ctx, a.id).await.unwrap();
        store.add_balance(&ctx, a.id, Money::new(dec!(40))).await.unwrap();

        let patched = store
            .patch(
                &ctx,
                snapshot.id,
                AccountPatch {
                    balance: None,
                    currency: Some(CurrencyCode::new("EUR").unwrap()),
                },
            )
            .await
            .unwrap();

        assert_eq!(patched.balance, Money::new(dec!(140)));
        assert_eq!(patched.currency.as_str(), "EUR");
    }

    #[tokio::test]
    async fn test_patch_balance_and_missing_account() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let a = seed(&store, &[Money::new(dec!(100))]).await.remove(0);

        let patched = store
            .patch(
                &ctx,
                a.id,
                AccountPatch {
                    balance: Some(Money::new(dec!(5))),
                    currency: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.balance, Money::new(dec!(5)));
        assert_eq!(patched.currency, usd());

        assert!(matches!(
            store.patch(&ctx, 42, AccountPatch::default()).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        let ghost = Account {
            id: 42,
            balance: Money::ZERO,
            currency: usd(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            store.update(&ctx, &ghost).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_all_ordered_by_id() {
        let store = MemoryStore::new();
        seed(&store, &[Money::ZERO, Money::ZERO, Money::ZERO]).await;
        let ids: Vec<_> = AccountStore::get_all(&store, &RequestContext::background())
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_validate_accounts_request_order() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        seed(&store, &[Money::ZERO, Money::ZERO]).await;

        let [first, second] = store.validate_accounts(&ctx, 2, 1).await.unwrap();
        assert_eq!((first.id, second.id), (2, 1));
        assert!(matches!(
            store.validate_accounts(&ctx, 1, 3).await,
            Err(LedgerError::AccountsMissing)
        ));
    }

    #[tokio::test]
    async fn test_add_balance_accepts_negative_delta() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        seed(&store, &[Money::new(dec!(5))]).await;
        let account = store
            .add_balance(&ctx, 1, Money::new(dec!(-7.25)))
            .await
            .unwrap();
        assert_eq!(account.balance, Money::new(dec!(-2.25)));
    }

    #[tokio::test]
    async fn test_unit_of_work_rollback_restores() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        seed(&store, &[Money::new(dec!(100)), Money::ZERO]).await;
        store.fail_next_transfer_insert();

        let err = exec_tx(&store, &ctx, |tx| {
            Box::pin(async move {
                tx.add_balance(1, Money::new(dec!(-40))).await?;
                tx.add_balance(2, Money::new(dec!(40))).await?;
                tx.insert_transfer(new_transfer(1, 2, Money::new(dec!(40))))
                    .await
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LedgerError::Storage(_)));
        let a = AccountStore::get(&store, &ctx, 1).await.unwrap();
        let b = AccountStore::get(&store, &ctx, 2).await.unwrap();
        assert_eq!(a.balance, Money::new(dec!(100)));
        assert_eq!(b.balance, Money::ZERO);
        assert!(TransferLog::get_all(&store, &ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_rollback_is_compound_and_still_restores() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        seed(&store, &[Money::new(dec!(100)), Money::ZERO]).await;
        store.fail_next_transfer_insert();
        store.fail_next_rollback();

        let err = exec_tx(&store, &ctx, |tx| {
            Box::pin(async move {
                tx.add_balance(1, Money::new(dec!(-40))).await?;
                tx.insert_transfer(new_transfer(1, 2, Money::new(dec!(40))))
                    .await
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LedgerError::RollbackFailed { .. }));
        let a = AccountStore::get(&store, &ctx, 1).await.unwrap();
        assert_eq!(a.balance, Money::new(dec!(100)));
    }

    #[tokio::test]
    async fn test_committed_transfer_visible() {
        let store = MemoryStore::new();
        let ctx = RequestContext::background();
        seed(&store, &[Money::new(dec!(10)), Money::ZERO]).await;

        let transfer = exec_tx(&store, &ctx, |tx| {
            Box::pin(async move {
                tx.add_balance(1, Money::new(dec!(-10))).await?;
                tx.add_balance(2, Money::new(dec!(10))).await?;
                tx.insert_transfer(new_transfer(1, 2, Money::new(dec!(10))))
                    .await
            })
        })
        .await
        .unwrap();

        assert_eq!(TransferLog::get(&store, &ctx, transfer.id).await.unwrap(), transfer);
        assert_eq!(
            AccountStore::get(&store, &ctx, 2).await.unwrap().balance,
            Money::new(dec!(10))
        );
    }

    #[tokio::test]
    async fn test_transfer_amount_must_be_positive() {
        let store = MemoryStore::new();
        let err = TransferLog::insert(
            &store,
            &RequestContext::background(),
            new_transfer(1, 2, Money::ZERO),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn test_waiting_for_lock_observes_deadline() {
        let store = MemoryStore::new();
        seed(&store, &[Money::ZERO]).await;

        let held = store
            .begin(&RequestContext::background())
            .await
            .unwrap();
        let ctx = RequestContext::with_timeout(Duration::from_millis(30));
        let err = AccountStore::get_all(&store, &ctx).await.unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled));
        held.commit().await.unwrap();
    }
}
