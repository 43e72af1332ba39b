//! PostgreSQL ledger store (sqlx).
//!
//! One [`PgStore`] serves all three seams: the account store, the transfer
//! log and the unit of work. Queries used both on the pool and inside a
//! transaction are written once against [`PgExecutor`].
//!
//! Every call is awaited through the request context and runs in a
//! transaction that carries the remaining deadline to the server as
//! `SET LOCAL statement_timeout`, so an expired request surfaces as
//! SQLSTATE 57014 and maps to `Cancelled`.

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::{PgExecutor, Postgres, Row, Transaction};
use tracing::debug;

use crate::account::repository::pair_in_order;
use crate::account::{Account, AccountPatch, AccountStore, CurrencyCode, NewAccount};
use crate::context::RequestContext;
use crate::core_types::{is_valid_id, AccountId, TransferId};
use crate::error::LedgerError;
use crate::money::Money;
use crate::transfer::{NewTransfer, Transfer, TransferLog, TxScope, UnitOfWork};

const ACCOUNT_COLUMNS: &str = "id, balance, currency, created_at";
const TRANSFER_COLUMNS: &str =
    "id, source_account_id, target_account_id, amount, currency, created_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn stored_currency(value: &str) -> Result<CurrencyCode, LedgerError> {
    CurrencyCode::new(value)
        .map_err(|e| LedgerError::Storage(format!("stored currency '{}': {}", value, e)))
}

fn account_from_row(row: &PgRow) -> Result<Account, LedgerError> {
    let currency: String = row.try_get("currency")?;
    Ok(Account {
        id: row.try_get("id")?,
        balance: row.try_get("balance")?,
        currency: stored_currency(&currency)?,
        created_at: row.try_get("created_at")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<Transfer, LedgerError> {
    let currency: String = row.try_get("currency")?;
    Ok(Transfer {
        id: row.try_get("id")?,
        source_account_id: row.try_get("source_account_id")?,
        target_account_id: row.try_get("target_account_id")?,
        amount: row.try_get("amount")?,
        currency: stored_currency(&currency)?,
        created_at: row.try_get("created_at")?,
    })
}

async fn add_balance_on<'e, E>(
    executor: E,
    id: AccountId,
    delta: Money,
) -> Result<Account, LedgerError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING {}",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(delta)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    match row {
        Some(row) => account_from_row(&row),
        None => Err(LedgerError::account_not_found(id)),
    }
}

async fn insert_transfer_on<'e, E>(
    executor: E,
    transfer: &NewTransfer,
) -> Result<Transfer, LedgerError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO transfers (source_account_id, target_account_id, amount, currency) \
         VALUES ($1, $2, $3, $4) RETURNING {}",
        TRANSFER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(transfer.source_account_id)
        .bind(transfer.target_account_id)
        .bind(transfer.amount)
        .bind(transfer.currency.as_str())
        .fetch_one(executor)
        .await?;
    transfer_from_row(&row)
}

#[async_trait]
impl AccountStore for PgStore {
    async fn insert(
        &self,
        ctx: &RequestContext,
        account: NewAccount,
    ) -> Result<Account, LedgerError> {
        let sql = format!(
            "INSERT INTO accounts (balance, currency) VALUES ($1, $2) RETURNING {}",
            ACCOUNT_COLUMNS
        );
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql)
                    .bind(account.balance)
                    .bind(account.currency.as_str())
                    .fetch_one(&mut *conn)
                    .await?;
                account_from_row(&row)
            })
        })
        .await
    }

    async fn get(&self, ctx: &RequestContext, id: AccountId) -> Result<Account, LedgerError> {
        if !is_valid_id(id) {
            return Err(LedgerError::account_not_found(id));
        }
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
                match row {
                    Some(row) => account_from_row(&row),
                    None => Err(LedgerError::account_not_found(id)),
                }
            })
        })
        .await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        account: &Account,
    ) -> Result<Account, LedgerError> {
        let id = account.id;
        if !is_valid_id(id) {
            return Err(LedgerError::account_not_found(id));
        }
        let sql = format!(
            "UPDATE accounts SET balance = $1, currency = $2 WHERE id = $3 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let (balance, currency) = (account.balance, account.currency.clone());
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql)
                    .bind(balance)
                    .bind(currency.as_str())
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
                match row {
                    Some(row) => account_from_row(&row),
                    None => Err(LedgerError::account_not_found(id)),
                }
            })
        })
        .await
    }

    async fn patch(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<Account, LedgerError> {
        if !is_valid_id(id) {
            return Err(LedgerError::account_not_found(id));
        }
        let sql = format!(
            "UPDATE accounts SET balance = COALESCE($1, balance), \
             currency = COALESCE($2, currency) WHERE id = $3 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql)
                    .bind(patch.balance)
                    .bind(patch.currency.as_ref().map(|c| c.as_str()))
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
                match row {
                    Some(row) => account_from_row(&row),
                    None => Err(LedgerError::account_not_found(id)),
                }
            })
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: AccountId) -> Result<(), LedgerError> {
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(LedgerError::account_not_found(id));
                }
                Ok(())
            })
        })
        .await
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Account>, LedgerError> {
        let sql = format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS);
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
                rows.iter()
                    .map(account_from_row)
                    .collect::<Result<Vec<_>, LedgerError>>()
            })
        })
        .await
    }

    async fn add_balance(
        &self,
        ctx: &RequestContext,
        id: AccountId,
        delta: Money,
    ) -> Result<Account, LedgerError> {
        self.timed(ctx, move |conn| Box::pin(add_balance_on(conn, id, delta)))
            .await
    }

    async fn validate_accounts(
        &self,
        ctx: &RequestContext,
        first: AccountId,
        second: AccountId,
    ) -> Result<[Account; 2], LedgerError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE id IN ($1, $2)",
            ACCOUNT_COLUMNS
        );
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let rows = sqlx::query(&sql)
                    .bind(first)
                    .bind(second)
                    .fetch_all(&mut *conn)
                    .await?;
                let accounts = rows
                    .iter()
                    .map(account_from_row)
                    .collect::<Result<Vec<_>, _>>()?;
                pair_in_order(accounts, first, second)
            })
        })
        .await
    }
}

#[async_trait]
impl TransferLog for PgStore {
    async fn insert(
        &self,
        ctx: &RequestContext,
        transfer: NewTransfer,
    ) -> Result<Transfer, LedgerError> {
        self.timed(ctx, move |conn| {
            Box::pin(async move { insert_transfer_on(conn, &transfer).await })
        })
        .await
    }

    async fn get(&self, ctx: &RequestContext, id: TransferId) -> Result<Transfer, LedgerError> {
        if !is_valid_id(id) {
            return Err(LedgerError::transfer_not_found(id));
        }
        let sql = format!("SELECT {} FROM transfers WHERE id = $1", TRANSFER_COLUMNS);
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?;
                match row {
                    Some(row) => transfer_from_row(&row),
                    None => Err(LedgerError::transfer_not_found(id)),
                }
            })
        })
        .await
    }

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Transfer>, LedgerError> {
        let sql = format!("SELECT {} FROM transfers ORDER BY id", TRANSFER_COLUMNS);
        self.timed(ctx, move |conn| {
            Box::pin(async move {
                let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
                rows.iter()
                    .map(transfer_from_row)
                    .collect::<Result<Vec<_>, LedgerError>>()
            })
        })
        .await
    }
}

impl PgStore {
    /// Open a transaction; a bounded context also sets the server-side
    /// `statement_timeout` to the time it has left.
    async fn begin_bounded(
        &self,
        ctx: &RequestContext,
    ) -> Result<Transaction<'static, Postgres>, LedgerError> {
        ctx.run(async {
            let mut tx = self.pool.begin().await?;
            if let Some(remaining) = ctx.remaining() {
                // SET does not take bind parameters; the value is an integer we format.
                let millis = remaining.as_millis().max(1);
                sqlx::query(&format!("SET LOCAL statement_timeout = {}", millis))
                    .execute(&mut *tx)
                    .await?;
                debug!(statement_timeout_ms = %millis, "Deadline pushed to server");
            }
            Ok::<_, LedgerError>(tx)
        })
        .await
    }

    /// Run one store operation in its own short transaction, so abandoned
    /// statements are also cancelled on the server. Commit is not interrupted.
    async fn timed<T, F>(&self, ctx: &RequestContext, op: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, LedgerError>> + Send,
    {
        let mut tx = self.begin_bounded(ctx).await?;
        let out = ctx.run(op(&mut *tx)).await?;
        tx.commit().await?;
        Ok(out)
    }

    async fn begin_tx(&self, ctx: &RequestContext) -> Result<PgTx, LedgerError> {
        Ok(PgTx {
            tx: self.begin_bounded(ctx).await?,
        })
    }
}

#[async_trait]
impl UnitOfWork for PgStore {
    async fn begin(&self, ctx: &RequestContext) -> Result<Box<dyn TxScope>, LedgerError> {
        Ok(Box::new(self.begin_tx(ctx).await?))
    }
}

/// Open PostgreSQL transaction. Dropping it without commit rolls back.
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TxScope for PgTx {
    async fn add_balance(
        &mut self,
        id: AccountId,
        delta: Money,
    ) -> Result<Account, LedgerError> {
        add_balance_on(&mut *self.tx, id, delta).await
    }

    async fn insert_transfer(&mut self, transfer: NewTransfer) -> Result<Transfer, LedgerError> {
        insert_transfer_on(&mut *self.tx, &transfer).await
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
