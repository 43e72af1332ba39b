//! Account handlers (CRUD)

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::request::currency;
use super::super::types::{
    ApiError, ApiResult, CreateAccountRequest, UpdateAccountRequest, ValidatedJson, ok,
};
use super::parse_id;
use crate::account::{Account, AccountPatch, NewAccount};
use crate::core_types::AccountId;
use crate::error::LedgerError;
use crate::money::{MINOR_UNITS, Money};

#[derive(Debug, Serialize)]
pub struct DeletedAccount {
    pub id: AccountId,
}

fn checked_balance(balance: Money) -> Result<Money, ApiError> {
    if !balance.fits_minor_units() {
        return Err(LedgerError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            balance, MINOR_UNITS
        ))
        .into());
    }
    Ok(balance)
}

/// GET /accounts
pub async fn list_accounts(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Account>> {
    let ctx = state.list_ctx();
    ok(state.accounts.get_all(&ctx).await?)
}

/// POST /accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let balance = checked_balance(req.balance.map(|b| b.inner()).unwrap_or(Money::ZERO))?;
    let new_account = NewAccount::new(balance, currency(&req.currency)?);

    let ctx = state.list_ctx();
    let account = state.accounts.insert(&ctx, new_account).await?;
    tracing::info!(account_id = account.id, currency = %account.currency, "Account created");
    ok(account)
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let id = parse_id(&id)?;
    let ctx = state.list_ctx();
    ok(state.accounts.get(&ctx, id).await?)
}

/// PATCH /accounts/{id}
///
/// Only the fields present are written; a currency-only patch leaves the
/// balance to concurrent transfers.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateAccountRequest>,
) -> ApiResult<Account> {
    let id = parse_id(&id)?;
    let patch = AccountPatch {
        balance: req.balance.map(|b| checked_balance(b.inner())).transpose()?,
        currency: req.currency.as_deref().map(currency).transpose()?,
    };

    let ctx = state.list_ctx();
    let account = state.accounts.patch(&ctx, id, patch).await?;
    tracing::info!(account_id = account.id, "Account updated");
    ok(account)
}

/// DELETE /accounts/{id}
///
/// Historical transfers referencing the account are kept.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<DeletedAccount> {
    let id = parse_id(&id)?;
    let ctx = state.list_ctx();
    state.accounts.delete(&ctx, id).await?;
    tracing::info!(account_id = id, "Account deleted");
    ok(DeletedAccount { id })
}
