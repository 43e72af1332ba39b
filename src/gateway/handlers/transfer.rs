//! Transfer handlers

use std::sync::Arc;

use axum::extract::{Path, State};

use super::super::state::AppState;
use super::super::types::request::currency;
use super::super::types::{ApiResult, CreateTransferRequest, ValidatedJson, ok};
use super::parse_id;
use crate::transfer::{Transfer, TransferRequest, TransferResult};

/// POST /transfer
///
/// Bounded by the transfer deadline; an expired deadline answers 504 and
/// leaves both balances untouched.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateTransferRequest>,
) -> ApiResult<TransferResult> {
    let request = TransferRequest::new(
        req.source_account_id,
        req.target_account_id,
        req.amount.inner(),
        currency(&req.currency)?,
    );

    let ctx = state.transfer_ctx();
    ok(state.coordinator.transfer(&ctx, request).await?)
}

/// GET /transactions
pub async fn list_transfers(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Transfer>> {
    let ctx = state.list_ctx();
    ok(state.transfers.get_all(&ctx).await?)
}

/// GET /transactions/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Transfer> {
    let id = parse_id(&id)?;
    let ctx = state.list_ctx();
    ok(state.transfers.get(&ctx, id).await?)
}
