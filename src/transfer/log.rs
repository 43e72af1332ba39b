//! Transfer log seam: append-only record of committed transfers.

use async_trait::async_trait;

use super::types::{NewTransfer, Transfer};
use crate::context::RequestContext;
use crate::core_types::TransferId;
use crate::error::LedgerError;

/// Append-only transfer log. Records are never updated or deleted.
///
/// Inserts that belong to a transfer go through
/// [`TxScope::insert_transfer`](super::unit_of_work::TxScope::insert_transfer)
/// so they commit or roll back with the balance changes.
#[async_trait]
pub trait TransferLog: Send + Sync {
    /// Append a record outside any unit of work; the log assigns `id`.
    async fn insert(&self, ctx: &RequestContext, transfer: NewTransfer)
    -> Result<Transfer, LedgerError>;

    /// Missing or invalid (`<= 0`) ids yield `NotFound`.
    async fn get(&self, ctx: &RequestContext, id: TransferId) -> Result<Transfer, LedgerError>;

    /// All transfers ordered by id.
    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Transfer>, LedgerError>;
}
