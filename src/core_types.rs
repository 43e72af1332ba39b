//! Core types used throughout the ledger
//!
//! Identifier aliases shared by the account store, the transfer log and the
//! gateway.

/// Account ID - assigned by the store on insert, immutable afterwards.
///
/// # Constraints:
/// - **Positive**: ids start at 1; `0` and negatives are the invalid sentinel
///   and are answered with `NotFound` without touching storage.
pub type AccountId = i64;

/// Transfer ID - assigned by the transfer log when a transfer commits.
pub type TransferId = i64;

/// Basic validity check applied before any lookup by id.
#[inline]
pub fn is_valid_id(id: i64) -> bool {
    id > 0
}
