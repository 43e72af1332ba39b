//! HTTP handlers

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{create_account, delete_account, get_account, list_accounts, update_account};
pub use health::health_check;
pub use transfer::{create_transfer, get_transfer, list_transfers};

use super::types::ApiError;

/// Parse a path id. Non-numeric input is a bad request; non-positive ids
/// are left to the store, which answers `NotFound`.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {}", raw)))
}
