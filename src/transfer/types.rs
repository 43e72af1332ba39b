//! Transfer Types

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{Account, CurrencyCode};
use crate::core_types::{AccountId, TransferId};
use crate::money::Money;

/// Immutable record of a committed transfer.
///
/// `amount` is what the target was credited, denominated in `currency`
/// (the target account's currency).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    pub id: TransferId,
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
}

/// Transfer row before the log assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransfer {
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: Money,
    pub currency: CurrencyCode,
}

/// Caller input for a transfer; `amount` is denominated in `currency`,
/// which must be the source account's currency.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: Money,
    pub currency: CurrencyCode,
}

impl TransferRequest {
    pub fn new(
        source_account_id: AccountId,
        target_account_id: AccountId,
        amount: Money,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            source_account_id,
            target_account_id,
            amount,
            currency,
        }
    }
}

/// Returned to the caller on commit; not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub source_account: Account,
    pub target_account: Account,
}
