//! Data models for accounts

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::validation::CurrencyCode;
use crate::core_types::AccountId;
use crate::money::Money;

/// Account row
///
/// `balance` is signed: the store never enforces non-negativity, the transfer
/// coordinator does before applying a debit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Money,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new account; id and timestamp come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub balance: Money,
    pub currency: CurrencyCode,
}

impl NewAccount {
    pub fn new(balance: Money, currency: CurrencyCode) -> Self {
        Self { balance, currency }
    }
}

/// Partial account change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub balance: Option<Money>,
    pub currency: Option<CurrencyCode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_serializes_amount_as_string() {
        let account = Account {
            id: 1,
            balance: Money::new(dec!(1000.00)),
            currency: CurrencyCode::new("USD").unwrap(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["balance"], "1000.00");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["id"], 1);
    }
}
