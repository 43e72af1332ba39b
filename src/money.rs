//! Money Module
//!
//! Exact decimal amounts for balances and transfers. Every amount in the
//! ledger goes through [`Money`]; binary floating point never touches a
//! balance.
//!
//! ## Rules
//! 1. Addition and negation are exact (no rounding).
//! 2. Currency conversion rounds to [`MINOR_UNITS`] places with
//!    round-half-to-even, so repeated conversions are reproducible.
//! 3. Parsing rejects malformed input instead of truncating it.
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//! use transfer_ledger::money::Money;
//!
//! let amount: Money = "100.00".parse().unwrap();
//! let rate = Decimal::from_str("0.905").unwrap();
//! let converted = amount.convert(rate).unwrap();
//! assert_eq!(converted.to_string(), "90.50");
//!
//! // Products beyond the decimal range are refused, not wrapped.
//! assert!(Money::new(Decimal::MAX).convert(Decimal::TWO).is_none());
//! ```

use std::fmt;
use std::ops::{Add, Neg};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places of a currency minor unit (cents).
pub const MINOR_UNITS: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Money
// ============================================================================

/// Fixed-precision decimal amount.
///
/// Serialized as a JSON string (`"100.00"`) so clients never round-trip
/// through a float. Stored as PostgreSQL `NUMERIC`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// True when the amount fits into currency minor units (at most 2 decimals).
    pub fn fits_minor_units(&self) -> bool {
        self.0.normalize().scale() <= MINOR_UNITS
    }

    /// Multiply by a conversion rate, rounding half-to-even to minor units.
    ///
    /// `None` when the product does not fit a `Decimal`.
    pub fn convert(&self, rate: Decimal) -> Option<Money> {
        let product = self.0.checked_mul(rate)?;
        Some(Money(product.round_dp_with_strategy(
            MINOR_UNITS,
            RoundingStrategy::MidpointNearestEven,
        )))
    }

    /// Checked addition, `None` on decimal overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

/// A debit is expressed as a credit of the negated amount.
impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parse a client-supplied amount such as `"1000.00"` or `"-5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyError::InvalidFormat("empty string".into()));
        }
        if s.contains(['e', 'E']) {
            return Err(MoneyError::InvalidFormat(
                "scientific notation is not accepted".into(),
            ));
        }
        if s.starts_with('.') || s.ends_with('.') {
            return Err(MoneyError::InvalidFormat(
                "use a leading and trailing digit (e.g. 0.5, 5.0)".into(),
            ));
        }

        Decimal::from_str_exact(s)
            .map(Money)
            .map_err(|e| MoneyError::InvalidFormat(e.to_string()))
    }
}
