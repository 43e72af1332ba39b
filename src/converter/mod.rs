//! Currency Converter
//!
//! Resolves a conversion multiplier between two currency codes and applies
//! it to an amount. The rate source is an unreliable dependency: every
//! failure surfaces as a [`ConversionError`], which the orchestrator
//! collapses into a single `CurrencyConversionFailed`.

pub mod fixed;
pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::CurrencyCode;
use crate::money::Money;

pub use fixed::FixedRateConverter;
pub use http::HttpRateConverter;

/// Rate lookup failures. Callers never branch on the variant; it exists for logs.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("rate request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate provider responded with status {0}")]
    Status(u16),

    #[error("malformed rate response: {0}")]
    Malformed(String),

    #[error("no rate for {from}->{to}")]
    MissingRate { from: String, to: String },

    #[error("unusable rate {rate} for {from}->{to}")]
    InvalidRate {
        from: String,
        to: String,
        rate: Decimal,
    },

    #[error("{amount} {from} overflows when converted to {to}")]
    Overflow {
        from: String,
        to: String,
        amount: Money,
    },

    #[error("rate provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Convert `amount` from `from` into `to`, rounded half-to-even to minor units.
    async fn convert(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        amount: Money,
    ) -> Result<Money, ConversionError>;
}

/// Reject zero, negative or absent multipliers before they reach a balance.
pub(crate) fn checked_rate(
    from: &CurrencyCode,
    to: &CurrencyCode,
    rate: Option<Decimal>,
) -> Result<Decimal, ConversionError> {
    match rate {
        None => Err(ConversionError::MissingRate {
            from: from.to_string(),
            to: to.to_string(),
        }),
        Some(rate) if rate <= Decimal::ZERO => Err(ConversionError::InvalidRate {
            from: from.to_string(),
            to: to.to_string(),
            rate,
        }),
        Some(rate) => Ok(rate),
    }
}

/// Apply `rate` to `amount`; a product past the decimal range is an error.
pub(crate) fn apply_rate(
    from: &CurrencyCode,
    to: &CurrencyCode,
    amount: Money,
    rate: Decimal,
) -> Result<Money, ConversionError> {
    amount.convert(rate).ok_or_else(|| ConversionError::Overflow {
        from: from.to_string(),
        to: to.to_string(),
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::new(s).unwrap()
    }

    #[test]
    fn test_checked_rate() {
        let (usd, eur) = (code("USD"), code("EUR"));
        assert_eq!(checked_rate(&usd, &eur, Some(dec!(0.9))).unwrap(), dec!(0.9));
        assert!(matches!(
            checked_rate(&usd, &eur, None),
            Err(ConversionError::MissingRate { .. })
        ));
        assert!(matches!(
            checked_rate(&usd, &eur, Some(Decimal::ZERO)),
            Err(ConversionError::InvalidRate { .. })
        ));
        assert!(matches!(
            checked_rate(&usd, &eur, Some(dec!(-1))),
            Err(ConversionError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_apply_rate_overflow() {
        let (usd, eur) = (code("USD"), code("EUR"));
        assert_eq!(
            apply_rate(&usd, &eur, Money::new(dec!(100.00)), dec!(0.90)).unwrap(),
            Money::new(dec!(90.00))
        );
        let err = apply_rate(&usd, &eur, Money::new(Decimal::MAX), dec!(1.11)).unwrap_err();
        assert!(matches!(err, ConversionError::Overflow { .. }));
    }

    #[test]
    fn test_error_messages_name_the_pair() {
        let err = ConversionError::MissingRate {
            from: "USD".into(),
            to: "JPY".into(),
        };
        assert_eq!(err.to_string(), "no rate for USD->JPY");
    }
}
