//! Amount fields in request bodies.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::money::Money;

// ============================================================================
// StrictAmount: Format-Validated Money at Serde Layer
// ============================================================================

/// Strict format amount - validates format during deserialization
///
/// - Accepts a JSON string (`"100.00"`, preferred) or a JSON number
/// - Rejects `.5` (must be `0.5`) and `5.` (must be `5.0` or `5`)
/// - Rejects scientific notation and empty strings
///
/// Sign and precision are business rules and are checked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrictAmount(Money);

impl StrictAmount {
    pub fn inner(self) -> Money {
        self.0
    }
}

impl<'de> Deserialize<'de> for StrictAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => s
                .parse::<Money>()
                .map(StrictAmount)
                .map_err(|e| D::Error::custom(format!("Invalid amount '{}': {}", s, e))),
            DecimalOrString::Number(d) => Ok(StrictAmount(Money::new(d))),
        }
    }
}
