//! Input validation for currency codes
//!
//! [`CurrencyCode`] keeps its field private so every code in the ledger has
//! gone through [`CurrencyCode::new`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Validation errors for currency codes
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Currency code must be uppercase: got '{got}', expected '{expected}'")]
    CurrencyNotUppercase { got: String, expected: String },

    #[error("Invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid format for {field}: '{value}' (expected: {expected})")]
    InvalidFormat {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Validated ISO-4217 style currency code (`USD`, `EUR`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub const LEN: usize = 3;

    /// Create a new validated CurrencyCode
    ///
    /// # Validation Rules
    /// - Surrounding whitespace is trimmed
    /// - Exactly 3 characters
    /// - Uppercase ASCII letters only
    ///
    /// # Examples
    /// ```
    /// use transfer_ledger::account::validation::CurrencyCode;
    ///
    /// let usd = CurrencyCode::new("USD").unwrap();
    /// assert_eq!(usd.as_str(), "USD");
    ///
    /// assert!(CurrencyCode::new("usd").is_err()); // lowercase rejected
    /// ```
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();

        if code.chars().count() != Self::LEN {
            return Err(ValidationError::InvalidLength {
                field: "currency",
                expected: Self::LEN,
                actual: code.chars().count(),
            });
        }

        if !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency",
                value: code.to_string(),
                expected: "letters A-Z only",
            });
        }

        let expected = code.to_ascii_uppercase();
        if code != expected {
            return Err(ValidationError::CurrencyNotUppercase {
                got: code.to_string(),
                expected,
            });
        }

        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::new(s)
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CurrencyCode::new(&raw).map_err(serde::de::Error::custom)
    }
}
