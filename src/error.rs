//! Ledger Error Types
//!
//! One stable kind per failure condition. The presentation layer only needs
//! [`LedgerError::class`] to pick a transport status.

use thiserror::Error;

use crate::account::validation::ValidationError;

/// Coarse error class consumed by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    BadRequest,
    Internal,
}

/// Ledger error types
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Existence Errors ===
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("One or more of the given accounts does not exist")]
    AccountsMissing,

    // === Validation Errors ===
    #[error("Source and target account are the same")]
    IdenticalAccount,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Request currency {requested} does not match source account currency {account}")]
    CurrencyMismatch { requested: String, account: String },

    #[error("Invalid currency: {0}")]
    InvalidCurrency(#[from] ValidationError),

    // === Transfer Errors ===
    #[error("Could not convert currency: {0}")]
    CurrencyConversionFailed(String),

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: String, required: String },

    // === System Errors ===
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Transaction failed: {error}; rollback also failed: {rollback}")]
    RollbackFailed {
        error: Box<LedgerError>,
        rollback: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn account_not_found(id: i64) -> Self {
        LedgerError::NotFound {
            entity: "Account",
            id,
        }
    }

    pub fn transfer_not_found(id: i64) -> Self {
        LedgerError::NotFound {
            entity: "Transfer",
            id,
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::AccountsMissing => "ACCOUNT_NOT_FOUND",
            LedgerError::IdenticalAccount => "IDENTICAL_ACCOUNT",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::InvalidCurrency(_) => "INVALID_CURRENCY",
            LedgerError::CurrencyConversionFailed(_) => "CURRENCY_CONVERSION_FAILED",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Cancelled => "CANCELLED",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::NotFound { .. } | LedgerError::AccountsMissing => ErrorClass::NotFound,
            LedgerError::IdenticalAccount
            | LedgerError::InvalidAmount(_)
            | LedgerError::CurrencyMismatch { .. }
            | LedgerError::InvalidCurrency(_)
            | LedgerError::CurrencyConversionFailed(_)
            | LedgerError::InsufficientBalance { .. } => ErrorClass::BadRequest,
            LedgerError::Storage(_)
            | LedgerError::Cancelled
            | LedgerError::RollbackFailed { .. } => ErrorClass::Internal,
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match (self.class(), self) {
            (_, LedgerError::Cancelled) => 504,
            (ErrorClass::NotFound, _) => 404,
            (ErrorClass::BadRequest, _) => 400,
            (ErrorClass::Internal, _) => 500,
        }
    }

    /// Pair a work error with the error raised while rolling it back.
    pub fn with_rollback_failure(self, rollback: LedgerError) -> Self {
        LedgerError::RollbackFailed {
            error: Box::new(self),
            rollback: Box::new(rollback),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if crate::db::is_query_canceled(&e) {
            return LedgerError::Cancelled;
        }
        LedgerError::Storage(e.to_string())
    }
}
