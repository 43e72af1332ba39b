//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError`: ledger error rendered with status + envelope
//! - `error_codes`: Standard error code constants

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::LedgerError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &err {
            LedgerError::NotFound { entity: "Transfer", .. } => error_codes::TRANSFER_NOT_FOUND,
            LedgerError::NotFound { .. } | LedgerError::AccountsMissing => {
                error_codes::ACCOUNT_NOT_FOUND
            }
            LedgerError::IdenticalAccount => error_codes::IDENTICAL_ACCOUNT,
            LedgerError::InvalidAmount(_) | LedgerError::InvalidCurrency(_) => {
                error_codes::INVALID_PARAMETER
            }
            LedgerError::CurrencyMismatch { .. } => error_codes::CURRENCY_MISMATCH,
            LedgerError::CurrencyConversionFailed(_) => error_codes::CURRENCY_CONVERSION_FAILED,
            LedgerError::InsufficientBalance { .. } => error_codes::INSUFFICIENT_BALANCE,
            LedgerError::Cancelled => error_codes::TIMEOUT,
            LedgerError::Storage(_) | LedgerError::RollbackFailed { .. } => {
                error_codes::INTERNAL_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        }
        // Storage details stay in the logs.
        let msg = match &err {
            LedgerError::Storage(_) | LedgerError::RollbackFailed { .. } => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(self.code, self.msg));
        (self.status, body).into_response()
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const IDENTICAL_ACCOUNT: i32 = 1003;
    pub const CURRENCY_MISMATCH: i32 = 1004;
    pub const CURRENCY_CONVERSION_FAILED: i32 = 1005;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSFER_NOT_FOUND: i32 = 4002;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const TIMEOUT: i32 = 5004;
}
