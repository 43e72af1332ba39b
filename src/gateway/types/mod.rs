//! Gateway types
//!
//! - `response`: envelope, `ApiError`, error codes
//! - `request`: validated request DTOs
//! - `money`: strict amount parsing for request bodies

pub mod money;
pub mod request;
pub mod response;

pub use money::StrictAmount;
pub use request::{
    CreateAccountRequest, CreateTransferRequest, UpdateAccountRequest, ValidatedJson,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
