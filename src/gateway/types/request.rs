//! Request DTOs and the validating JSON extractor.
//!
//! DTOs are checked with `validator` before any domain object is built; the
//! ledger still applies its own business rules afterwards.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::money::StrictAmount;
use super::response::ApiError;
use crate::account::validation::CurrencyCode;
use crate::core_types::AccountId;
use crate::error::LedgerError;

/// `POST /accounts`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    /// Opening balance; zero when omitted
    #[serde(default)]
    pub balance: Option<StrictAmount>,
    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,
}

/// `PATCH /accounts/{id}`: absent fields keep their stored value
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub balance: Option<StrictAmount>,
    #[serde(default)]
    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: Option<String>,
}

/// `POST /transfer`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1, message = "source_account_id must be positive"))]
    pub source_account_id: AccountId,
    #[validate(range(min = 1, message = "target_account_id must be positive"))]
    pub target_account_id: AccountId,
    pub amount: StrictAmount,
    #[validate(length(equal = 3, message = "currency must be a 3-letter code"))]
    pub currency: String,
}

/// Parse a DTO currency field into the domain type.
pub fn currency(value: &str) -> Result<CurrencyCode, ApiError> {
    CurrencyCode::new(value).map_err(|e| ApiError::from(LedgerError::from(e)))
}

// ============================================================================
// ValidatedJson: Axum Framework Integration
// ============================================================================

/// JSON body that has passed `Validate`. Handlers never see an invalid DTO;
/// malformed bodies are answered with the standard error envelope.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value): Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}
