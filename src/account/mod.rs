//! Account module
//!
//! Account model, currency-code validation and the [`AccountStore`] seam.

pub mod models;
pub mod repository;
pub mod validation;

// Re-export commonly used types
pub use models::{Account, AccountPatch, NewAccount};
pub use repository::AccountStore;
pub use validation::{CurrencyCode, ValidationError};
