//! Transfer Ledger - accounts, balances and atomic money transfers
//!
//! # Modules
//!
//! - [`money`] - Exact decimal amounts, banker's rounding on conversion
//! - [`account`] - Account model, currency codes, the [`AccountStore`] seam
//! - [`transfer`] - Transfer FSM, transfer log, unit of work
//! - [`converter`] - Currency rate providers
//! - [`store`] - PostgreSQL and in-memory backends
//! - [`gateway`] - Thin HTTP layer
//! - [`context`] - Per-request cancellation and deadline

// Core types - must be first!
pub mod core_types;

pub mod context;
pub mod error;
pub mod money;

pub mod account;
pub mod converter;
pub mod transfer;

pub mod db;
pub mod store;

pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountStore, CurrencyCode, NewAccount};
pub use context::RequestContext;
pub use converter::{ConversionError, CurrencyConverter, FixedRateConverter, HttpRateConverter};
pub use core_types::{AccountId, TransferId};
pub use error::{ErrorClass, LedgerError};
pub use money::Money;
pub use store::{MemoryStore, PgStore};
pub use transfer::{
    Transfer, TransferCoordinator, TransferLog, TransferRequest, TransferResult, TransferState,
    UnitOfWork,
};
