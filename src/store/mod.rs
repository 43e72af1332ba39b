//! Storage backends
//!
//! Each backend implements [`AccountStore`](crate::account::AccountStore),
//! [`TransferLog`](crate::transfer::TransferLog) and
//! [`UnitOfWork`](crate::transfer::UnitOfWork) on one type, so the balance
//! deltas and the transfer record share a transaction.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
