//! Money Transfer
//!
//! Atomic transfer of money between two accounts.
//!
//! # State Machine
//!
//! ```text
//! VALIDATING → [CONVERTING] → CHECKING_BALANCE → APPLYING → COMMITTED
//!                    any non-terminal state ──────────────→ ABORTED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Validate-Before-Write**: identity and existence checks precede any
//!    balance mutation
//! 2. **One Unit of Work**: debit, credit and the transfer record commit
//!    together or not at all
//! 3. **Atomic Increment**: balances change through `balance = balance + delta`,
//!    never load-then-store
//! 4. **Post-Conversion Check**: sufficiency is judged against the converted
//!    amount

pub mod coordinator;
pub mod log;
pub mod state;
pub mod types;
pub mod unit_of_work;

pub use coordinator::TransferCoordinator;
pub use log::TransferLog;
pub use state::TransferState;
pub use types::{NewTransfer, Transfer, TransferRequest, TransferResult};
pub use unit_of_work::{exec_tx, TxScope, UnitOfWork};
