//! Transfer FSM State Definitions
//!
//! ```text
//! VALIDATING → [CONVERTING] → CHECKING_BALANCE → APPLYING → COMMITTED
//!      └────────────┴────────────────┴─────────────┴────→ ABORTED
//! ```
//!
//! CONVERTING is skipped when both accounts share a currency. ABORTED is
//! reachable from every non-terminal state.

use std::fmt;

/// Transfer FSM States
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Identity, amount and existence checks; nothing written yet
    Validating,

    /// Waiting on the currency converter (only when currencies differ)
    Converting,

    /// Comparing the source balance with the post-conversion amount
    CheckingBalance,

    /// Inside the unit of work: debit, credit, transfer record
    Applying,

    /// Terminal: unit of work committed
    Committed,

    /// Terminal: request rejected or unit of work rolled back
    Aborted,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::Aborted)
    }

    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (s, Aborted) => !s.is_terminal(),
            (Validating, Converting) | (Validating, CheckingBalance) => true,
            (Converting, CheckingBalance) => true,
            (CheckingBalance, Applying) => true,
            (Applying, Committed) => true,
            _ => false,
        }
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Validating => "VALIDATING",
            TransferState::Converting => "CONVERTING",
            TransferState::CheckingBalance => "CHECKING_BALANCE",
            TransferState::Applying => "APPLYING",
            TransferState::Committed => "COMMITTED",
            TransferState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
