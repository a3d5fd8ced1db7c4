//! Transaction status and its transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::lifecycle::Lifecycle;

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.
///
/// ```text
/// Draft ──► Approved ──► Transferred ──► Reversed
///   │          │
///   ▼          ▼
/// Rejected  Insufficient
/// ```
///
/// Rejected, Insufficient and Reversed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Created, amount still negotiable.
    Draft,
    /// Both sides agreed; funds may move.
    Approved,
    /// Declined before approval.
    Rejected,
    /// Approved, but the sender couldn't cover it.
    Insufficient,
    /// Funds moved.
    Transferred,
    /// Funds moved back.
    Reversed,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Draft,
        TransactionStatus::Approved,
        TransactionStatus::Rejected,
        TransactionStatus::Insufficient,
        TransactionStatus::Transferred,
        TransactionStatus::Reversed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Insufficient => "Insufficient",
            Self::Transferred => "Transferred",
            Self::Reversed => "Reversed",
        }
    }
}

impl Lifecycle for TransactionStatus {
    const INITIAL: Self = TransactionStatus::Draft;
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (TransactionStatus::Draft, TransactionStatus::Approved),
        (TransactionStatus::Draft, TransactionStatus::Rejected),
        (TransactionStatus::Approved, TransactionStatus::Insufficient),
        (TransactionStatus::Approved, TransactionStatus::Transferred),
        (TransactionStatus::Transferred, TransactionStatus::Reversed),
    ];
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EngineError::type_mismatch("status", format!("unknown transaction status '{s}'"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{attempt_transition, Transition};
    use TransactionStatus::*;

    #[test]
    fn draft_to_approved_succeeds() {
        assert!(attempt_transition(Draft, Approved).unwrap().is_move());
    }

    #[test]
    fn draft_to_transferred_is_denied() {
        assert!(attempt_transition(Draft, Transferred).is_err());
    }

    #[test]
    fn transferred_to_reversed_succeeds() {
        assert!(attempt_transition(Transferred, Reversed).is_ok());
    }

    #[test]
    fn reversed_only_accepts_itself() {
        for requested in TransactionStatus::ALL {
            let result = attempt_transition(Reversed, requested);
            if requested == Reversed {
                assert_eq!(result, Ok(Transition::Unchanged(Reversed)));
            } else {
                assert!(result.is_err(), "Reversed -> {requested} must fail");
            }
        }
    }

    #[test]
    fn terminal_states() {
        let terminal: Vec<_> = TransactionStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![Rejected, Insufficient, Reversed]);
    }

    #[test]
    fn table_is_exactly_the_documented_edges() {
        let mut allowed = 0;
        for from in TransactionStatus::ALL {
            for to in TransactionStatus::ALL {
                if from != to && from.can_transition_to(to) {
                    allowed += 1;
                }
            }
        }
        assert_eq!(allowed, 5);
        assert!(!Approved.can_transition_to(Draft));
        assert!(!Rejected.can_transition_to(Approved));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("approved".parse::<TransactionStatus>().unwrap(), Approved);
        assert_eq!(" REVERSED ".parse::<TransactionStatus>().unwrap(), Reversed);
        assert!("settled".parse::<TransactionStatus>().is_err());
    }
}
