//! # Contract Status
//!
//! Contracts move through a slightly longer life than transactions: once
//! both parties approve, the contract becomes Active and stays that way
//! until somebody closes it. Approval can also be followed straight by a
//! close, for agreements that were settled before they ever started.
//!
//! ```text
//! Draft ──► Approved ──► Active ──► Closed
//!   │           │                     ▲
//!   ▼           └─────────────────────┘
//! Rejected
//! ```
//!
//! Rejected and Closed are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_protocol::lifecycle::Lifecycle;
use tally_protocol::EngineError;

/// Lifecycle state of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    /// Being drafted. Title and description usually still moving.
    Draft,
    /// Both parties signed off on the wording.
    Approved,
    /// Declined before approval.
    Rejected,
    /// In force.
    Active,
    /// Done. Fulfilled, cancelled, or simply over.
    Closed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 5] = [
        ContractStatus::Draft,
        ContractStatus::Approved,
        ContractStatus::Rejected,
        ContractStatus::Active,
        ContractStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Active => "Active",
            Self::Closed => "Closed",
        }
    }
}

impl Lifecycle for ContractStatus {
    const INITIAL: Self = ContractStatus::Draft;
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (ContractStatus::Draft, ContractStatus::Approved),
        (ContractStatus::Draft, ContractStatus::Rejected),
        (ContractStatus::Approved, ContractStatus::Active),
        (ContractStatus::Approved, ContractStatus::Closed),
        (ContractStatus::Active, ContractStatus::Closed),
    ];
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                EngineError::type_mismatch("status", format!("unknown contract status '{s}'"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_protocol::lifecycle::{attempt_transition, Transition};
    use ContractStatus::*;

    #[test]
    fn happy_path_runs_in_sequence() {
        let mut status = ContractStatus::INITIAL;
        for next in [Approved, Active, Closed] {
            status = attempt_transition(status, next).unwrap().target();
        }
        assert_eq!(status, Closed);
    }

    #[test]
    fn draft_cannot_jump_to_active() {
        let denied = attempt_transition(Draft, Active).unwrap_err();
        assert_eq!(denied.from, Draft);
        assert_eq!(denied.to, Active);
    }

    #[test]
    fn approved_may_close_directly() {
        assert!(attempt_transition(Approved, Closed).unwrap().is_move());
    }

    #[test]
    fn closed_is_a_dead_end() {
        for requested in ContractStatus::ALL {
            let result = attempt_transition(Closed, requested);
            if requested == Closed {
                assert_eq!(result, Ok(Transition::Unchanged(Closed)));
            } else {
                assert!(result.is_err(), "Closed -> {requested} must fail");
            }
        }
    }

    #[test]
    fn terminal_states() {
        let terminal: Vec<_> = ContractStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![Rejected, Closed]);
    }

    #[test]
    fn active_has_one_way_out() {
        assert_eq!(Active.successors(), vec![Closed]);
        assert!(!Active.can_transition_to(Approved));
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("active".parse::<ContractStatus>().unwrap(), Active);
        assert!("signed".parse::<ContractStatus>().is_err());
    }
}
