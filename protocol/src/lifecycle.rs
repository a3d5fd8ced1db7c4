//! # Lifecycle State Machines
//!
//! Transaction status and contract status are the only two fields in the
//! whole domain with a lifecycle. Both follow the same shape: an initial
//! state, a table of allowed edges, and terminal states with no way out.
//!
//! The edges are *data*. Each status enum implements [`Lifecycle`] by
//! listing its `(from, to)` pairs in [`Lifecycle::TRANSITIONS`], and every
//! status change in the system goes through the single
//! [`attempt_transition`] function below. There is no per-operation
//! `match` deciding which moves are legal. If you want to know what a
//! status can do, read its table.
//!
//! Two rules apply to every lifecycle:
//!
//! - Requesting the current state is a successful no-op, terminal states
//!   included ([`Transition::Unchanged`]).
//! - Requesting a state that isn't one edge away fails with
//!   [`TransitionDenied`]. No skipping ahead, no going back.

use std::fmt;

/// A status enum with an explicit transition table.
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Where every new record starts.
    const INITIAL: Self;

    /// Allowed `(from, to)` edges. Reflexive moves are implicit and must
    /// not be listed.
    const TRANSITIONS: &'static [(Self, Self)];

    /// Whether `(self, next)` is an edge in the table. Does not include the
    /// reflexive no-op; see [`attempt_transition`] for that.
    fn can_transition_to(self, next: Self) -> bool {
        Self::TRANSITIONS
            .iter()
            .any(|&(from, to)| from == self && to == next)
    }

    /// Every state reachable in one step.
    fn successors(self) -> Vec<Self> {
        Self::TRANSITIONS
            .iter()
            .filter(|(from, _)| *from == self)
            .map(|&(_, to)| to)
            .collect()
    }

    /// No outgoing edges.
    fn is_terminal(self) -> bool {
        !Self::TRANSITIONS.iter().any(|(from, _)| *from == self)
    }
}

/// Outcome of a permitted transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<L> {
    /// The requested state is the current one. Nothing to write.
    Unchanged(L),
    /// A real edge was taken.
    Moved { from: L, to: L },
}

impl<L: Lifecycle> Transition<L> {
    /// The state after the transition.
    pub fn target(&self) -> L {
        match *self {
            Transition::Unchanged(state) => state,
            Transition::Moved { to, .. } => to,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

/// A transition request the table doesn't allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDenied<L> {
    pub from: L,
    pub to: L,
}

impl<L: Lifecycle> fmt::Display for TransitionDenied<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from.is_terminal() {
            write!(f, "{} is terminal, cannot move to {}", self.from, self.to)
        } else {
            write!(f, "cannot move from {} to {}", self.from, self.to)
        }
    }
}

impl<L: Lifecycle> std::error::Error for TransitionDenied<L> {}

/// The one place a status is allowed to change.
pub fn attempt_transition<L: Lifecycle>(
    current: L,
    requested: L,
) -> Result<Transition<L>, TransitionDenied<L>> {
    if current == requested {
        Ok(Transition::Unchanged(current))
    } else if current.can_transition_to(requested) {
        Ok(Transition::Moved {
            from: current,
            to: requested,
        })
    } else {
        Err(TransitionDenied {
            from: current,
            to: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Red,
        Green,
        Amber,
        Broken,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Lifecycle for Light {
        const INITIAL: Self = Light::Red;
        const TRANSITIONS: &'static [(Self, Self)] = &[
            (Light::Red, Light::Green),
            (Light::Green, Light::Amber),
            (Light::Amber, Light::Red),
            (Light::Red, Light::Broken),
            (Light::Green, Light::Broken),
            (Light::Amber, Light::Broken),
        ];
    }

    #[test]
    fn edge_in_table_moves() {
        assert_eq!(
            attempt_transition(Light::Red, Light::Green),
            Ok(Transition::Moved {
                from: Light::Red,
                to: Light::Green
            })
        );
    }

    #[test]
    fn reflexive_request_is_unchanged() {
        let t = attempt_transition(Light::Amber, Light::Amber).unwrap();
        assert_eq!(t, Transition::Unchanged(Light::Amber));
        assert!(!t.is_move());
        assert_eq!(t.target(), Light::Amber);
    }

    #[test]
    fn terminal_state_only_accepts_itself() {
        assert!(Light::Broken.is_terminal());
        assert!(attempt_transition(Light::Broken, Light::Broken).is_ok());
        let denied = attempt_transition(Light::Broken, Light::Red).unwrap_err();
        assert!(denied.to_string().contains("terminal"));
    }

    #[test]
    fn skipping_is_denied() {
        let denied = attempt_transition(Light::Red, Light::Amber).unwrap_err();
        assert_eq!(denied.from, Light::Red);
        assert_eq!(denied.to, Light::Amber);
    }

    #[test]
    fn successors_follow_the_table() {
        assert_eq!(Light::Red.successors(), vec![Light::Green, Light::Broken]);
        assert!(Light::Broken.successors().is_empty());
        assert_eq!(Light::INITIAL, Light::Red);
    }
}
