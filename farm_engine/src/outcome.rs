/// Farm engine — Transition outcomes
///
/// The reducer has a single failure mode: the input state comes back
/// unchanged. `Rejection` records why, for logs and tests; it is never
/// needed to interpret the resulting state.

use thiserror::Error;

/// Why a transition was turned into a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("unknown {kind} {id:?}")]
    NotFound { kind: &'static str, id: String },

    #[error("insufficient {resource}: need {needed}, have {available}")]
    Insufficient {
        resource: String,
        needed: i64,
        available: i64,
    },

    #[error("{0} limit reached")]
    CapReached(&'static str),

    #[error("wrong lifecycle phase: {0}")]
    WrongPhase(&'static str),

    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("nothing to do")]
    NothingToDo,

    #[error("unrecognized action {0:?}")]
    Unrecognized(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("arithmetic overflow")]
    Overflow,
}

impl Rejection {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Rejection::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn insufficient(resource: impl Into<String>, needed: i64, available: i64) -> Self {
        Rejection::Insufficient {
            resource: resource.into(),
            needed,
            available,
        }
    }
}

/// Result of one call to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionResult {
    pub action_type: String,
    pub applied: bool,
    pub rejection: Option<Rejection>,
}

impl TransitionResult {
    pub fn applied(action_type: &str) -> Self {
        Self {
            action_type: action_type.to_string(),
            applied: true,
            rejection: None,
        }
    }

    pub fn rejected(action_type: &str, rejection: Rejection) -> Self {
        Self {
            action_type: action_type.to_string(),
            applied: false,
            rejection: Some(rejection),
        }
    }
}
