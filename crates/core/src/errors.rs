use thiserror::Error;

use crate::domain::intent::IntentStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid intent transition from {from:?}")]
    InvalidIntentTransition { from: IntentStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
