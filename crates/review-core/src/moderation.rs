//! Moderation transitions
//!
//! All nine `from × to` combinations are spelled out in [`transition`].
//! A review never goes back to `Pending` once it has been created.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::review::ReviewStatus;

/// An admin decision on a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(&self) -> ReviewStatus {
        match self {
            Decision::Approve => ReviewStatus::Approved,
            Decision::Reject => ReviewStatus::Rejected,
        }
    }
}

/// Outcome of asking for a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status changes to the target
    Apply(ReviewStatus),
    /// Already in the target status; succeed without writing
    NoOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot move a review from {from} back to {to}")]
pub struct TransitionError {
    pub from: ReviewStatus,
    pub to: ReviewStatus,
}

/// Decide whether `from -> to` is allowed.
///
/// | from \ to | pending   | approved | rejected |
/// |-----------|-----------|----------|----------|
/// | pending   | no-op     | apply    | apply    |
/// | approved  | forbidden | no-op    | apply    |
/// | rejected  | forbidden | apply    | no-op    |
pub fn transition(from: ReviewStatus, to: ReviewStatus) -> Result<Transition, TransitionError> {
    use ReviewStatus::*;

    match (from, to) {
        (Pending, Pending) | (Approved, Approved) | (Rejected, Rejected) => Ok(Transition::NoOp),
        (Pending, Approved) | (Pending, Rejected) => Ok(Transition::Apply(to)),
        (Approved, Rejected) | (Rejected, Approved) => Ok(Transition::Apply(to)),
        (Approved, Pending) | (Rejected, Pending) => Err(TransitionError { from, to }),
    }
}

/// Apply an admin decision to a review currently in `current`
pub fn decide(current: ReviewStatus, decision: Decision) -> Result<Transition, TransitionError> {
    transition(current, decision.target())
}
