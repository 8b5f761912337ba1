//! Status transition rules for moderated resources
//!
//! Approve moves a resource to its live status, reject to REJECTED.
//! REJECTED is terminal: approving a rejected resource is a conflict, while
//! repeating an action that already holds is a no-op.

use super::error::{ModerationError, ModerationResult};
use crate::models::ModeratedStatus;

/// What a status change should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// Write `to` if the row still holds `from`
    Apply { from: S, to: S },
    /// The resource already holds the target status
    Unchanged,
}

pub fn approve<S: ModeratedStatus>(current: S) -> ModerationResult<Transition<S>> {
    if current == S::LIVE {
        return Ok(Transition::Unchanged);
    }
    if current == S::REJECTED {
        return Err(ModerationError::Conflict(format!(
            "Cannot approve a resource in terminal status {}",
            current
        )));
    }
    Ok(Transition::Apply {
        from: current,
        to: S::LIVE,
    })
}

pub fn reject<S: ModeratedStatus>(current: S) -> ModerationResult<Transition<S>> {
    if current == S::REJECTED {
        return Ok(Transition::Unchanged);
    }
    Ok(Transition::Apply {
        from: current,
        to: S::REJECTED,
    })
}

/// Trimmed reason, or a validation error when it is missing or blank
pub fn require_reason(reason: Option<&str>, action: &str) -> ModerationResult<String> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
        _ => Err(ModerationError::Validation(format!(
            "A reason is required to {}",
            action
        ))),
    }
}
