//! Explicit results for best-effort side effects
//!
//! Audit writes and notifications never fail the moderation call that
//! triggers them. Instead of swallowing their errors, each one yields a
//! [`SideEffect`] that the caller logs and returns next to the resource.

use serde::Serialize;

use crate::models::AuditLogEntry;

/// Outcome of one best-effort side effect
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SideEffect<T> {
    Applied(T),
    /// Deliberately not attempted
    Skipped(String),
    Failed(String),
}

impl<T> SideEffect<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, SideEffect::Applied(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SideEffect<U> {
        match self {
            SideEffect::Applied(value) => SideEffect::Applied(f(value)),
            SideEffect::Skipped(reason) => SideEffect::Skipped(reason),
            SideEffect::Failed(message) => SideEffect::Failed(message),
        }
    }

    /// Log anything other than `Applied` under the given label
    pub fn log_unapplied(&self, label: &str, entity: &str, id: i64) {
        match self {
            SideEffect::Applied(_) => {}
            SideEffect::Skipped(reason) => {
                tracing::debug!("{} skipped for {} {}: {}", label, entity, id, reason)
            }
            SideEffect::Failed(message) => {
                tracing::warn!("{} failed for {} {}: {}", label, entity, id, message)
            }
        }
    }
}

impl<T> From<anyhow::Result<T>> for SideEffect<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => SideEffect::Applied(value),
            Err(e) => SideEffect::Failed(format!("{:#}", e)),
        }
    }
}

/// A completed moderation action together with its side effects
#[derive(Debug, Clone, Serialize)]
pub struct Moderated<T> {
    pub resource: T,
    pub audit: SideEffect<AuditLogEntry>,
    pub notification: SideEffect<()>,
}

impl<T> Moderated<T> {
    /// Nothing changed, so nothing is recorded or sent
    pub fn unchanged(resource: T, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            resource,
            audit: SideEffect::Skipped(reason.clone()),
            notification: SideEffect::Skipped(reason),
        }
    }

    pub fn is_fully_applied(&self) -> bool {
        self.audit.is_applied() && self.notification.is_applied()
    }
}
