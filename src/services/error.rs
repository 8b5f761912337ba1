//! Error taxonomy shared by the moderation, cascade and subscription services

/// Error types for moderation operations
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Unknown resource id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid input, such as a blank reason
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resource is not in a state that allows the action
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller may not perform the action
    #[error("Forbidden: {0}")]
    Authorization(String),

    /// Storage or collaborator failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ModerationError {
    pub fn not_found(entity: impl std::fmt::Display, id: i64) -> Self {
        Self::NotFound(format!("{} {} not found", entity, id))
    }
}

pub type ModerationResult<T> = Result<T, ModerationError>;
