//! Storage interface shared by moderated resource types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::ModeratedResource;

/// Persistence for one moderated resource type.
///
/// Status and visibility changes are single-statement updates, so each one
/// commits atomically on its own.
#[async_trait]
pub trait ModerationStore<R: ModeratedResource>: Send + Sync {
    /// Create a resource in its initial status.
    ///
    /// Jobs and articles are authored by their owners outside this service,
    /// so nothing in the moderation flow calls this. It exists for seeding
    /// data and test fixtures.
    async fn create(&self, input: &R::Input) -> Result<R>;

    async fn get_by_id(&self, id: i64) -> Result<Option<R>>;

    /// Compare-and-set the status and stamp the approving admin.
    ///
    /// Returns `false` when the row is gone or no longer holds `from`.
    async fn update_status(
        &self,
        id: i64,
        from: R::Status,
        to: R::Status,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Hide with `Some(reason)`, or clear the hidden fields with `None`.
    ///
    /// Returns `false` when the row does not exist.
    async fn set_hidden(&self, id: i64, reason: Option<&str>, at: DateTime<Utc>) -> Result<bool>;
}
