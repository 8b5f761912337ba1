//! Cascade deletion coordinator
//!
//! Maps an entity type to the transactional tree delete that removes it and
//! everything referencing it.

use std::sync::Arc;

use super::error::{ModerationError, ModerationResult};
use crate::db::repositories::{CascadeReport, CascadeRepository};
use crate::models::EntityType;

pub struct CascadeCoordinator {
    repo: Arc<dyn CascadeRepository>,
}

impl CascadeCoordinator {
    pub fn new(repo: Arc<dyn CascadeRepository>) -> Self {
        Self { repo }
    }

    /// Hard-delete `entity_id` and its dependents in one transaction.
    ///
    /// Subscriptions are never hard-deleted; they end as CANCELLED or
    /// REJECTED instead.
    pub async fn delete(&self, entity: EntityType, entity_id: i64) -> ModerationResult<CascadeReport> {
        let report = match entity {
            EntityType::Job => self.repo.delete_job_tree(entity_id).await?,
            EntityType::Article => self.repo.delete_article_tree(entity_id).await?,
            EntityType::User => self.repo.delete_user_tree(entity_id).await?,
            EntityType::Subscription => {
                return Err(ModerationError::Validation(
                    "Subscriptions cannot be deleted; reject or cancel them instead".to_string(),
                ))
            }
        };

        let report = report.ok_or_else(|| ModerationError::not_found(entity, entity_id))?;
        tracing::debug!("Cascade delete of {} {}: {:?}", entity, entity_id, report);
        Ok(report)
    }
}
