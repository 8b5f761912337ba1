//! Audit log service
//!
//! Writes are best-effort: `record` reports failure as a [`SideEffect`]
//! instead of an error, so a failing audit store never undoes or fails the
//! moderation action it describes.

use std::sync::Arc;

use super::error::ModerationResult;
use super::outcome::SideEffect;
use crate::db::repositories::{AuditFilter, AuditLogRepository};
use crate::models::{AuditLogEntry, EntityType, ListParams, NewAuditLogEntry, PagedResult};

pub struct AuditLogService {
    repo: Arc<dyn AuditLogRepository>,
}

impl AuditLogService {
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self { repo }
    }

    /// Append an entry. Never fails the caller.
    pub async fn record(&self, entry: NewAuditLogEntry) -> SideEffect<AuditLogEntry> {
        self.repo.append(&entry).await.into()
    }

    pub async fn list(&self, params: &ListParams) -> ModerationResult<PagedResult<AuditLogEntry>> {
        self.page(AuditFilter::All, params).await
    }

    pub async fn list_by_admin(
        &self,
        admin_id: i64,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<AuditLogEntry>> {
        self.page(AuditFilter::Admin(admin_id), params).await
    }

    pub async fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<AuditLogEntry>> {
        self.page(AuditFilter::Entity(entity_type, entity_id), params)
            .await
    }

    async fn page(
        &self,
        filter: AuditFilter,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<AuditLogEntry>> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FailingAuditRepository;
    use super::*;
    use crate::db::repositories::test_support::setup;
    use crate::db::repositories::SqlxAuditLogRepository;
    use crate::models::{ActionType, AdminContext};

    fn entry(action: ActionType, job_id: i64) -> NewAuditLogEntry {
        let admin = AdminContext::new(1, "admin@example.com", "10.0.0.1");
        NewAuditLogEntry::new(&admin, action, EntityType::Job, job_id, None, "test")
    }

    #[tokio::test]
    async fn test_record_and_page() {
        let service = AuditLogService::new(SqlxAuditLogRepository::boxed(setup().await));
        assert!(service.record(entry(ActionType::Approve, 3)).await.is_applied());
        assert!(service.record(entry(ActionType::Hide, 3)).await.is_applied());
        assert!(service.record(entry(ActionType::Hide, 4)).await.is_applied());

        let page = service
            .list_by_entity(EntityType::Job, 3, &ListParams::new(1, 1))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].action_type, ActionType::Hide);
        assert!(page.has_next());

        assert_eq!(service.list(&ListParams::default()).await.unwrap().total, 3);
        assert_eq!(
            service.list_by_admin(2, &ListParams::default()).await.unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_record_failure_is_reported_not_raised() {
        let service = AuditLogService::new(Arc::new(FailingAuditRepository));
        match service.record(entry(ActionType::Delete, 1)).await {
            SideEffect::Failed(message) => assert!(message.contains("unavailable")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
