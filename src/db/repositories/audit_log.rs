//! Audit log repository
//!
//! Append-only: the trait exposes no update or delete.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

use super::row::RowExt;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{AuditLogEntry, EntityType, ListParams, NewAuditLogEntry};

const AUDIT_COLUMNS: &str = "id, admin_id, admin_email, action_type, entity_type, entity_id, \
     entity_name, description, ip_address, created_at";

/// Filter for audit log listings
#[derive(Debug, Clone, Copy)]
pub enum AuditFilter {
    All,
    Admin(i64),
    Entity(EntityType, i64),
}

impl AuditFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            AuditFilter::All => "",
            AuditFilter::Admin(_) => "WHERE admin_id = ?",
            AuditFilter::Entity(..) => "WHERE entity_type = ? AND entity_id = ?",
        }
    }
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Persist an entry stamped with the current time
    async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry>;

    /// Newest first, with the total number of matching rows
    async fn list(
        &self,
        filter: AuditFilter,
        params: &ListParams,
    ) -> Result<(Vec<AuditLogEntry>, i64)>;
}

/// SQLx-based audit log repository
pub struct SqlxAuditLogRepository {
    pool: DynDatabasePool,
}

impl SqlxAuditLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuditLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuditLogRepository for SqlxAuditLogRepository {
    async fn append(&self, entry: &NewAuditLogEntry) -> Result<AuditLogEntry> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => append_sqlite(pool, entry).await,
            Backend::Mysql(pool) => append_mysql(pool, entry).await,
        }
    }

    async fn list(
        &self,
        filter: AuditFilter,
        params: &ListParams,
    ) -> Result<(Vec<AuditLogEntry>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_sqlite(pool, filter, params).await,
            Backend::Mysql(pool) => list_mysql(pool, filter, params).await,
        }
    }
}

fn row_to_entry(row: &impl RowExt) -> Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: row.int("id")?,
        admin_id: row.int("admin_id")?,
        admin_email: row.text("admin_email")?,
        action_type: row.parsed("action_type")?,
        entity_type: row.parsed("entity_type")?,
        entity_id: row.int("entity_id")?,
        entity_name: row.opt_text("entity_name")?,
        description: row.text("description")?,
        ip_address: row.text("ip_address")?,
        created_at: row.timestamp("created_at")?,
    })
}

fn stamped(entry: &NewAuditLogEntry, id: i64, created_at: chrono::DateTime<Utc>) -> AuditLogEntry {
    AuditLogEntry {
        id,
        admin_id: entry.admin_id,
        admin_email: entry.admin_email.clone(),
        action_type: entry.action_type,
        entity_type: entry.entity_type,
        entity_id: entry.entity_id,
        entity_name: entry.entity_name.clone(),
        description: entry.description.clone(),
        ip_address: entry.ip_address.clone(),
        created_at,
    }
}

const INSERT_SQL: &str = "INSERT INTO audit_logs \
     (admin_id, admin_email, action_type, entity_type, entity_id, entity_name, description, ip_address, created_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn append_sqlite(pool: &SqlitePool, entry: &NewAuditLogEntry) -> Result<AuditLogEntry> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.admin_id)
        .bind(&entry.admin_email)
        .bind(entry.action_type.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.entity_name)
        .bind(&entry.description)
        .bind(&entry.ip_address)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to append audit log entry")?;
    Ok(stamped(entry, result.last_insert_rowid(), now))
}

async fn list_sqlite(
    pool: &SqlitePool,
    filter: AuditFilter,
    params: &ListParams,
) -> Result<(Vec<AuditLogEntry>, i64)> {
    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", filter.where_clause());
    let list_sql = format!(
        "SELECT {} FROM audit_logs {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        AUDIT_COLUMNS,
        filter.where_clause()
    );

    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut list = sqlx::query(&list_sql);
    match filter {
        AuditFilter::All => {}
        AuditFilter::Admin(admin_id) => {
            count = count.bind(admin_id);
            list = list.bind(admin_id);
        }
        AuditFilter::Entity(entity_type, entity_id) => {
            count = count.bind(entity_type.as_str()).bind(entity_id);
            list = list.bind(entity_type.as_str()).bind(entity_id);
        }
    }

    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count audit log entries")?;
    let rows = list
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list audit log entries")?;
    let items = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn append_mysql(pool: &MySqlPool, entry: &NewAuditLogEntry) -> Result<AuditLogEntry> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.admin_id)
        .bind(&entry.admin_email)
        .bind(entry.action_type.as_str())
        .bind(entry.entity_type.as_str())
        .bind(entry.entity_id)
        .bind(&entry.entity_name)
        .bind(&entry.description)
        .bind(&entry.ip_address)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to append audit log entry")?;
    Ok(stamped(entry, result.last_insert_id() as i64, now))
}

async fn list_mysql(
    pool: &MySqlPool,
    filter: AuditFilter,
    params: &ListParams,
) -> Result<(Vec<AuditLogEntry>, i64)> {
    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", filter.where_clause());
    let list_sql = format!(
        "SELECT {} FROM audit_logs {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        AUDIT_COLUMNS,
        filter.where_clause()
    );

    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut list = sqlx::query(&list_sql);
    match filter {
        AuditFilter::All => {}
        AuditFilter::Admin(admin_id) => {
            count = count.bind(admin_id);
            list = list.bind(admin_id);
        }
        AuditFilter::Entity(entity_type, entity_id) => {
            count = count.bind(entity_type.as_str()).bind(entity_id);
            list = list.bind(entity_type.as_str()).bind(entity_id);
        }
    }

    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count audit log entries")?;
    let rows = list
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list audit log entries")?;
    let items = rows.iter().map(row_to_entry).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup;
    use crate::models::{ActionType, AdminContext};

    fn entry(admin_id: i64, action: ActionType, entity: EntityType, id: i64) -> NewAuditLogEntry {
        let admin = AdminContext::new(admin_id, format!("admin{}@example.com", admin_id), "127.0.0.1");
        NewAuditLogEntry::new(&admin, action, entity, id, Some(format!("#{}", id)), "test")
    }

    #[tokio::test]
    async fn test_append_returns_persisted_entry() {
        let repo = SqlxAuditLogRepository::new(setup().await);
        let saved = repo
            .append(&entry(1, ActionType::Hide, EntityType::Job, 10))
            .await
            .unwrap();
        assert!(saved.id > 0);
        assert_eq!(saved.entity_name.as_deref(), Some("#10"));

        let (items, total) = repo.list(AuditFilter::All, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, saved.id);
        assert_eq!(items[0].action_type, ActionType::Hide);
        assert_eq!(items[0].ip_address, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_filtered() {
        let repo = SqlxAuditLogRepository::new(setup().await);
        repo.append(&entry(1, ActionType::Approve, EntityType::Job, 5)).await.unwrap();
        repo.append(&entry(2, ActionType::Hide, EntityType::Job, 5)).await.unwrap();
        repo.append(&entry(1, ActionType::Delete, EntityType::Article, 5)).await.unwrap();
        repo.append(&entry(1, ActionType::Unhide, EntityType::Job, 5)).await.unwrap();

        let (by_job, total) = repo
            .list(AuditFilter::Entity(EntityType::Job, 5), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        let actions: Vec<_> = by_job.iter().map(|e| e.action_type).collect();
        assert_eq!(
            actions,
            vec![ActionType::Unhide, ActionType::Hide, ActionType::Approve]
        );
        assert!(by_job.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let (by_admin, total) = repo
            .list(AuditFilter::Admin(1), &ListParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(by_admin.len(), 2);
        assert!(by_admin.iter().all(|e| e.admin_id == 1));

        let (page_two, _) = repo
            .list(AuditFilter::Admin(1), &ListParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].action_type, ActionType::Approve);
    }
}
