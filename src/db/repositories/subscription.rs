//! Subscription repository
//!
//! Storage enforces "one APPROVED subscription per user" and "one PENDING
//! request per (user, package)" with unique indexes; the approval path
//! additionally serialises on the user's rows inside one transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

use super::row::{placeholders, RowExt};
use crate::db::{is_unique_violation, Backend, DynDatabasePool};
use crate::models::{ListParams, Package, Subscription, SubscriptionStatus};

const SUBSCRIPTION_SELECT: &str = "SELECT s.id, s.user_id, s.package_id, p.name AS package_name, \
     s.status, s.start_date, s.end_date, s.created_at, s.updated_at \
     FROM subscriptions s JOIN packages p ON p.id = s.package_id";

/// Result of inserting a PENDING request
#[derive(Debug)]
pub enum PendingInsert {
    Created(Subscription),
    /// A PENDING request for the same user and package already exists
    Duplicate,
}

/// Result of removing a package
#[derive(Debug, PartialEq, Eq)]
pub enum PackageRemoval {
    Removed,
    NotFound,
    /// Subscriptions still reference the package
    InUse(i64),
}

/// Result of an exclusive approval
#[derive(Debug)]
pub enum ApproveOutcome {
    /// The subscription is APPROVED; `superseded` lists the ids that were
    /// APPROVED before and are now CANCELLED.
    Approved {
        subscription: Subscription,
        superseded: Vec<i64>,
    },
    NotFound,
    NotPending(SubscriptionStatus),
    /// A concurrent approval for the same user won the race
    Contended,
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create_package(&self, name: &str, duration_days: i64) -> Result<Package>;

    async fn get_package(&self, id: i64) -> Result<Option<Package>>;

    /// Every package, oldest first
    async fn list_packages(&self) -> Result<Vec<Package>>;

    /// Returns `None` when the package does not exist
    async fn update_package(
        &self,
        id: i64,
        name: &str,
        duration_days: i64,
    ) -> Result<Option<Package>>;

    /// Delete a package no subscription refers to
    async fn delete_package(&self, id: i64) -> Result<PackageRemoval>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>>;

    async fn create_pending(
        &self,
        user_id: i64,
        package_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<PendingInsert>;

    /// Cancel the user's APPROVED subscriptions and approve `id`, atomically.
    async fn approve_exclusive(
        &self,
        id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ApproveOutcome>;

    /// Compare-and-set the status. `end_date`, when given, replaces the stored one.
    /// Returns `false` when the row is missing or its status is not in `from`.
    async fn transition(
        &self,
        id: i64,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Newest first; `None` lists every status
    async fn list(
        &self,
        status: Option<SubscriptionStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Subscription>, i64)>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Subscription>>;

    /// The APPROVED subscription of `user_id` that has not ended at `now`
    async fn find_current(&self, user_id: i64, now: DateTime<Utc>)
        -> Result<Option<Subscription>>;
}

/// SQLx-based subscription repository
pub struct SqlxSubscriptionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn create_package(&self, name: &str, duration_days: i64) -> Result<Package> {
        let sql = "INSERT INTO packages (name, duration_days) VALUES (?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(name)
                .bind(duration_days)
                .execute(pool)
                .await
                .context("Failed to create package")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(name)
                .bind(duration_days)
                .execute(pool)
                .await
                .context("Failed to create package")?
                .last_insert_id() as i64,
        };
        Ok(Package {
            id,
            name: name.to_string(),
            duration_days,
        })
    }

    async fn get_package(&self, id: i64) -> Result<Option<Package>> {
        let sql = "SELECT id, name, duration_days FROM packages WHERE id = ?";
        let package = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get package")?
                .as_ref()
                .map(row_to_package)
                .transpose()?,
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get package")?
                .as_ref()
                .map(row_to_package)
                .transpose()?,
        };
        Ok(package)
    }

    async fn list_packages(&self) -> Result<Vec<Package>> {
        let sql = "SELECT id, name, duration_days FROM packages ORDER BY id";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list packages")?
                .iter()
                .map(row_to_package)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to list packages")?
                .iter()
                .map(row_to_package)
                .collect(),
        }
    }

    async fn update_package(
        &self,
        id: i64,
        name: &str,
        duration_days: i64,
    ) -> Result<Option<Package>> {
        let sql = "UPDATE packages SET name = ?, duration_days = ? WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(name)
                .bind(duration_days)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update package")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(name)
                .bind(duration_days)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update package")?
                .rows_affected(),
        };
        // MySQL reports 0 affected rows when nothing changed, so re-read
        if affected == 0 {
            return self.get_package(id).await;
        }
        Ok(Some(Package {
            id,
            name: name.to_string(),
            duration_days,
        }))
    }

    async fn delete_package(&self, id: i64) -> Result<PackageRemoval> {
        let count_sql = "SELECT COUNT(*) FROM subscriptions WHERE package_id = ?";
        let delete_sql = "DELETE FROM packages WHERE id = ?";
        let (in_use, deleted) = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let in_use: i64 = sqlx::query_scalar(count_sql)
                    .bind(id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count package subscriptions")?;
                if in_use > 0 {
                    (in_use, 0)
                } else {
                    let deleted = sqlx::query(delete_sql)
                        .bind(id)
                        .execute(pool)
                        .await
                        .context("Failed to delete package")?
                        .rows_affected();
                    (0, deleted)
                }
            }
            Backend::Mysql(pool) => {
                let in_use: i64 = sqlx::query_scalar(count_sql)
                    .bind(id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count package subscriptions")?;
                if in_use > 0 {
                    (in_use, 0)
                } else {
                    let deleted = sqlx::query(delete_sql)
                        .bind(id)
                        .execute(pool)
                        .await
                        .context("Failed to delete package")?
                        .rows_affected();
                    (0, deleted)
                }
            }
        };
        Ok(match (in_use, deleted) {
            (n, _) if n > 0 => PackageRemoval::InUse(n),
            (_, 0) => PackageRemoval::NotFound,
            _ => PackageRemoval::Removed,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_subscription_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_subscription_mysql(pool, id).await,
        }
    }

    async fn create_pending(
        &self,
        user_id: i64,
        package_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<PendingInsert> {
        let sql = "INSERT INTO subscriptions \
             (user_id, package_id, status, start_date, end_date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)";
        let now = Utc::now();
        let status = SubscriptionStatus::Pending.as_str();

        let inserted = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(package_id)
                .bind(status)
                .bind(start_date)
                .bind(end_date)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(package_id)
                .bind(status)
                .bind(start_date)
                .bind(end_date)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.last_insert_id() as i64),
        };

        let id = match inserted {
            Ok(id) => id,
            Err(e) if is_unique_violation(&e) => return Ok(PendingInsert::Duplicate),
            Err(e) => return Err(e).context("Failed to create subscription"),
        };

        let subscription = self
            .get_by_id(id)
            .await?
            .context("Subscription missing after insert")?;
        Ok(PendingInsert::Created(subscription))
    }

    async fn approve_exclusive(
        &self,
        id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ApproveOutcome> {
        let outcome = match self.pool.backend() {
            Backend::Sqlite(pool) => approve_sqlite(pool, id, start_date, end_date, now).await?,
            Backend::Mysql(pool) => approve_mysql(pool, id, start_date, end_date, now).await?,
        };

        // The transaction is committed; reload through the pool.
        match outcome {
            Committed::Approved(superseded) => {
                let subscription = self
                    .get_by_id(id)
                    .await?
                    .context("Subscription missing after approval")?;
                Ok(ApproveOutcome::Approved {
                    subscription,
                    superseded,
                })
            }
            Committed::Aborted(outcome) => Ok(outcome),
        }
    }

    async fn transition(
        &self,
        id: i64,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if from.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "UPDATE subscriptions SET status = ?, end_date = COALESCE(?, end_date), updated_at = ? \
             WHERE id = ? AND status IN ({})",
            placeholders(from.len())
        );

        let rows = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql)
                    .bind(to.as_str())
                    .bind(end_date)
                    .bind(now)
                    .bind(id);
                for status in from {
                    query = query.bind(status.as_str());
                }
                query.execute(pool).await
            }
            .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql)
                    .bind(to.as_str())
                    .bind(end_date)
                    .bind(now)
                    .bind(id);
                for status in from {
                    query = query.bind(status.as_str());
                }
                query.execute(pool).await
            }
            .map(|r| r.rows_affected()),
        }
        .context("Failed to update subscription status")?;

        Ok(rows == 1)
    }

    async fn list(
        &self,
        status: Option<SubscriptionStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Subscription>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_subscriptions_sqlite(pool, status, params).await,
            Backend::Mysql(pool) => list_subscriptions_mysql(pool, status, params).await,
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let sql = format!(
            "{} WHERE s.user_id = ? ORDER BY s.created_at DESC, s.id DESC",
            SUBSCRIPTION_SELECT
        );
        let items = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list user subscriptions")?
                .iter()
                .map(row_to_subscription)
                .collect::<Result<Vec<_>>>()?,
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list user subscriptions")?
                .iter()
                .map(row_to_subscription)
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(items)
    }

    async fn find_current(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let sql = format!(
            "{} WHERE s.user_id = ? AND s.status = ? AND s.end_date > ? \
             ORDER BY s.end_date DESC LIMIT 1",
            SUBSCRIPTION_SELECT
        );
        let approved = SubscriptionStatus::Approved.as_str();
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(user_id)
                .bind(approved)
                .bind(now)
                .fetch_optional(pool)
                .await
                .context("Failed to get current subscription")?
                .as_ref()
                .map(row_to_subscription)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(user_id)
                .bind(approved)
                .bind(now)
                .fetch_optional(pool)
                .await
                .context("Failed to get current subscription")?
                .as_ref()
                .map(row_to_subscription)
                .transpose(),
        }
    }
}

/// What the approval transaction did before it ended
enum Committed {
    Approved(Vec<i64>),
    /// Rolled back; nothing changed
    Aborted(ApproveOutcome),
}

fn row_to_subscription(row: &impl RowExt) -> Result<Subscription> {
    Ok(Subscription {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        package_id: row.int("package_id")?,
        package_name: row.text("package_name")?,
        status: row.parsed("status")?,
        start_date: row.timestamp("start_date")?,
        end_date: row.timestamp("end_date")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

fn row_to_package(row: &impl RowExt) -> Result<Package> {
    Ok(Package {
        id: row.int("id")?,
        name: row.text("name")?,
        duration_days: row.int("duration_days")?,
    })
}

const APPROVE_TARGET_SQL: &str = "UPDATE subscriptions SET status = 'approved', start_date = ?, \
     end_date = ?, updated_at = ? WHERE id = ? AND status = 'pending'";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_subscription_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Subscription>> {
    let sql = format!("{} WHERE s.id = ?", SUBSCRIPTION_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get subscription")?;
    row.as_ref().map(row_to_subscription).transpose()
}

// The first statement writes, so the transaction takes SQLite's write lock
// up front instead of upgrading from a read lock later.
async fn approve_sqlite(
    pool: &SqlitePool,
    id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Committed> {
    let mut tx = pool.begin().await?;

    let superseded: Vec<i64> = sqlx::query_scalar(
        "UPDATE subscriptions SET status = 'cancelled', updated_at = ? \
         WHERE status = 'approved' AND id <> ? AND user_id = \
             (SELECT user_id FROM subscriptions WHERE id = ? AND status = 'pending') \
         RETURNING id",
    )
    .bind(now)
    .bind(id)
    .bind(id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to cancel approved subscriptions")?;

    let approved = sqlx::query(APPROVE_TARGET_SQL)
        .bind(start_date)
        .bind(end_date)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await;

    match approved {
        Ok(result) if result.rows_affected() == 1 => {
            tx.commit().await?;
            Ok(Committed::Approved(superseded))
        }
        Ok(_) => {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM subscriptions WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            aborted(status)
        }
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await?;
            Ok(Committed::Aborted(ApproveOutcome::Contended))
        }
        Err(e) => Err(e).context("Failed to approve subscription"),
    }
}

async fn list_subscriptions_sqlite(
    pool: &SqlitePool,
    status: Option<SubscriptionStatus>,
    params: &ListParams,
) -> Result<(Vec<Subscription>, i64)> {
    let filter = if status.is_some() { "WHERE s.status = ?" } else { "" };
    let count_sql = format!("SELECT COUNT(*) FROM subscriptions s {}", filter);
    let list_sql = format!(
        "{} {} ORDER BY s.created_at DESC, s.id DESC LIMIT ? OFFSET ?",
        SUBSCRIPTION_SELECT, filter
    );

    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut list = sqlx::query(&list_sql);
    if let Some(status) = status {
        count = count.bind(status.as_str());
        list = list.bind(status.as_str());
    }

    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count subscriptions")?;
    let rows = list
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list subscriptions")?;
    let items = rows
        .iter()
        .map(row_to_subscription)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_subscription_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Subscription>> {
    let sql = format!("{} WHERE s.id = ?", SUBSCRIPTION_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get subscription")?;
    row.as_ref().map(row_to_subscription).transpose()
}

async fn approve_mysql(
    pool: &MySqlPool,
    id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Committed> {
    let mut tx = pool.begin().await?;

    let target: Option<(i64, String)> =
        sqlx::query_as("SELECT user_id, status FROM subscriptions WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock subscription")?;
    let Some((user_id, status)) = target else {
        tx.rollback().await?;
        return Ok(Committed::Aborted(ApproveOutcome::NotFound));
    };
    if status != SubscriptionStatus::Pending.as_str() {
        tx.rollback().await?;
        return aborted(Some(status));
    }

    // Lock every approved row of this user so concurrent approvals queue here.
    let superseded: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM subscriptions WHERE user_id = ? AND status = 'approved' FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to lock approved subscriptions")?;

    if !superseded.is_empty() {
        let sql = format!(
            "UPDATE subscriptions SET status = 'cancelled', updated_at = ? WHERE id IN ({})",
            placeholders(superseded.len())
        );
        let mut query = sqlx::query(&sql).bind(now);
        for sid in &superseded {
            query = query.bind(*sid);
        }
        query
            .execute(&mut *tx)
            .await
            .context("Failed to cancel approved subscriptions")?;
    }

    let approved = sqlx::query(APPROVE_TARGET_SQL)
        .bind(start_date)
        .bind(end_date)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await;

    match approved {
        Ok(_) => {
            tx.commit().await?;
            Ok(Committed::Approved(superseded))
        }
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await?;
            Ok(Committed::Aborted(ApproveOutcome::Contended))
        }
        Err(e) => Err(e).context("Failed to approve subscription"),
    }
}

async fn list_subscriptions_mysql(
    pool: &MySqlPool,
    status: Option<SubscriptionStatus>,
    params: &ListParams,
) -> Result<(Vec<Subscription>, i64)> {
    let filter = if status.is_some() { "WHERE s.status = ?" } else { "" };
    let count_sql = format!("SELECT COUNT(*) FROM subscriptions s {}", filter);
    let list_sql = format!(
        "{} {} ORDER BY s.created_at DESC, s.id DESC LIMIT ? OFFSET ?",
        SUBSCRIPTION_SELECT, filter
    );

    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut list = sqlx::query(&list_sql);
    if let Some(status) = status {
        count = count.bind(status.as_str());
        list = list.bind(status.as_str());
    }

    let total = count
        .fetch_one(pool)
        .await
        .context("Failed to count subscriptions")?;
    let rows = list
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list subscriptions")?;
    let items = rows
        .iter()
        .map(row_to_subscription)
        .collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

fn aborted(status: Option<String>) -> Result<Committed> {
    let outcome = match status {
        None => ApproveOutcome::NotFound,
        Some(status) => ApproveOutcome::NotPending(status.parse()?),
    };
    Ok(Committed::Aborted(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup;
    use chrono::Duration;

    async fn repo_with_packages() -> (SqlxSubscriptionRepository, Package, Package) {
        let repo = SqlxSubscriptionRepository::new(setup().await);
        let pro = repo.create_package("Pro", 30).await.unwrap();
        let max = repo.create_package("Max", 90).await.unwrap();
        (repo, pro, max)
    }

    async fn pending(repo: &SqlxSubscriptionRepository, user_id: i64, package_id: i64) -> Subscription {
        let now = Utc::now();
        match repo
            .create_pending(user_id, package_id, now, now + Duration::days(30))
            .await
            .unwrap()
        {
            PendingInsert::Created(sub) => sub,
            PendingInsert::Duplicate => panic!("unexpected duplicate"),
        }
    }

    async fn approve(repo: &SqlxSubscriptionRepository, id: i64) -> ApproveOutcome {
        let now = Utc::now();
        repo.approve_exclusive(id, now, now + Duration::days(30), now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_package_management() {
        let (repo, pro, max) = repo_with_packages().await;
        assert_eq!(repo.list_packages().await.unwrap(), vec![pro.clone(), max.clone()]);

        let renamed = repo.update_package(pro.id, "Pro+", 45).await.unwrap().unwrap();
        assert_eq!(renamed.duration_days, 45);
        assert_eq!(repo.get_package(pro.id).await.unwrap().unwrap().name, "Pro+");
        // Same values again still finds the row
        assert!(repo.update_package(pro.id, "Pro+", 45).await.unwrap().is_some());
        assert!(repo.update_package(999, "Ghost", 1).await.unwrap().is_none());

        pending(&repo, 1, pro.id).await;
        assert_eq!(repo.delete_package(pro.id).await.unwrap(), PackageRemoval::InUse(1));
        assert_eq!(repo.delete_package(max.id).await.unwrap(), PackageRemoval::Removed);
        assert_eq!(repo.delete_package(max.id).await.unwrap(), PackageRemoval::NotFound);
        assert_eq!(repo.list_packages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_pending_detects_duplicate() {
        let (repo, pro, max) = repo_with_packages().await;
        let first = pending(&repo, 1, pro.id).await;
        assert_eq!(first.status, SubscriptionStatus::Pending);
        assert_eq!(first.package_name, "Pro");

        let now = Utc::now();
        let again = repo.create_pending(1, pro.id, now, now).await.unwrap();
        assert!(matches!(again, PendingInsert::Duplicate));

        // Another package, or another user, is fine
        pending(&repo, 1, max.id).await;
        pending(&repo, 2, pro.id).await;
    }

    #[tokio::test]
    async fn test_approve_supersedes_previous_approval() {
        let (repo, pro, max) = repo_with_packages().await;
        let first = pending(&repo, 1, pro.id).await;
        let second = pending(&repo, 1, max.id).await;
        let other_user = pending(&repo, 2, pro.id).await;

        assert!(matches!(
            approve(&repo, first.id).await,
            ApproveOutcome::Approved { ref superseded, .. } if superseded.is_empty()
        ));
        assert!(matches!(approve(&repo, other_user.id).await, ApproveOutcome::Approved { .. }));

        match approve(&repo, second.id).await {
            ApproveOutcome::Approved {
                subscription,
                superseded,
            } => {
                assert_eq!(subscription.status, SubscriptionStatus::Approved);
                assert_eq!(superseded, vec![first.id]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let first = repo.get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(first.status, SubscriptionStatus::Cancelled);
        let other_user = repo.get_by_id(other_user.id).await.unwrap().unwrap();
        assert_eq!(other_user.status, SubscriptionStatus::Approved);

        let (approved, total) = repo
            .list(Some(SubscriptionStatus::Approved), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(approved.iter().filter(|s| s.user_id == 1).count(), 1);
    }

    #[tokio::test]
    async fn test_approve_requires_pending() {
        let (repo, pro, _) = repo_with_packages().await;
        let sub = pending(&repo, 1, pro.id).await;
        assert!(matches!(approve(&repo, sub.id).await, ApproveOutcome::Approved { .. }));

        assert!(matches!(
            approve(&repo, sub.id).await,
            ApproveOutcome::NotPending(SubscriptionStatus::Approved)
        ));
        assert!(matches!(approve(&repo, 999).await, ApproveOutcome::NotFound));

        // A failed approval must not cancel the user's current subscription
        let current = repo.find_current(1, Utc::now()).await.unwrap().unwrap();
        assert_eq!(current.id, sub.id);
    }

    #[tokio::test]
    async fn test_transition_compare_and_set() {
        let (repo, pro, _) = repo_with_packages().await;
        let sub = pending(&repo, 1, pro.id).await;
        let now = Utc::now();

        assert!(repo
            .transition(
                sub.id,
                &[SubscriptionStatus::Pending],
                SubscriptionStatus::Rejected,
                None,
                now
            )
            .await
            .unwrap());
        assert!(!repo
            .transition(
                sub.id,
                &[SubscriptionStatus::Pending, SubscriptionStatus::Approved],
                SubscriptionStatus::Cancelled,
                Some(now),
                now
            )
            .await
            .unwrap());

        let loaded = repo.get_by_id(sub.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SubscriptionStatus::Rejected);
        assert_eq!(loaded.end_date, sub.end_date);
    }

    #[tokio::test]
    async fn test_history_and_user_listing() {
        let (repo, pro, max) = repo_with_packages().await;
        let a = pending(&repo, 1, pro.id).await;
        let b = pending(&repo, 1, max.id).await;
        pending(&repo, 2, pro.id).await;

        let mine = repo.list_by_user(1).await.unwrap();
        let ids: Vec<_> = mine.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let (all, total) = repo.list(None, &ListParams::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 2);
        assert!(repo.find_current(1, Utc::now()).await.unwrap().is_none());
    }
}
