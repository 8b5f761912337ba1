//! Cascading hard deletes
//!
//! Each tree (a job, an article, an account) is removed in one transaction,
//! leaves first, so foreign keys hold after every statement and a failure
//! leaves nothing half-deleted. Storage-level `ON DELETE CASCADE` is not
//! relied upon.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use super::row::placeholders;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CommentLink, CommentTree, UserRole};

/// Maximum number of ids bound into one `IN (...)` list
const CHUNK: usize = 500;

/// Rows removed (or detached) by one cascade
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub applications: u64,
    pub saved_jobs: u64,
    pub job_skills: u64,
    pub jobs: u64,
    pub comments: u64,
    pub reactions: u64,
    pub articles: u64,
    pub cvs: u64,
    pub profiles: u64,
    pub tokens: u64,
    pub users: u64,
    /// Comments by a deleted account on other authors' articles; kept with
    /// their author cleared.
    pub detached_comments: u64,
}

impl CascadeReport {
    pub fn rows_deleted(&self) -> u64 {
        self.applications
            + self.saved_jobs
            + self.job_skills
            + self.jobs
            + self.comments
            + self.reactions
            + self.articles
            + self.cvs
            + self.profiles
            + self.tokens
            + self.users
    }
}

/// Transactional delete of a resource and everything that references it.
/// Each method returns `None`, with nothing changed, when the root row does
/// not exist.
#[async_trait]
pub trait CascadeRepository: Send + Sync {
    async fn delete_job_tree(&self, job_id: i64) -> Result<Option<CascadeReport>>;

    async fn delete_article_tree(&self, article_id: i64) -> Result<Option<CascadeReport>>;

    async fn delete_user_tree(&self, user_id: i64) -> Result<Option<CascadeReport>>;
}

pub struct SqlxCascadeRepository {
    pool: DynDatabasePool,
}

impl SqlxCascadeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CascadeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CascadeRepository for SqlxCascadeRepository {
    async fn delete_job_tree(&self, job_id: i64) -> Result<Option<CascadeReport>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlite::job_tree(pool, job_id).await,
            Backend::Mysql(pool) => mysql::job_tree(pool, job_id).await,
        }
    }

    async fn delete_article_tree(&self, article_id: i64) -> Result<Option<CascadeReport>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlite::article_tree(pool, article_id).await,
            Backend::Mysql(pool) => mysql::article_tree(pool, article_id).await,
        }
    }

    async fn delete_user_tree(&self, user_id: i64) -> Result<Option<CascadeReport>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlite::user_tree(pool, user_id).await,
            Backend::Mysql(pool) => mysql::user_tree(pool, user_id).await,
        }
    }
}

// The statements are identical on both drivers; only the connection type
// differs. On SQLite every transaction opens with a write so that it holds
// the write lock from the start.
macro_rules! cascade_driver {
    ($module:ident, $pool:ty, $conn:ty) => {
        mod $module {
            use super::*;

            pub(super) async fn job_tree(pool: &$pool, job_id: i64) -> Result<Option<CascadeReport>> {
                let mut tx = pool.begin().await?;
                let mut report = CascadeReport::default();
                delete_jobs(&mut *tx, &[job_id], &mut report).await?;
                if report.jobs == 0 {
                    tx.rollback().await?;
                    return Ok(None);
                }
                tx.commit().await.context("Failed to commit job delete")?;
                Ok(Some(report))
            }

            pub(super) async fn article_tree(
                pool: &$pool,
                article_id: i64,
            ) -> Result<Option<CascadeReport>> {
                let mut tx = pool.begin().await?;
                let mut report = CascadeReport::default();
                delete_articles(&mut *tx, &[article_id], &mut report).await?;
                if report.articles == 0 {
                    tx.rollback().await?;
                    return Ok(None);
                }
                tx.commit().await.context("Failed to commit article delete")?;
                Ok(Some(report))
            }

            pub(super) async fn user_tree(pool: &$pool, user_id: i64) -> Result<Option<CascadeReport>> {
                let mut tx = pool.begin().await?;
                let mut report = CascadeReport::default();

                report.tokens = sqlx::query("DELETE FROM auth_tokens WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete auth tokens")?
                    .rows_affected();

                let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to load user role")?;
                let Some(role) = role else {
                    tx.rollback().await?;
                    return Ok(None);
                };

                match role.parse::<UserRole>()? {
                    UserRole::Recruiter => {
                        let profiles = ids_where(
                            &mut *tx,
                            "SELECT id FROM recruiter_profiles WHERE user_id = ?",
                            user_id,
                        )
                        .await?;
                        for profile_id in &profiles {
                            let jobs = ids_where(
                                &mut *tx,
                                "SELECT id FROM jobs WHERE recruiter_id = ?",
                                *profile_id,
                            )
                            .await?;
                            delete_jobs(&mut *tx, &jobs, &mut report).await?;
                        }
                        report.profiles +=
                            delete_in(&mut *tx, "recruiter_profiles", "id", &profiles).await?;
                    }
                    UserRole::Student => {
                        let profiles = ids_where(
                            &mut *tx,
                            "SELECT id FROM student_profiles WHERE user_id = ?",
                            user_id,
                        )
                        .await?;
                        report.applications +=
                            delete_in(&mut *tx, "applications", "student_id", &profiles).await?;
                        report.saved_jobs +=
                            delete_in(&mut *tx, "saved_jobs", "student_id", &profiles).await?;
                        report.cvs += delete_in(&mut *tx, "cvs", "student_id", &profiles).await?;
                        report.profiles +=
                            delete_in(&mut *tx, "student_profiles", "id", &profiles).await?;
                    }
                    UserRole::Admin => {}
                }

                let articles =
                    ids_where(&mut *tx, "SELECT id FROM articles WHERE author_id = ?", user_id).await?;
                delete_articles(&mut *tx, &articles, &mut report).await?;

                report.detached_comments +=
                    sqlx::query("UPDATE article_comments SET user_id = NULL WHERE user_id = ?")
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to detach comments")?
                        .rows_affected();
                report.reactions += sqlx::query("DELETE FROM article_reactions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete reactions")?
                    .rows_affected();
                report.users += delete_in(&mut *tx, "users", "id", &[user_id]).await?;

                tx.commit().await.context("Failed to commit user delete")?;
                Ok(Some(report))
            }

            async fn delete_jobs(
                conn: &mut $conn,
                job_ids: &[i64],
                report: &mut CascadeReport,
            ) -> Result<()> {
                report.applications += delete_in(conn, "applications", "job_id", job_ids).await?;
                report.saved_jobs += delete_in(conn, "saved_jobs", "job_id", job_ids).await?;
                report.job_skills += delete_in(conn, "job_skills", "job_id", job_ids).await?;
                report.jobs += delete_in(conn, "jobs", "id", job_ids).await?;
                Ok(())
            }

            async fn delete_articles(
                conn: &mut $conn,
                article_ids: &[i64],
                report: &mut CascadeReport,
            ) -> Result<()> {
                report.reactions +=
                    delete_in(conn, "article_reactions", "article_id", article_ids).await?;

                let tree = CommentTree::build(&comment_links(conn, article_ids).await?);
                let stranded = tree.stranded();
                for chunk in stranded.chunks(CHUNK) {
                    let sql = format!(
                        "UPDATE article_comments SET parent_id = NULL WHERE id IN ({})",
                        placeholders(chunk.len())
                    );
                    let mut query = sqlx::query(&sql);
                    for id in chunk {
                        query = query.bind(*id);
                    }
                    query
                        .execute(&mut *conn)
                        .await
                        .context("Failed to unlink comment cycle")?;
                }
                for batch in tree.deletion_order() {
                    report.comments += delete_in(conn, "article_comments", "id", &batch).await?;
                }

                report.articles += delete_in(conn, "articles", "id", article_ids).await?;
                Ok(())
            }

            async fn comment_links(conn: &mut $conn, article_ids: &[i64]) -> Result<Vec<CommentLink>> {
                let mut links = Vec::new();
                for chunk in article_ids.chunks(CHUNK) {
                    let sql = format!(
                        "SELECT id, parent_id FROM article_comments WHERE article_id IN ({})",
                        placeholders(chunk.len())
                    );
                    let mut query = sqlx::query_as::<_, (i64, Option<i64>)>(&sql);
                    for id in chunk {
                        query = query.bind(*id);
                    }
                    let rows = query
                        .fetch_all(&mut *conn)
                        .await
                        .context("Failed to load comment tree")?;
                    links.extend(
                        rows.into_iter()
                            .map(|(id, parent_id)| CommentLink { id, parent_id }),
                    );
                }
                Ok(links)
            }

            async fn ids_where(conn: &mut $conn, sql: &str, key: i64) -> Result<Vec<i64>> {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(key)
                    .fetch_all(&mut *conn)
                    .await
                    .with_context(|| format!("Failed to run: {}", sql))
            }

            async fn delete_in(conn: &mut $conn, table: &str, column: &str, ids: &[i64]) -> Result<u64> {
                let mut deleted = 0;
                for chunk in ids.chunks(CHUNK) {
                    let sql = format!(
                        "DELETE FROM {} WHERE {} IN ({})",
                        table,
                        column,
                        placeholders(chunk.len())
                    );
                    let mut query = sqlx::query(&sql);
                    for id in chunk {
                        query = query.bind(*id);
                    }
                    deleted += query
                        .execute(&mut *conn)
                        .await
                        .with_context(|| format!("Failed to delete from {}", table))?
                        .rows_affected();
                }
                Ok(deleted)
            }
        }
    };
}

cascade_driver!(sqlite, sqlx::SqlitePool, sqlx::SqliteConnection);
cascade_driver!(mysql, sqlx::MySqlPool, sqlx::MySqlConnection);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{
        seed_recruiter, seed_student, seed_user, setup,
    };

    const TS: &str = "'2026-01-01T00:00:00+00:00'";

    async fn count(pool: &DynDatabasePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    async fn insert_job(pool: &DynDatabasePool, recruiter_id: i64) -> i64 {
        sqlx::query(&format!(
            "INSERT INTO jobs (recruiter_id, title, created_at, updated_at) VALUES (?, 'Dev', {0}, {0})",
            TS
        ))
        .bind(recruiter_id)
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn insert_article(pool: &DynDatabasePool, author_id: i64) -> i64 {
        sqlx::query(&format!(
            "INSERT INTO articles (author_id, title, created_at, updated_at) VALUES (?, 'Post', {0}, {0})",
            TS
        ))
        .bind(author_id)
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn insert_comment(
        pool: &DynDatabasePool,
        article_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> i64 {
        sqlx::query(&format!(
            "INSERT INTO article_comments (article_id, user_id, parent_id, content, created_at) \
             VALUES (?, ?, ?, 'hi', {})",
            TS
        ))
        .bind(article_id)
        .bind(user_id)
        .bind(parent_id)
        .execute(pool.as_sqlite().unwrap())
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn link_student(pool: &DynDatabasePool, job_id: i64, student_id: i64) {
        for table in ["applications", "saved_jobs"] {
            pool.execute(&format!(
                "INSERT INTO {} (job_id, student_id, created_at) VALUES ({}, {}, {})",
                table, job_id, student_id, TS
            ))
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_delete_job_tree() {
        let pool = setup().await;
        let (_, recruiter) = seed_recruiter(&pool, "rec@example.com").await;
        let (_, student) = seed_student(&pool, "stu@example.com").await;
        let job = insert_job(&pool, recruiter).await;
        let other = insert_job(&pool, recruiter).await;
        link_student(&pool, job, student).await;
        link_student(&pool, other, student).await;
        pool.execute(&format!(
            "INSERT INTO job_skills (job_id, skill_name) VALUES ({0}, 'rust'), ({0}, 'sql')",
            job
        ))
        .await
        .unwrap();

        let repo = SqlxCascadeRepository::new(pool.clone());
        let report = repo.delete_job_tree(job).await.unwrap().unwrap();
        assert_eq!(report.jobs, 1);
        assert_eq!(report.applications, 1);
        assert_eq!(report.saved_jobs, 1);
        assert_eq!(report.job_skills, 2);
        assert_eq!(report.rows_deleted(), 5);

        assert_eq!(count(&pool, "jobs").await, 1);
        assert_eq!(count(&pool, "applications").await, 1);
        assert!(repo.delete_job_tree(job).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_article_removes_reply_tree() {
        let pool = setup().await;
        let author = seed_user(&pool, "author@example.com", UserRole::Student).await;
        let reader = seed_user(&pool, "reader@example.com", UserRole::Student).await;
        let article = insert_article(&pool, author).await;
        let kept = insert_article(&pool, author).await;

        let root = insert_comment(&pool, article, reader, None).await;
        let reply = insert_comment(&pool, article, author, Some(root)).await;
        insert_comment(&pool, article, reader, Some(reply)).await;
        insert_comment(&pool, article, reader, None).await;
        insert_comment(&pool, kept, reader, None).await;
        pool.execute(&format!(
            "INSERT INTO article_reactions (article_id, user_id, reaction, created_at) \
             VALUES ({}, {}, 'like', {})",
            article, reader, TS
        ))
        .await
        .unwrap();

        let repo = SqlxCascadeRepository::new(pool.clone());
        let report = repo.delete_article_tree(article).await.unwrap().unwrap();
        assert_eq!(report.comments, 4);
        assert_eq!(report.reactions, 1);
        assert_eq!(report.articles, 1);
        assert_eq!(count(&pool, "article_comments").await, 1);
        assert_eq!(count(&pool, "articles").await, 1);
    }

    #[tokio::test]
    async fn test_delete_article_with_comment_cycle() {
        let pool = setup().await;
        let author = seed_user(&pool, "author@example.com", UserRole::Student).await;
        let article = insert_article(&pool, author).await;
        let a = insert_comment(&pool, article, author, None).await;
        let b = insert_comment(&pool, article, author, Some(a)).await;
        pool.execute(&format!("UPDATE article_comments SET parent_id = {} WHERE id = {}", b, a))
            .await
            .unwrap();

        let repo = SqlxCascadeRepository::new(pool.clone());
        let report = repo.delete_article_tree(article).await.unwrap().unwrap();
        assert_eq!(report.comments, 2);
        assert_eq!(count(&pool, "article_comments").await, 0);
    }

    #[tokio::test]
    async fn test_delete_recruiter_removes_jobs() {
        let pool = setup().await;
        let (user, recruiter) = seed_recruiter(&pool, "rec@example.com").await;
        let (_, student) = seed_student(&pool, "stu@example.com").await;
        let job = insert_job(&pool, recruiter).await;
        insert_job(&pool, recruiter).await;
        link_student(&pool, job, student).await;
        insert_article(&pool, user).await;
        pool.execute(&format!(
            "INSERT INTO auth_tokens (token, user_id, expires_at, created_at) VALUES ('t1', {}, {1}, {1})",
            user, TS
        ))
        .await
        .unwrap();

        let repo = SqlxCascadeRepository::new(pool.clone());
        let report = repo.delete_user_tree(user).await.unwrap().unwrap();
        assert_eq!(report.jobs, 2);
        assert_eq!(report.applications, 1);
        assert_eq!(report.articles, 1);
        assert_eq!(report.profiles, 1);
        assert_eq!(report.tokens, 1);
        assert_eq!(report.users, 1);

        assert_eq!(count(&pool, "recruiter_profiles").await, 0);
        // The student account is untouched
        assert_eq!(count(&pool, "student_profiles").await, 1);
        assert_eq!(count(&pool, "users").await, 1);
    }

    #[tokio::test]
    async fn test_delete_student_detaches_foreign_comments() {
        let pool = setup().await;
        let (user, student) = seed_student(&pool, "stu@example.com").await;
        let (_, recruiter) = seed_recruiter(&pool, "rec@example.com").await;
        let other_author = seed_user(&pool, "other@example.com", UserRole::Student).await;
        let job = insert_job(&pool, recruiter).await;
        link_student(&pool, job, student).await;
        pool.execute(&format!(
            "INSERT INTO cvs (student_id, title, created_at) VALUES ({}, 'CV', {})",
            student, TS
        ))
        .await
        .unwrap();
        let foreign = insert_article(&pool, other_author).await;
        insert_comment(&pool, foreign, user, None).await;

        let repo = SqlxCascadeRepository::new(pool.clone());
        let report = repo.delete_user_tree(user).await.unwrap().unwrap();
        assert_eq!(report.applications, 1);
        assert_eq!(report.saved_jobs, 1);
        assert_eq!(report.cvs, 1);
        assert_eq!(report.profiles, 1);
        assert_eq!(report.detached_comments, 1);

        assert_eq!(count(&pool, "jobs").await, 1);
        assert_eq!(count(&pool, "article_comments").await, 1);
        assert!(repo.delete_user_tree(user).await.unwrap().is_none());
    }
}
