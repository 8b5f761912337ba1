//! Article repository
//!
//! Moderation-facing persistence for articles on SQLite and MySQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

use super::row::RowExt;
use super::ModerationStore;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Article, ArticleStatus, CreateArticleInput};

const ARTICLE_COLUMNS: &str = "id, author_id, title, content, status, hidden, hidden_reason, \
     hidden_at, approved_by, approved_at, created_at, updated_at";

/// SQLx-based article repository
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ModerationStore<Article>> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ModerationStore<Article> for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_article_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_article_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_article_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_article_by_id_mysql(pool, id).await,
        }
    }

    async fn update_status(
        &self,
        id: i64,
        from: ArticleStatus,
        to: ArticleStatus,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                update_article_status_sqlite(pool, id, from, to, admin_id, at).await?
            }
            Backend::Mysql(pool) => {
                update_article_status_mysql(pool, id, from, to, admin_id, at).await?
            }
        };
        Ok(rows == 1)
    }

    async fn set_hidden(&self, id: i64, reason: Option<&str>, at: DateTime<Utc>) -> Result<bool> {
        let rows = match self.pool.backend() {
            Backend::Sqlite(pool) => set_article_hidden_sqlite(pool, id, reason, at).await?,
            Backend::Mysql(pool) => set_article_hidden_mysql(pool, id, reason, at).await?,
        };
        Ok(rows == 1)
    }
}

fn row_to_article(row: &impl RowExt) -> Result<Article> {
    Ok(Article {
        id: row.int("id")?,
        author_id: row.int("author_id")?,
        title: row.text("title")?,
        content: row.text("content")?,
        status: row.parsed("status")?,
        hidden: row.flag("hidden")?,
        hidden_reason: row.opt_text("hidden_reason")?,
        hidden_at: row.opt_timestamp("hidden_at")?,
        approved_by: row.opt_int("approved_by")?,
        approved_at: row.opt_timestamp("approved_at")?,
        created_at: row.timestamp("created_at")?,
        updated_at: row.timestamp("updated_at")?,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO articles (author_id, title, content, status, hidden, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(input.author_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.status.as_str())
    .bind(false)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    get_article_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .context("Article missing after insert")
}

async fn get_article_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;
    row.as_ref().map(row_to_article).transpose()
}

async fn update_article_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    from: ArticleStatus,
    to: ArticleStatus,
    admin_id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET status = ?, approved_by = ?, approved_at = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(admin_id)
    .bind(at)
    .bind(at)
    .bind(id)
    .bind(from.as_str())
    .execute(pool)
    .await
    .context("Failed to update article status")?;
    Ok(result.rows_affected())
}

async fn set_article_hidden_sqlite(
    pool: &SqlitePool,
    id: i64,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET hidden = ?, hidden_reason = ?, hidden_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(reason.is_some())
    .bind(reason)
    .bind(reason.map(|_| at))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update article visibility")?;
    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO articles (author_id, title, content, status, hidden, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(input.author_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(input.status.as_str())
    .bind(false)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    get_article_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .context("Article missing after insert")
}

async fn get_article_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Article>> {
    let sql = format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;
    row.as_ref().map(row_to_article).transpose()
}

async fn update_article_status_mysql(
    pool: &MySqlPool,
    id: i64,
    from: ArticleStatus,
    to: ArticleStatus,
    admin_id: i64,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET status = ?, approved_by = ?, approved_at = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(admin_id)
    .bind(at)
    .bind(at)
    .bind(id)
    .bind(from.as_str())
    .execute(pool)
    .await
    .context("Failed to update article status")?;
    Ok(result.rows_affected())
}

async fn set_article_hidden_mysql(
    pool: &MySqlPool,
    id: i64,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE articles SET hidden = ?, hidden_reason = ?, hidden_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(reason.is_some())
    .bind(reason)
    .bind(reason.map(|_| at))
    .bind(at)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update article visibility")?;
    Ok(result.rows_affected())
}
