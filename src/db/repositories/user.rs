//! User repository
//!
//! Accounts, recruiter/student profiles and the bearer tokens issued to
//! them. Tokens are minted by the authentication service; this crate only
//! stores and resolves them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

use super::row::RowExt;
use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateUserInput, RecruiterProfile, StudentProfile, User, UserRole};

const USER_COLUMNS: &str = "id, email, full_name, role, created_at";
const RECRUITER_COLUMNS: &str = "id, user_id, company_id, company_name";
const STUDENT_COLUMNS: &str = "id, user_id";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All accounts with the given role, oldest first
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    async fn create_recruiter_profile(
        &self,
        user_id: i64,
        company_id: Option<i64>,
        company_name: &str,
    ) -> Result<RecruiterProfile>;

    async fn get_recruiter_profile(&self, id: i64) -> Result<Option<RecruiterProfile>>;

    async fn get_recruiter_profile_by_user(&self, user_id: i64) -> Result<Option<RecruiterProfile>>;

    async fn list_recruiter_profiles_by_company(&self, company_id: i64)
        -> Result<Vec<RecruiterProfile>>;

    async fn create_student_profile(&self, user_id: i64) -> Result<StudentProfile>;

    async fn get_student_profile(&self, id: i64) -> Result<Option<StudentProfile>>;

    async fn get_student_profile_by_user(&self, user_id: i64) -> Result<Option<StudentProfile>>;

    /// Store a token issued for `user_id`
    async fn store_token(&self, user_id: i64, token: &str, expires_at: DateTime<Utc>)
        -> Result<()>;

    /// Resolve an unexpired token to its account
    async fn find_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_user_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, UserKey::Id(id)).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, UserKey::Id(id)).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, UserKey::Text(email)).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, UserKey::Text(email)).await,
        }
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_by_role_sqlite(pool, role).await,
            Backend::Mysql(pool) => list_users_by_role_mysql(pool, role).await,
        }
    }

    async fn create_recruiter_profile(
        &self,
        user_id: i64,
        company_id: Option<i64>,
        company_name: &str,
    ) -> Result<RecruiterProfile> {
        let sql = "INSERT INTO recruiter_profiles (user_id, company_id, company_name) VALUES (?, ?, ?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(company_id)
                .bind(company_name)
                .execute(pool)
                .await
                .context("Failed to create recruiter profile")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .bind(company_id)
                .bind(company_name)
                .execute(pool)
                .await
                .context("Failed to create recruiter profile")?
                .last_insert_id() as i64,
        };
        Ok(RecruiterProfile {
            id,
            user_id,
            company_id,
            company_name: company_name.to_string(),
        })
    }

    async fn get_recruiter_profile(&self, id: i64) -> Result<Option<RecruiterProfile>> {
        let sql = format!("SELECT {} FROM recruiter_profiles WHERE id = ?", RECRUITER_COLUMNS);
        Ok(self.fetch_recruiters(&sql, id).await?.into_iter().next())
    }

    async fn get_recruiter_profile_by_user(&self, user_id: i64) -> Result<Option<RecruiterProfile>> {
        let sql = format!(
            "SELECT {} FROM recruiter_profiles WHERE user_id = ?",
            RECRUITER_COLUMNS
        );
        Ok(self.fetch_recruiters(&sql, user_id).await?.into_iter().next())
    }

    async fn list_recruiter_profiles_by_company(
        &self,
        company_id: i64,
    ) -> Result<Vec<RecruiterProfile>> {
        let sql = format!(
            "SELECT {} FROM recruiter_profiles WHERE company_id = ? ORDER BY id",
            RECRUITER_COLUMNS
        );
        self.fetch_recruiters(&sql, company_id).await
    }

    async fn create_student_profile(&self, user_id: i64) -> Result<StudentProfile> {
        let sql = "INSERT INTO student_profiles (user_id) VALUES (?)";
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to create student profile")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to create student profile")?
                .last_insert_id() as i64,
        };
        Ok(StudentProfile { id, user_id })
    }

    async fn get_student_profile(&self, id: i64) -> Result<Option<StudentProfile>> {
        let sql = format!("SELECT {} FROM student_profiles WHERE id = ?", STUDENT_COLUMNS);
        self.fetch_student(&sql, id).await
    }

    async fn get_student_profile_by_user(&self, user_id: i64) -> Result<Option<StudentProfile>> {
        let sql = format!(
            "SELECT {} FROM student_profiles WHERE user_id = ?",
            STUDENT_COLUMNS
        );
        self.fetch_student(&sql, user_id).await
    }

    async fn store_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let sql = "INSERT INTO auth_tokens (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(token)
                    .bind(user_id)
                    .bind(expires_at)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to store token")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(token)
                    .bind(user_id)
                    .bind(expires_at)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to store token")?;
            }
        }
        Ok(())
    }

    async fn find_by_token(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_user_by_token_sqlite(pool, token, now).await,
            Backend::Mysql(pool) => find_user_by_token_mysql(pool, token, now).await,
        }
    }
}

impl SqlxUserRepository {
    async fn fetch_recruiters(&self, sql: &str, key: i64) -> Result<Vec<RecruiterProfile>> {
        let profiles = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(key)
                .fetch_all(pool)
                .await
                .context("Failed to get recruiter profile")?
                .iter()
                .map(row_to_recruiter)
                .collect::<Result<Vec<_>>>()?,
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(key)
                .fetch_all(pool)
                .await
                .context("Failed to get recruiter profile")?
                .iter()
                .map(row_to_recruiter)
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(profiles)
    }

    async fn fetch_student(&self, sql: &str, key: i64) -> Result<Option<StudentProfile>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(key)
                .fetch_optional(pool)
                .await
                .context("Failed to get student profile")?
                .as_ref()
                .map(row_to_student)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(key)
                .fetch_optional(pool)
                .await
                .context("Failed to get student profile")?
                .as_ref()
                .map(row_to_student)
                .transpose(),
        }
    }
}

enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

fn row_to_user(row: &impl RowExt) -> Result<User> {
    Ok(User {
        id: row.int("id")?,
        email: row.text("email")?,
        full_name: row.opt_text("full_name")?,
        role: row.parsed("role")?,
        created_at: row.timestamp("created_at")?,
    })
}

fn row_to_recruiter(row: &impl RowExt) -> Result<RecruiterProfile> {
    Ok(RecruiterProfile {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
        company_id: row.opt_int("company_id")?,
        company_name: row.text("company_name")?,
    })
}

fn row_to_student(row: &impl RowExt) -> Result<StudentProfile> {
    Ok(StudentProfile {
        id: row.int("id")?,
        user_id: row.int("user_id")?,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO users (email, full_name, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&input.email)
    .bind(&input.full_name)
    .bind(input.role.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        email: input.email.clone(),
        full_name: input.full_name.clone(),
        role: input.role,
        created_at: now,
    })
}

async fn fetch_user_sqlite(pool: &SqlitePool, sql: &str, key: UserKey<'_>) -> Result<Option<User>> {
    let query = match key {
        UserKey::Id(id) => sqlx::query(sql).bind(id),
        UserKey::Text(text) => sqlx::query(sql).bind(text),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;
    row.as_ref().map(row_to_user).transpose()
}

async fn list_users_by_role_sqlite(pool: &SqlitePool, role: UserRole) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users WHERE role = ? ORDER BY id", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(role.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to list users by role")?;
    rows.iter().map(row_to_user).collect()
}

async fn find_user_by_token_sqlite(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT u.id, u.email, u.full_name, u.role, u.created_at \
         FROM auth_tokens t JOIN users u ON u.id = t.user_id \
         WHERE t.token = ? AND t.expires_at > ?",
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to resolve token")?;
    row.as_ref().map(row_to_user).transpose()
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO users (email, full_name, role, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&input.email)
    .bind(&input.full_name)
    .bind(input.role.as_str())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        email: input.email.clone(),
        full_name: input.full_name.clone(),
        role: input.role,
        created_at: now,
    })
}

async fn fetch_user_mysql(pool: &MySqlPool, sql: &str, key: UserKey<'_>) -> Result<Option<User>> {
    let query = match key {
        UserKey::Id(id) => sqlx::query(sql).bind(id),
        UserKey::Text(text) => sqlx::query(sql).bind(text),
    };
    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;
    row.as_ref().map(row_to_user).transpose()
}

async fn list_users_by_role_mysql(pool: &MySqlPool, role: UserRole) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users WHERE role = ? ORDER BY id", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .bind(role.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to list users by role")?;
    rows.iter().map(row_to_user).collect()
}

async fn find_user_by_token_mysql(
    pool: &MySqlPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT u.id, u.email, u.full_name, u.role, u.created_at \
         FROM auth_tokens t JOIN users u ON u.id = t.user_id \
         WHERE t.token = ? AND t.expires_at > ?",
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await
    .context("Failed to resolve token")?;
    row.as_ref().map(row_to_user).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let repo = SqlxUserRepository::new(setup().await);
        let user = repo
            .create(&CreateUserInput::new("ana@example.com", UserRole::Recruiter).with_full_name("Ana"))
            .await
            .unwrap();

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");
        assert_eq!(by_id.role, UserRole::Recruiter);

        let by_email = repo.get_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = SqlxUserRepository::new(setup().await);
        repo.create(&CreateUserInput::new("dup@example.com", UserRole::Student))
            .await
            .unwrap();
        assert!(repo
            .create(&CreateUserInput::new("dup@example.com", UserRole::Admin))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_by_role() {
        let repo = SqlxUserRepository::new(setup().await);
        for (email, role) in [
            ("a1@example.com", UserRole::Admin),
            ("s1@example.com", UserRole::Student),
            ("a2@example.com", UserRole::Admin),
        ] {
            repo.create(&CreateUserInput::new(email, role)).await.unwrap();
        }

        let admins = repo.list_by_role(UserRole::Admin).await.unwrap();
        let emails: Vec<_> = admins.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a1@example.com", "a2@example.com"]);
    }

    #[tokio::test]
    async fn test_profiles_resolve_both_ways() {
        let repo = SqlxUserRepository::new(setup().await);
        let recruiter = repo
            .create(&CreateUserInput::new("hr@acme.io", UserRole::Recruiter))
            .await
            .unwrap();
        let student = repo
            .create(&CreateUserInput::new("kid@uni.edu", UserRole::Student))
            .await
            .unwrap();

        let rp = repo
            .create_recruiter_profile(recruiter.id, Some(12), "Acme")
            .await
            .unwrap();
        let sp = repo.create_student_profile(student.id).await.unwrap();

        assert_eq!(repo.get_recruiter_profile(rp.id).await.unwrap(), Some(rp.clone()));
        assert_eq!(
            repo.get_recruiter_profile_by_user(recruiter.id).await.unwrap(),
            Some(rp.clone())
        );
        assert_eq!(
            repo.list_recruiter_profiles_by_company(12).await.unwrap(),
            vec![rp]
        );
        assert_eq!(repo.get_student_profile(sp.id).await.unwrap(), Some(sp.clone()));
        assert_eq!(
            repo.get_student_profile_by_user(student.id).await.unwrap(),
            Some(sp)
        );
        assert!(repo.get_student_profile(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_token_respects_expiry() {
        let repo = SqlxUserRepository::new(setup().await);
        let admin = repo
            .create(&CreateUserInput::new("root@example.com", UserRole::Admin))
            .await
            .unwrap();
        let now = Utc::now();
        repo.store_token(admin.id, "live-token", now + Duration::hours(1))
            .await
            .unwrap();
        repo.store_token(admin.id, "old-token", now - Duration::hours(1))
            .await
            .unwrap();

        let found = repo.find_by_token("live-token", now).await.unwrap().unwrap();
        assert_eq!(found.id, admin.id);
        assert!(repo.find_by_token("old-token", now).await.unwrap().is_none());
        assert!(repo.find_by_token("missing", now).await.unwrap().is_none());
    }
}
