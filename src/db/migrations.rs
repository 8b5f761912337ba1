//! Database migrations
//!
//! Schema changes are embedded as SQL strings, one variant per driver, and
//! applied in version order. Applied versions are tracked in `_migrations`.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{MySqlPool, SqlitePool};

use super::{Backend, DynDatabasePool};

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_accounts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                full_name VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'student',
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
            CREATE TABLE IF NOT EXISTS auth_tokens (
                token VARCHAR(128) PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_auth_tokens_user ON auth_tokens(user_id);
            CREATE TABLE IF NOT EXISTS recruiter_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id),
                company_id INTEGER,
                company_name VARCHAR(255) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recruiter_profiles_company ON recruiter_profiles(company_id);
            CREATE TABLE IF NOT EXISTS student_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users(id)
            );
            CREATE TABLE IF NOT EXISTS cvs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL REFERENCES student_profiles(id),
                title VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cvs_student ON cvs(student_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                full_name VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'student',
                created_at DATETIME(6) NOT NULL,
                INDEX idx_users_role (role)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS auth_tokens (
                token VARCHAR(128) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                INDEX idx_auth_tokens_user (user_id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS recruiter_profiles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                company_id BIGINT,
                company_name VARCHAR(255) NOT NULL,
                INDEX idx_recruiter_profiles_company (company_id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS student_profiles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL UNIQUE,
                FOREIGN KEY (user_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS cvs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                student_id BIGINT NOT NULL,
                title VARCHAR(255) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                INDEX idx_cvs_student (student_id),
                FOREIGN KEY (student_id) REFERENCES student_profiles(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    },
    Migration {
        version: 2,
        name: "create_jobs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recruiter_id INTEGER NOT NULL REFERENCES recruiter_profiles(id),
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                hidden BOOLEAN NOT NULL DEFAULT 0,
                hidden_reason TEXT,
                hidden_at TIMESTAMP,
                approved_by INTEGER,
                approved_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_recruiter ON jobs(recruiter_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                student_id INTEGER NOT NULL REFERENCES student_profiles(id),
                created_at TIMESTAMP NOT NULL,
                UNIQUE(job_id, student_id)
            );
            CREATE INDEX IF NOT EXISTS idx_applications_student ON applications(student_id);
            CREATE TABLE IF NOT EXISTS saved_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                student_id INTEGER NOT NULL REFERENCES student_profiles(id),
                created_at TIMESTAMP NOT NULL,
                UNIQUE(job_id, student_id)
            );
            CREATE INDEX IF NOT EXISTS idx_saved_jobs_student ON saved_jobs(student_id);
            CREATE TABLE IF NOT EXISTS job_skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id),
                skill_name VARCHAR(100) NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_job_skills_job ON job_skills(job_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                recruiter_id BIGINT NOT NULL,
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                hidden BOOLEAN NOT NULL DEFAULT FALSE,
                hidden_reason TEXT,
                hidden_at DATETIME(6),
                approved_by BIGINT,
                approved_at DATETIME(6),
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                INDEX idx_jobs_recruiter (recruiter_id),
                INDEX idx_jobs_status (status),
                FOREIGN KEY (recruiter_id) REFERENCES recruiter_profiles(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS applications (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                job_id BIGINT NOT NULL,
                student_id BIGINT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE KEY uk_applications (job_id, student_id),
                INDEX idx_applications_student (student_id),
                FOREIGN KEY (job_id) REFERENCES jobs(id),
                FOREIGN KEY (student_id) REFERENCES student_profiles(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS saved_jobs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                job_id BIGINT NOT NULL,
                student_id BIGINT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE KEY uk_saved_jobs (job_id, student_id),
                INDEX idx_saved_jobs_student (student_id),
                FOREIGN KEY (job_id) REFERENCES jobs(id),
                FOREIGN KEY (student_id) REFERENCES student_profiles(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS job_skills (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                job_id BIGINT NOT NULL,
                skill_name VARCHAR(100) NOT NULL,
                INDEX idx_job_skills_job (job_id),
                FOREIGN KEY (job_id) REFERENCES jobs(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    },
    Migration {
        version: 3,
        name: "create_articles",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL REFERENCES users(id),
                title VARCHAR(500) NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                hidden BOOLEAN NOT NULL DEFAULT 0,
                hidden_reason TEXT,
                hidden_at TIMESTAMP,
                approved_by INTEGER,
                approved_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_articles_author ON articles(author_id);
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
            CREATE TABLE IF NOT EXISTS article_comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL REFERENCES articles(id),
                user_id INTEGER REFERENCES users(id),
                parent_id INTEGER REFERENCES article_comments(id),
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_article_comments_article ON article_comments(article_id);
            CREATE INDEX IF NOT EXISTS idx_article_comments_user ON article_comments(user_id);
            CREATE INDEX IF NOT EXISTS idx_article_comments_parent ON article_comments(parent_id);
            CREATE TABLE IF NOT EXISTS article_reactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL REFERENCES articles(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                reaction VARCHAR(20) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE(article_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_article_reactions_user ON article_reactions(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                author_id BIGINT NOT NULL,
                title VARCHAR(500) NOT NULL,
                content LONGTEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                hidden BOOLEAN NOT NULL DEFAULT FALSE,
                hidden_reason TEXT,
                hidden_at DATETIME(6),
                approved_by BIGINT,
                approved_at DATETIME(6),
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                INDEX idx_articles_author (author_id),
                INDEX idx_articles_status (status),
                FOREIGN KEY (author_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS article_comments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                article_id BIGINT NOT NULL,
                user_id BIGINT,
                parent_id BIGINT,
                content TEXT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                INDEX idx_article_comments_article (article_id),
                INDEX idx_article_comments_user (user_id),
                INDEX idx_article_comments_parent (parent_id),
                FOREIGN KEY (article_id) REFERENCES articles(id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (parent_id) REFERENCES article_comments(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS article_reactions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                article_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                reaction VARCHAR(20) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                UNIQUE KEY uk_article_reactions (article_id, user_id),
                INDEX idx_article_reactions_user (user_id),
                FOREIGN KEY (article_id) REFERENCES articles(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    },
    Migration {
        version: 4,
        name: "create_subscriptions",
        // Subscriptions carry no foreign key to users: they outlive the account as history.
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE,
                duration_days INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                package_id INTEGER NOT NULL REFERENCES packages(id),
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                start_date TIMESTAMP NOT NULL,
                end_date TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(status, created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS uk_subscriptions_one_approved
                ON subscriptions(user_id) WHERE status = 'approved';
            CREATE UNIQUE INDEX IF NOT EXISTS uk_subscriptions_one_pending
                ON subscriptions(user_id, package_id) WHERE status = 'pending';
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL UNIQUE,
                duration_days INT NOT NULL
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;
            CREATE TABLE IF NOT EXISTS subscriptions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                package_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                start_date DATETIME(6) NOT NULL,
                end_date DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                approved_user_id BIGINT
                    AS (CASE WHEN status = 'approved' THEN user_id ELSE NULL END) STORED,
                pending_pair VARCHAR(64)
                    AS (CASE WHEN status = 'pending' THEN CONCAT(user_id, ':', package_id) ELSE NULL END) STORED,
                UNIQUE KEY uk_subscriptions_one_approved (approved_user_id),
                UNIQUE KEY uk_subscriptions_one_pending (pending_pair),
                INDEX idx_subscriptions_user (user_id),
                INDEX idx_subscriptions_status (status, created_at),
                FOREIGN KEY (package_id) REFERENCES packages(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    },
    Migration {
        version: 5,
        name: "create_audit_logs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_id INTEGER NOT NULL,
                admin_email VARCHAR(255) NOT NULL,
                action_type VARCHAR(20) NOT NULL,
                entity_type VARCHAR(20) NOT NULL,
                entity_id INTEGER NOT NULL,
                entity_name VARCHAR(500),
                description TEXT NOT NULL,
                ip_address VARCHAR(64) NOT NULL,
                created_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs(created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_logs_admin ON audit_logs(admin_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_logs_entity ON audit_logs(entity_type, entity_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                admin_id BIGINT NOT NULL,
                admin_email VARCHAR(255) NOT NULL,
                action_type VARCHAR(20) NOT NULL,
                entity_type VARCHAR(20) NOT NULL,
                entity_id BIGINT NOT NULL,
                entity_name VARCHAR(500),
                description TEXT NOT NULL,
                ip_address VARCHAR(64) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                INDEX idx_audit_logs_created (created_at),
                INDEX idx_audit_logs_admin (admin_id, created_at),
                INDEX idx_audit_logs_entity (entity_type, entity_id, created_at)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
        "#,
    },
];

/// Run all pending migrations and return how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let applied = match pool.backend() {
        Backend::Sqlite(pool) => applied_versions_sqlite(pool).await?,
        Backend::Mysql(pool) => applied_versions_mysql(pool).await?,
    };

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied.contains(&(migration.version as i64)) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        match pool.backend() {
            Backend::Sqlite(pool) => apply_migration_sqlite(pool, migration).await,
            Backend::Mysql(pool) => apply_migration_mysql(pool, migration).await,
        }
        .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn applied_versions_sqlite(pool: &SqlitePool) -> Result<Vec<i64>> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;

    let versions = sqlx::query_scalar("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(versions)
}

async fn applied_versions_mysql(pool: &MySqlPool) -> Result<Vec<i64>> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version BIGINT PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at DATETIME(6) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;

    let versions = sqlx::query_scalar("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(versions)
}

// SQLite DDL is transactional, so a failed migration leaves no partial schema.
async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version as i64)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

// MySQL commits each DDL statement implicitly; statements are applied one by one.
async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version as i64)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
