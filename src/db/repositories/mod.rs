//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository owns the SQL for one aggregate, on both SQLite and MySQL.

pub mod article;
pub mod audit_log;
pub mod cascade;
pub mod job;
mod row;
pub mod store;
pub mod subscription;
pub mod user;

pub use article::SqlxArticleRepository;
pub use audit_log::{AuditFilter, AuditLogRepository, SqlxAuditLogRepository};
pub use cascade::{CascadeReport, CascadeRepository, SqlxCascadeRepository};
pub use job::SqlxJobRepository;
pub use store::ModerationStore;
pub use subscription::{
    ApproveOutcome, PackageRemoval, PendingInsert, SqlxSubscriptionRepository, SubscriptionRepository,
};
pub use user::{SqlxUserRepository, UserRepository};

/// Fixtures shared by repository and service tests
#[cfg(test)]
pub(crate) mod test_support {
    use super::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CreateUserInput, UserRole};

    /// Fresh in-memory database with every migration applied
    pub async fn setup() -> DynDatabasePool {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool
    }

    pub async fn seed_user(pool: &DynDatabasePool, email: &str, role: UserRole) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput::new(email, role))
            .await
            .unwrap()
            .id
    }

    /// Returns `(user_id, recruiter_profile_id)`
    pub async fn seed_recruiter(pool: &DynDatabasePool, email: &str) -> (i64, i64) {
        let repo = SqlxUserRepository::new(pool.clone());
        let user = repo
            .create(&CreateUserInput::new(email, UserRole::Recruiter))
            .await
            .unwrap();
        let profile = repo
            .create_recruiter_profile(user.id, None, "Acme")
            .await
            .unwrap();
        (user.id, profile.id)
    }

    /// Returns `(user_id, student_profile_id)`
    pub async fn seed_student(pool: &DynDatabasePool, email: &str) -> (i64, i64) {
        let repo = SqlxUserRepository::new(pool.clone());
        let user = repo
            .create(&CreateUserInput::new(email, UserRole::Student))
            .await
            .unwrap();
        let profile = repo.create_student_profile(user.id).await.unwrap();
        (user.id, profile.id)
    }
}
