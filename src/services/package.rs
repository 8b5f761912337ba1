//! Package catalogue
//!
//! Admins maintain the packages subscribers can request. A package that any
//! subscription still refers to cannot be deleted.

use std::sync::Arc;

use super::error::{ModerationError, ModerationResult};
use crate::db::repositories::{PackageRemoval, SubscriptionRepository};
use crate::models::Package;

/// Longest validity window a package may grant (100 years)
pub const MAX_DURATION_DAYS: i64 = 36_500;

pub struct PackageService {
    repo: Arc<dyn SubscriptionRepository>,
}

impl PackageService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> ModerationResult<Vec<Package>> {
        Ok(self.repo.list_packages().await?)
    }

    pub async fn create(&self, name: &str, duration_days: i64) -> ModerationResult<Package> {
        let name = validate(name, duration_days)?;
        let package = self.repo.create_package(name, duration_days).await?;
        tracing::info!("Created package {} ({})", package.id, package.name);
        Ok(package)
    }

    pub async fn update(
        &self,
        id: i64,
        name: &str,
        duration_days: i64,
    ) -> ModerationResult<Package> {
        let name = validate(name, duration_days)?;
        let package = self
            .repo
            .update_package(id, name, duration_days)
            .await?
            .ok_or_else(|| ModerationError::not_found("package", id))?;
        tracing::info!("Updated package {}", id);
        Ok(package)
    }

    pub async fn delete(&self, id: i64) -> ModerationResult<()> {
        match self.repo.delete_package(id).await? {
            PackageRemoval::Removed => {
                tracing::info!("Deleted package {}", id);
                Ok(())
            }
            PackageRemoval::NotFound => Err(ModerationError::not_found("package", id)),
            PackageRemoval::InUse(count) => Err(ModerationError::Conflict(format!(
                "Package {} is referenced by {} subscription(s)",
                id, count
            ))),
        }
    }
}

fn validate(name: &str, duration_days: i64) -> ModerationResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ModerationError::Validation(
            "Package name cannot be empty".to_string(),
        ));
    }
    if !(1..=MAX_DURATION_DAYS).contains(&duration_days) {
        return Err(ModerationError::Validation(format!(
            "Package duration must be between 1 and {} days",
            MAX_DURATION_DAYS
        )));
    }
    Ok(name)
}
