//! Moderation service
//!
//! Every admin action follows the same sequence:
//! 1. validate input and load the resource
//! 2. apply the change as one atomic write (or one cascade transaction)
//! 3. append the audit entry
//! 4. notify the owner
//!
//! Steps 3 and 4 run only after step 2 has committed and are best-effort:
//! their outcomes are returned in [`Moderated`] and logged, never raised.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::audit::AuditLogService;
use super::cascade::CascadeCoordinator;
use super::error::{ModerationError, ModerationResult};
use super::notification::NotificationDispatcher;
use super::outcome::{Moderated, SideEffect};
use super::transition::{self, Transition};
use crate::db::repositories::{CascadeReport, ModerationStore, UserRepository};
use crate::models::{
    ActionType, AdminContext, Article, EntityType, Job, ModeratedResource, NewAuditLogEntry,
    Notification, NotificationType, OwnerRef,
};

/// Result of a hard delete
#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub entity_type: EntityType,
    pub entity_id: i64,
    /// Name captured before the delete
    pub name: String,
    pub cascade: CascadeReport,
}

/// What an action was applied to, captured before any delete
struct Subject {
    entity: EntityType,
    id: i64,
    name: String,
    /// How the subject reads in the audit description
    label: String,
    owner: Option<OwnerRef>,
}

impl Subject {
    fn of<R: ModeratedResource>(resource: &R) -> Self {
        Self {
            entity: R::ENTITY,
            id: resource.id(),
            name: resource.title().to_string(),
            label: resource.title().to_string(),
            owner: Some(resource.owner()),
        }
    }
}

/// Audit and notification sinks shared by all moderators
#[derive(Clone)]
struct Effects {
    audit: Arc<AuditLogService>,
    notifier: Arc<NotificationDispatcher>,
}

impl Effects {
    async fn conclude<T>(
        &self,
        resource: T,
        subject: Subject,
        admin: &AdminContext,
        action: ActionType,
        reason: Option<&str>,
    ) -> Moderated<T> {
        let entity = subject.entity.as_str();

        let entry = NewAuditLogEntry::new(
            admin,
            action,
            subject.entity,
            subject.id,
            Some(subject.name.clone()),
            describe(action, &subject, reason),
        );
        let audit = self.audit.record(entry).await;
        audit.log_unapplied("Audit log", entity, subject.id);

        let kind = NotificationType::for_moderation(subject.entity, action);
        let notification = match (subject.owner, kind) {
            (Some(owner), Some(kind)) => {
                let (title, message) = notice(subject.entity, action, &subject.name, reason);
                let notification = Notification::new(owner, kind, title, message)
                    .related_to(subject.entity, subject.id);
                self.notifier.notify(notification).await
            }
            _ => SideEffect::Skipped(format!("no owner to notify for {}", entity)),
        };
        notification.log_unapplied("Notification", entity, subject.id);

        tracing::info!(
            "Admin {} {} {} {}",
            admin.admin_id,
            past_tense(action),
            entity,
            subject.id
        );
        Moderated {
            resource,
            audit,
            notification,
        }
    }
}

/// Moderation actions for one resource type
pub struct ResourceModerator<R: ModeratedResource> {
    store: Arc<dyn ModerationStore<R>>,
    cascade: Arc<CascadeCoordinator>,
    effects: Effects,
}

impl<R: ModeratedResource> ResourceModerator<R> {
    pub async fn get(&self, id: i64) -> ModerationResult<R> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ModerationError::not_found(R::ENTITY, id))
    }

    /// Move the resource to its live status. Approving a live resource is a
    /// no-op; approving a rejected one is a conflict.
    pub async fn approve(&self, id: i64, admin: &AdminContext) -> ModerationResult<Moderated<R>> {
        let current = self.get(id).await?;
        match transition::approve(current.status())? {
            Transition::Unchanged => {
                let reason = format!("{} {} is already {}", R::ENTITY, id, current.status());
                Ok(Moderated::unchanged(current, reason))
            }
            Transition::Apply { from, to } => {
                let updated = self.set_status(id, from, to, admin).await?;
                Ok(self.conclude(updated, admin, ActionType::Approve, None).await)
            }
        }
    }

    pub async fn reject(&self, id: i64, admin: &AdminContext) -> ModerationResult<Moderated<R>> {
        let current = self.get(id).await?;
        match transition::reject(current.status())? {
            Transition::Unchanged => {
                let reason = format!("{} {} is already {}", R::ENTITY, id, current.status());
                Ok(Moderated::unchanged(current, reason))
            }
            Transition::Apply { from, to } => {
                let updated = self.set_status(id, from, to, admin).await?;
                Ok(self.conclude(updated, admin, ActionType::Reject, None).await)
            }
        }
    }

    /// Hide from any status. Hiding a hidden resource replaces the reason.
    pub async fn hide(
        &self,
        id: i64,
        admin: &AdminContext,
        reason: Option<&str>,
    ) -> ModerationResult<Moderated<R>> {
        let reason = transition::require_reason(reason, "hide")?;
        if !self.store.set_hidden(id, Some(&reason), Utc::now()).await? {
            return Err(ModerationError::not_found(R::ENTITY, id));
        }
        let updated = self.get(id).await?;
        Ok(self
            .conclude(updated, admin, ActionType::Hide, Some(&reason))
            .await)
    }

    pub async fn unhide(&self, id: i64, admin: &AdminContext) -> ModerationResult<Moderated<R>> {
        let current = self.get(id).await?;
        if !current.is_hidden() {
            let reason = format!("{} {} is not hidden", R::ENTITY, id);
            return Ok(Moderated::unchanged(current, reason));
        }
        if !self.store.set_hidden(id, None, Utc::now()).await? {
            return Err(ModerationError::not_found(R::ENTITY, id));
        }
        let updated = self.get(id).await?;
        Ok(self.conclude(updated, admin, ActionType::Unhide, None).await)
    }

    /// Hard-delete the resource and its dependents
    pub async fn delete(
        &self,
        id: i64,
        admin: &AdminContext,
        reason: Option<&str>,
    ) -> ModerationResult<Moderated<Deleted>> {
        let reason = transition::require_reason(reason, "delete")?;
        let current = self.get(id).await?;
        let subject = Subject::of(&current);

        let cascade = self.cascade.delete(R::ENTITY, id).await.map_err(|e| {
            tracing::error!("Failed to delete {} {}: {}", R::ENTITY, id, e);
            e
        })?;
        let deleted = Deleted {
            entity_type: R::ENTITY,
            entity_id: id,
            name: subject.name.clone(),
            cascade,
        };
        Ok(self
            .effects
            .conclude(deleted, subject, admin, ActionType::Delete, Some(&reason))
            .await)
    }

    async fn set_status(
        &self,
        id: i64,
        from: R::Status,
        to: R::Status,
        admin: &AdminContext,
    ) -> ModerationResult<R> {
        if self
            .store
            .update_status(id, from, to, admin.admin_id, Utc::now())
            .await?
        {
            return self.get(id).await;
        }
        // Lost the compare-and-set: the row is gone or another admin moved it.
        Err(match self.store.get_by_id(id).await? {
            None => ModerationError::not_found(R::ENTITY, id),
            Some(now) => ModerationError::Conflict(format!(
                "{} {} changed concurrently and is now {}",
                R::ENTITY,
                id,
                now.status()
            )),
        })
    }

    async fn conclude(
        &self,
        resource: R,
        admin: &AdminContext,
        action: ActionType,
        reason: Option<&str>,
    ) -> Moderated<R> {
        let subject = Subject::of(&resource);
        self.effects
            .conclude(resource, subject, admin, action, reason)
            .await
    }
}

/// Entry point for admin moderation of jobs, articles and accounts
pub struct ModerationService {
    jobs: ResourceModerator<Job>,
    articles: ResourceModerator<Article>,
    users: Arc<dyn UserRepository>,
    cascade: Arc<CascadeCoordinator>,
    effects: Effects,
}

impl ModerationService {
    pub fn new(
        job_store: Arc<dyn ModerationStore<Job>>,
        article_store: Arc<dyn ModerationStore<Article>>,
        users: Arc<dyn UserRepository>,
        cascade: Arc<CascadeCoordinator>,
        audit: Arc<AuditLogService>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        let effects = Effects { audit, notifier };
        Self {
            jobs: ResourceModerator {
                store: job_store,
                cascade: cascade.clone(),
                effects: effects.clone(),
            },
            articles: ResourceModerator {
                store: article_store,
                cascade: cascade.clone(),
                effects: effects.clone(),
            },
            users,
            cascade,
            effects,
        }
    }

    pub fn jobs(&self) -> &ResourceModerator<Job> {
        &self.jobs
    }

    pub fn articles(&self) -> &ResourceModerator<Article> {
        &self.articles
    }

    /// Delete an account with everything it owns. Admins cannot delete
    /// their own account.
    pub async fn delete_user(
        &self,
        user_id: i64,
        admin: &AdminContext,
        reason: Option<&str>,
    ) -> ModerationResult<Moderated<Deleted>> {
        let reason = transition::require_reason(reason, "delete")?;
        if user_id == admin.admin_id {
            return Err(ModerationError::Validation(
                "Administrators cannot delete their own account".to_string(),
            ));
        }
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ModerationError::not_found(EntityType::User, user_id))?;

        let cascade = self
            .cascade
            .delete(EntityType::User, user_id)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete user {}: {}", user_id, e);
                e
            })?;

        let name = user.display_name().to_string();
        let subject = Subject {
            entity: EntityType::User,
            id: user_id,
            label: format!("{} (Role: {})", name, user.role),
            name: name.clone(),
            owner: None,
        };
        let deleted = Deleted {
            entity_type: EntityType::User,
            entity_id: user_id,
            name,
            cascade,
        };
        Ok(self
            .effects
            .conclude(deleted, subject, admin, ActionType::Delete, Some(&reason))
            .await)
    }
}

fn past_tense(action: ActionType) -> &'static str {
    match action {
        ActionType::Approve => "approved",
        ActionType::Reject => "rejected",
        ActionType::Hide => "hid",
        ActionType::Unhide => "unhid",
        ActionType::Delete => "deleted",
    }
}

fn describe(action: ActionType, subject: &Subject, reason: Option<&str>) -> String {
    let base = format!(
        "Admin {} {}: {}",
        past_tense(action),
        subject.entity,
        subject.label
    );
    match reason {
        Some(reason) => format!("{}. Reason: {}", base, reason),
        None => base,
    }
}

/// Title and message sent to the owner
fn notice(
    entity: EntityType,
    action: ActionType,
    name: &str,
    reason: Option<&str>,
) -> (String, String) {
    let noun = match entity {
        EntityType::Job => "Job",
        EntityType::Article => "Article",
        EntityType::User => "Account",
        EntityType::Subscription => "Subscription",
    };
    let lower = entity.as_str();
    let reason = reason.unwrap_or("not given");
    match action {
        ActionType::Approve => (
            format!("{} approved", noun),
            format!("Your {} '{}' has been approved and is now live.", lower, name),
        ),
        ActionType::Reject => (
            format!("{} rejected", noun),
            format!("Your {} '{}' has been rejected.", lower, name),
        ),
        ActionType::Hide => (
            format!("{} hidden", noun),
            format!("Your {} '{}' has been hidden. Reason: {}", lower, name, reason),
        ),
        ActionType::Unhide => (
            format!("{} visible again", noun),
            format!("Your {} '{}' is visible again.", lower, name),
        ),
        ActionType::Delete => (
            format!("{} deleted", noun),
            format!("Your {} '{}' has been deleted. Reason: {}", lower, name, reason),
        ),
    }
}
