//! Subscription service
//!
//! Users request packages; admins approve or reject the requests. Approval
//! is exclusive: the user's previously approved subscription is cancelled
//! in the same transaction, and a unique index turns a lost race into a
//! conflict instead of a second APPROVED row.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use super::audit::AuditLogService;
use super::directory::DirectoryClient;
use super::error::{ModerationError, ModerationResult};
use super::notification::NotificationDispatcher;
use super::outcome::{Moderated, SideEffect};
use crate::db::repositories::{ApproveOutcome, PendingInsert, SubscriptionRepository};
use crate::models::{
    ActionType, AdminContext, EntityType, ListParams, NewAuditLogEntry, Notification,
    NotificationType, OwnerRef, PagedResult, Subscription, SubscriptionStatus, UserRole,
};

pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    audit: Arc<AuditLogService>,
    notifier: Arc<NotificationDispatcher>,
    directory: Arc<dyn DirectoryClient>,
}

impl SubscriptionService {
    pub fn new(
        repo: Arc<dyn SubscriptionRepository>,
        audit: Arc<AuditLogService>,
        notifier: Arc<NotificationDispatcher>,
        directory: Arc<dyn DirectoryClient>,
    ) -> Self {
        Self {
            repo,
            audit,
            notifier,
            directory,
        }
    }

    /// Create a PENDING request and tell every admin about it.
    ///
    /// Dates are provisional; approval restamps them.
    pub async fn request(
        &self,
        user_id: i64,
        package_id: i64,
    ) -> ModerationResult<Moderated<Subscription>> {
        let package = self
            .repo
            .get_package(package_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("package {} not found", package_id)))?;

        let now = Utc::now();
        let end = validity_end(now, package.duration_days)?;
        let subscription = match self.repo.create_pending(user_id, package_id, now, end).await? {
            PendingInsert::Created(subscription) => subscription,
            PendingInsert::Duplicate => {
                return Err(ModerationError::Conflict(format!(
                    "A pending request for package '{}' already exists",
                    package.name
                )))
            }
        };

        let template = Notification::new(
            OwnerRef::User(user_id),
            NotificationType::SubscriptionRequest,
            "New subscription request",
            format!(
                "{} requested the '{}' package. Please approve or reject it.",
                self.subscriber_label(user_id).await,
                package.name
            ),
        )
        .related_to(EntityType::Subscription, subscription.id);
        let notification = self
            .notifier
            .notify_role(UserRole::Admin, template)
            .await
            .map(|_| ());
        notification.log_unapplied("Notification", "subscription", subscription.id);

        tracing::info!(
            "User {} requested package {} (subscription {})",
            user_id,
            package_id,
            subscription.id
        );
        Ok(Moderated {
            resource: subscription,
            audit: SideEffect::Skipped("requests are not admin actions".to_string()),
            notification,
        })
    }

    /// Approve a PENDING request for `package.duration_days` from now,
    /// cancelling the user's current approval.
    pub async fn approve(
        &self,
        id: i64,
        admin: &AdminContext,
    ) -> ModerationResult<Moderated<Subscription>> {
        let current = self.get(id).await?;
        require_pending(&current, "approve")?;
        let package = self
            .repo
            .get_package(current.package_id)
            .await?
            .ok_or_else(|| {
                ModerationError::NotFound(format!("package {} not found", current.package_id))
            })?;

        let now = Utc::now();
        let end = validity_end(now, package.duration_days)?;
        let (subscription, superseded) = match self.repo.approve_exclusive(id, now, end, now).await? {
            ApproveOutcome::Approved {
                subscription,
                superseded,
            } => (subscription, superseded),
            ApproveOutcome::NotFound => {
                return Err(ModerationError::not_found(EntityType::Subscription, id))
            }
            ApproveOutcome::NotPending(status) => {
                return Err(ModerationError::Conflict(format!(
                    "Subscription {} is {}, not PENDING",
                    id, status
                )))
            }
            ApproveOutcome::Contended => {
                return Err(ModerationError::Conflict(format!(
                    "Another subscription of user {} was approved concurrently",
                    current.user_id
                )))
            }
        };
        if !superseded.is_empty() {
            tracing::info!(
                "Approval of subscription {} cancelled {:?} for user {}",
                id,
                superseded,
                subscription.user_id
            );
        }

        let description = format!(
            "Admin approved subscription: {} ({} to {})",
            subscription.snapshot_name(),
            format_date(subscription.start_date),
            format_date(subscription.end_date)
        );
        let message = format!(
            "Your subscription to '{}' has been approved. Valid from {} to {}.",
            subscription.package_name,
            format_date(subscription.start_date),
            format_date(subscription.end_date)
        );
        Ok(self
            .conclude(
                subscription,
                admin,
                ActionType::Approve,
                description,
                NotificationType::SubscriptionApproved,
                ("Subscription approved", message),
            )
            .await)
    }

    pub async fn reject(
        &self,
        id: i64,
        admin: &AdminContext,
    ) -> ModerationResult<Moderated<Subscription>> {
        let current = self.get(id).await?;
        require_pending(&current, "reject")?;

        let changed = self
            .repo
            .transition(
                id,
                &[SubscriptionStatus::Pending],
                SubscriptionStatus::Rejected,
                None,
                Utc::now(),
            )
            .await?;
        if !changed {
            return Err(ModerationError::Conflict(format!(
                "Subscription {} changed concurrently",
                id
            )));
        }
        let subscription = self.get(id).await?;

        let description = format!("Admin rejected subscription: {}", subscription.snapshot_name());
        let message = format!(
            "Your subscription request for '{}' has been rejected.",
            subscription.package_name
        );
        Ok(self
            .conclude(
                subscription,
                admin,
                ActionType::Reject,
                description,
                NotificationType::SubscriptionRejected,
                ("Subscription rejected", message),
            )
            .await)
    }

    /// Subscriber-initiated cancel of a PENDING or APPROVED subscription
    pub async fn cancel(&self, id: i64, user_id: i64) -> ModerationResult<Moderated<Subscription>> {
        let current = self.get(id).await?;
        if current.user_id != user_id {
            return Err(ModerationError::Authorization(
                "Only the subscriber can cancel a subscription".to_string(),
            ));
        }
        if matches!(
            current.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Rejected
        ) {
            return Err(ModerationError::Conflict(format!(
                "Subscription {} is already {}",
                id, current.status
            )));
        }

        let now = Utc::now();
        let changed = self
            .repo
            .transition(
                id,
                &[SubscriptionStatus::Pending, SubscriptionStatus::Approved],
                SubscriptionStatus::Cancelled,
                Some(now),
                now,
            )
            .await?;
        if !changed {
            return Err(ModerationError::Conflict(format!(
                "Subscription {} changed concurrently",
                id
            )));
        }
        let subscription = self.get(id).await?;

        let notification = self
            .notifier
            .notify(
                Notification::new(
                    OwnerRef::User(user_id),
                    NotificationType::SubscriptionCancelled,
                    "Subscription cancelled",
                    format!(
                        "Your subscription to '{}' has been cancelled.",
                        subscription.package_name
                    ),
                )
                .related_to(EntityType::Subscription, id),
            )
            .await;
        notification.log_unapplied("Notification", "subscription", id);

        tracing::info!("User {} cancelled subscription {}", user_id, id);
        Ok(Moderated {
            resource: subscription,
            audit: SideEffect::Skipped("cancellation is not an admin action".to_string()),
            notification,
        })
    }

    pub async fn get(&self, id: i64) -> ModerationResult<Subscription> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ModerationError::not_found(EntityType::Subscription, id))
    }

    /// The approved subscription that is in force now, if any
    pub async fn current(&self, user_id: i64) -> ModerationResult<Option<Subscription>> {
        Ok(self.repo.find_current(user_id, Utc::now()).await?)
    }

    pub async fn list_mine(&self, user_id: i64) -> ModerationResult<Vec<Subscription>> {
        Ok(self.repo.list_by_user(user_id).await?)
    }

    pub async fn list_pending(
        &self,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<Subscription>> {
        self.page(Some(SubscriptionStatus::Pending), params).await
    }

    pub async fn list_approved(
        &self,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<Subscription>> {
        self.page(Some(SubscriptionStatus::Approved), params).await
    }

    /// Every subscription, newest first
    pub async fn list_history(
        &self,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<Subscription>> {
        self.page(None, params).await
    }

    async fn page(
        &self,
        status: Option<SubscriptionStatus>,
        params: &ListParams,
    ) -> ModerationResult<PagedResult<Subscription>> {
        let (items, total) = self.repo.list(status, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// "Full Name (email)" from the directory, or "User #id" when the
    /// lookup misses
    async fn subscriber_label(&self, user_id: i64) -> String {
        match self.directory.get_user_by_id(user_id).await {
            Ok(Some(user)) => format!("{} ({})", user.display_name(), user.email),
            Ok(None) => {
                tracing::warn!("Subscriber {} not found in the directory", user_id);
                format!("User #{}", user_id)
            }
            Err(e) => {
                tracing::warn!("Failed to look up subscriber {}: {:#}", user_id, e);
                format!("User #{}", user_id)
            }
        }
    }

    async fn conclude(
        &self,
        subscription: Subscription,
        admin: &AdminContext,
        action: ActionType,
        description: String,
        kind: NotificationType,
        (title, message): (&str, String),
    ) -> Moderated<Subscription> {
        let id = subscription.id;
        let audit = self
            .audit
            .record(NewAuditLogEntry::new(
                admin,
                action,
                EntityType::Subscription,
                id,
                Some(subscription.snapshot_name()),
                description,
            ))
            .await;
        audit.log_unapplied("Audit log", "subscription", id);

        let notification = self
            .notifier
            .notify(
                Notification::new(OwnerRef::User(subscription.user_id), kind, title, message)
                    .related_to(EntityType::Subscription, id),
            )
            .await;
        notification.log_unapplied("Notification", "subscription", id);

        tracing::info!("Admin {} applied {} to subscription {}", admin.admin_id, action, id);
        Moderated {
            resource: subscription,
            audit,
            notification,
        }
    }
}

fn require_pending(subscription: &Subscription, action: &str) -> ModerationResult<()> {
    if subscription.status != SubscriptionStatus::Pending {
        return Err(ModerationError::Conflict(format!(
            "Cannot {} subscription {}: it is {}, not PENDING",
            action, subscription.id, subscription.status
        )));
    }
    Ok(())
}

/// End of a validity window of `days` starting at `start`
fn validity_end(start: DateTime<Utc>, days: i64) -> ModerationResult<DateTime<Utc>> {
    TimeDelta::try_days(days)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or_else(|| {
            ModerationError::Validation(format!(
                "Package duration of {} days is out of range",
                days
            ))
        })
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}
