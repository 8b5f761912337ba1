//! Notification types
//!
//! A `Notification` addresses its recipient by an [`OwnerRef`], which may be a
//! profile id owned by another service. The dispatcher resolves it to an
//! account id and sends the resulting [`NotificationEnvelope`].

use serde::{Deserialize, Serialize};

use super::{ActionType, EntityType};

/// Reference to the account that owns a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    User(i64),
    RecruiterProfile(i64),
    StudentProfile(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    JobApproved,
    JobRejected,
    JobHidden,
    JobUnhidden,
    JobDeleted,
    ArticleApproved,
    ArticleRejected,
    ArticleHidden,
    ArticleUnhidden,
    ArticleDeleted,
    SubscriptionRequest,
    SubscriptionApproved,
    SubscriptionRejected,
    SubscriptionCancelled,
}

impl NotificationType {
    /// Notification sent to a resource owner after a moderation action.
    pub fn for_moderation(entity: EntityType, action: ActionType) -> Option<Self> {
        use ActionType::*;
        let kind = match (entity, action) {
            (EntityType::Job, Approve) => Self::JobApproved,
            (EntityType::Job, Reject) => Self::JobRejected,
            (EntityType::Job, Hide) => Self::JobHidden,
            (EntityType::Job, Unhide) => Self::JobUnhidden,
            (EntityType::Job, Delete) => Self::JobDeleted,
            (EntityType::Article, Approve) => Self::ArticleApproved,
            (EntityType::Article, Reject) => Self::ArticleRejected,
            (EntityType::Article, Hide) => Self::ArticleHidden,
            (EntityType::Article, Unhide) => Self::ArticleUnhidden,
            (EntityType::Article, Delete) => Self::ArticleDeleted,
            _ => return None,
        };
        Some(kind)
    }
}

/// A notification whose recipient may still need resolving
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: OwnerRef,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<EntityType>,
}

impl Notification {
    pub fn new(
        recipient: OwnerRef,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            notification_type,
            title: title.into(),
            message: message.into(),
            related_entity_id: None,
            related_entity_type: None,
        }
    }

    pub fn related_to(mut self, entity_type: EntityType, entity_id: i64) -> Self {
        self.related_entity_type = Some(entity_type);
        self.related_entity_id = Some(entity_id);
        self
    }

    /// Address the notification to a concrete account.
    pub fn into_envelope(self, recipient_user_id: i64) -> NotificationEnvelope {
        NotificationEnvelope {
            recipient_user_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            related_entity_id: self.related_entity_id,
            related_entity_type: self.related_entity_type,
        }
    }
}

/// Payload accepted by the notification collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEnvelope {
    #[serde(rename = "userId")]
    pub recipient_user_id: i64,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<EntityType>,
}
