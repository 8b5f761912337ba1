//! Data models
//!
//! Entities, status enums, inputs and the value types exchanged between the
//! repositories, services and the HTTP layer.

mod article;
mod audit_log;
mod comment;
mod job;
mod moderation;
mod notification;
mod pagination;
mod subscription;
mod user;

pub use article::{Article, ArticleStatus, CreateArticleInput};
pub use audit_log::{ActionType, AdminContext, AuditLogEntry, EntityType, NewAuditLogEntry};
pub use comment::{CommentLink, CommentTree};
pub use job::{CreateJobInput, Job, JobStatus};
pub use moderation::{ModeratedResource, ModeratedStatus};
pub use notification::{Notification, NotificationEnvelope, NotificationType, OwnerRef};
pub use pagination::{ListParams, PagedResult};
pub use subscription::{Package, Subscription, SubscriptionStatus};
pub use user::{CreateUserInput, RecruiterProfile, StudentProfile, User, UserRole};
