//! Services layer - Business logic
//!
//! Moderation workflows, subscription approval and the outbound
//! collaborators they notify. Services are responsible for:
//! - Enforcing status transitions and ownership rules
//! - Recording audit entries and notifications after a committed change
//! - Translating repository outcomes into [`ModerationError`]

pub mod audit;
pub mod cascade;
pub mod directory;
pub mod error;
pub mod moderation;
pub mod notification;
pub mod outcome;
pub mod package;
pub mod subscription;
pub mod transition;

pub use audit::AuditLogService;
pub use cascade::CascadeCoordinator;
pub use directory::{create_directory, DirectoryClient, HttpDirectoryClient, LocalDirectory};
pub use error::{ModerationError, ModerationResult};
pub use moderation::{Deleted, ModerationService, ResourceModerator};
pub use notification::{
    create_notification_client, HttpNotificationClient, LogNotificationClient, NotificationClient,
    NotificationDispatcher,
};
pub use outcome::{Moderated, SideEffect};
pub use package::PackageService;
pub use subscription::SubscriptionService;
