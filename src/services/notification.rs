//! Notification dispatcher
//!
//! Delivery is at-most-once and best-effort. Recipient resolution and the
//! send itself run under one timeout, and every failure comes back as a
//! [`SideEffect`] rather than an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::directory::DirectoryClient;
use super::outcome::SideEffect;
use crate::config::NotificationConfig;
use crate::models::{Notification, NotificationEnvelope, OwnerRef, UserRole};

/// Outbound notification collaborator
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send(&self, envelope: &NotificationEnvelope) -> Result<()>;
}

/// Posts envelopes to `<base_url>/notifications`
pub struct HttpNotificationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotificationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/notifications", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    async fn send(&self, envelope: &NotificationEnvelope) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .await
            .context("Notification request failed")?
            .error_for_status()
            .context("Notification service returned an error")?;
        Ok(())
    }
}

/// Used when no notification service is configured
pub struct LogNotificationClient;

#[async_trait]
impl NotificationClient for LogNotificationClient {
    async fn send(&self, envelope: &NotificationEnvelope) -> Result<()> {
        tracing::info!(
            "Notification {:?} for user {}: {}",
            envelope.notification_type,
            envelope.recipient_user_id,
            envelope.message
        );
        Ok(())
    }
}

pub fn create_notification_client(
    config: &NotificationConfig,
) -> Result<Arc<dyn NotificationClient>> {
    match config.base_url.as_deref() {
        Some(base_url) => Ok(Arc::new(HttpNotificationClient::new(
            base_url,
            config.timeout(),
        )?)),
        None => Ok(Arc::new(LogNotificationClient)),
    }
}

pub struct NotificationDispatcher {
    directory: Arc<dyn DirectoryClient>,
    client: Arc<dyn NotificationClient>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        client: Arc<dyn NotificationClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            directory,
            client,
            timeout,
        }
    }

    /// Resolve the recipient and send. Never fails the caller.
    pub async fn notify(&self, notification: Notification) -> SideEffect<()> {
        let recipient = notification.recipient;
        match tokio::time::timeout(self.timeout, self.deliver(notification)).await {
            Ok(Ok(true)) => SideEffect::Applied(()),
            Ok(Ok(false)) => SideEffect::Skipped(format!("no account found for {:?}", recipient)),
            Ok(Err(e)) => SideEffect::Failed(format!("{:#}", e)),
            Err(_) => SideEffect::Failed(format!("timed out after {:?}", self.timeout)),
        }
    }

    /// Send a copy of `template` to every account with `role`.
    ///
    /// Returns how many were delivered; a partial failure is reported as
    /// `Failed` with the count in the message.
    pub async fn notify_role(&self, role: UserRole, template: Notification) -> SideEffect<usize> {
        match tokio::time::timeout(self.timeout, self.broadcast(role, template)).await {
            Ok(Ok((sent, 0))) => SideEffect::Applied(sent),
            Ok(Ok((sent, failed))) => SideEffect::Failed(format!(
                "{} of {} notifications failed",
                failed,
                sent + failed
            )),
            Ok(Err(e)) => SideEffect::Failed(format!("{:#}", e)),
            Err(_) => SideEffect::Failed(format!("timed out after {:?}", self.timeout)),
        }
    }

    async fn deliver(&self, notification: Notification) -> Result<bool> {
        let Some(user_id) = self
            .directory
            .resolve_owner(notification.recipient)
            .await
            .context("Failed to resolve recipient")?
        else {
            return Ok(false);
        };
        self.client.send(&notification.into_envelope(user_id)).await?;
        Ok(true)
    }

    async fn broadcast(&self, role: UserRole, template: Notification) -> Result<(usize, usize)> {
        let users = self
            .directory
            .list_users_by_role(role)
            .await
            .context("Failed to list recipients")?;

        let (mut sent, mut failed) = (0, 0);
        for user in users {
            let envelope = Notification {
                recipient: OwnerRef::User(user.id),
                ..template.clone()
            }
            .into_envelope(user.id);
            match self.client.send(&envelope).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!("Notification to user {} failed: {:#}", user.id, e);
                    failed += 1;
                }
            }
        }
        Ok((sent, failed))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every envelope; optionally fails or stalls each send
    #[derive(Default)]
    pub struct RecordingClient {
        pub sent: Mutex<Vec<NotificationEnvelope>>,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl RecordingClient {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<NotificationEnvelope> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationClient for RecordingClient {
        async fn send(&self, envelope: &NotificationEnvelope) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                anyhow::bail!("notification service unavailable");
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingClient;
    use super::*;
    use crate::db::repositories::test_support::{seed_recruiter, seed_user, setup};
    use crate::db::repositories::SqlxUserRepository;
    use crate::models::{EntityType, NotificationType};
    use crate::services::directory::LocalDirectory;

    async fn dispatcher(client: Arc<RecordingClient>) -> (NotificationDispatcher, crate::db::DynDatabasePool) {
        let pool = setup().await;
        let directory = Arc::new(LocalDirectory::new(SqlxUserRepository::boxed(pool.clone())));
        (
            NotificationDispatcher::new(directory, client, Duration::from_millis(500)),
            pool,
        )
    }

    fn job_hidden(recipient: OwnerRef) -> Notification {
        Notification::new(
            recipient,
            NotificationType::JobHidden,
            "Job hidden",
            "Your job 'Rust dev' has been hidden. Reason: spam",
        )
        .related_to(EntityType::Job, 12)
    }

    #[tokio::test]
    async fn test_profile_owner_is_resolved_to_account() {
        let client = Arc::new(RecordingClient::default());
        let (dispatcher, pool) = dispatcher(client.clone()).await;
        let (user_id, profile_id) = seed_recruiter(&pool, "hr@acme.io").await;

        let outcome = dispatcher
            .notify(job_hidden(OwnerRef::RecruiterProfile(profile_id)))
            .await;
        assert_eq!(outcome, SideEffect::Applied(()));

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_user_id, user_id);
        assert_eq!(sent[0].related_entity_id, Some(12));
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_skipped() {
        let client = Arc::new(RecordingClient::default());
        let (dispatcher, _pool) = dispatcher(client.clone()).await;
        let outcome = dispatcher
            .notify(job_hidden(OwnerRef::RecruiterProfile(404)))
            .await;
        assert!(matches!(outcome, SideEffect::Skipped(_)));
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_and_timeout_are_reported() {
        let (failing, _pool) = dispatcher(Arc::new(RecordingClient::failing())).await;
        match failing.notify(job_hidden(OwnerRef::User(1))).await {
            SideEffect::Failed(message) => assert!(message.contains("unavailable")),
            other => panic!("unexpected {:?}", other),
        }

        let slow = Arc::new(RecordingClient {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let (slow_dispatcher, _pool) = dispatcher(slow.clone()).await;
        match slow_dispatcher.notify(job_hidden(OwnerRef::User(1))).await {
            SideEffect::Failed(message) => assert!(message.contains("timed out")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(slow.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notify_role_reaches_every_admin() {
        let client = Arc::new(RecordingClient::default());
        let (dispatcher, pool) = dispatcher(client.clone()).await;
        let a = seed_user(&pool, "a@example.com", UserRole::Admin).await;
        let b = seed_user(&pool, "b@example.com", UserRole::Admin).await;
        seed_user(&pool, "s@example.com", UserRole::Student).await;

        let template = Notification::new(
            OwnerRef::User(0),
            NotificationType::SubscriptionRequest,
            "New subscription request",
            "User #3 requested the 'Pro' package.",
        );
        assert_eq!(
            dispatcher.notify_role(UserRole::Admin, template).await,
            SideEffect::Applied(2)
        );
        let mut recipients: Vec<_> = client.sent().iter().map(|e| e.recipient_user_id).collect();
        recipients.sort();
        assert_eq!(recipients, vec![a, b]);
    }
}
