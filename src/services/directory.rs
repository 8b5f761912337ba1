//! Directory client
//!
//! Resolves accounts and profiles that may be owned by another service.
//! With no `directory.base_url` configured the local database answers;
//! otherwise lookups go over HTTP with a bounded timeout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DirectoryConfig;
use crate::db::repositories::UserRepository;
use crate::models::{OwnerRef, RecruiterProfile, StudentProfile, User, UserRole};

#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_recruiter_profile_by_id(&self, id: i64) -> Result<Option<RecruiterProfile>>;

    async fn get_student_profile_by_id(&self, id: i64) -> Result<Option<StudentProfile>>;

    async fn get_recruiter_profile_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<RecruiterProfile>>;

    async fn get_recruiter_profiles_by_company_id(
        &self,
        company_id: i64,
    ) -> Result<Vec<RecruiterProfile>>;

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    /// The account a bearer token belongs to, if the token is valid
    async fn validate_token(&self, token: &str) -> Result<Option<User>>;

    /// Account id behind an owner reference. Profile references take one
    /// extra lookup.
    async fn resolve_owner(&self, owner: OwnerRef) -> Result<Option<i64>> {
        let user_id = match owner {
            OwnerRef::User(id) => Some(id),
            OwnerRef::RecruiterProfile(id) => self
                .get_recruiter_profile_by_id(id)
                .await?
                .map(|p| p.user_id),
            OwnerRef::StudentProfile(id) => self
                .get_student_profile_by_id(id)
                .await?
                .map(|p| p.user_id),
        };
        Ok(user_id)
    }
}

/// Build the directory client selected by configuration
pub fn create_directory(
    config: &DirectoryConfig,
    users: Arc<dyn UserRepository>,
) -> Result<Arc<dyn DirectoryClient>> {
    match config.base_url.as_deref() {
        Some(base_url) => Ok(Arc::new(HttpDirectoryClient::new(
            base_url,
            config.timeout(),
        )?)),
        None => Ok(Arc::new(LocalDirectory::new(users))),
    }
}

// ============================================================================
// Local database
// ============================================================================

/// Directory backed by this service's own account tables
pub struct LocalDirectory {
    users: Arc<dyn UserRepository>,
}

impl LocalDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl DirectoryClient for LocalDirectory {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.users.get_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users.get_by_email(email).await
    }

    async fn get_recruiter_profile_by_id(&self, id: i64) -> Result<Option<RecruiterProfile>> {
        self.users.get_recruiter_profile(id).await
    }

    async fn get_student_profile_by_id(&self, id: i64) -> Result<Option<StudentProfile>> {
        self.users.get_student_profile(id).await
    }

    async fn get_recruiter_profile_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<RecruiterProfile>> {
        self.users.get_recruiter_profile_by_user(user_id).await
    }

    async fn get_recruiter_profiles_by_company_id(
        &self,
        company_id: i64,
    ) -> Result<Vec<RecruiterProfile>> {
        self.users.list_recruiter_profiles_by_company(company_id).await
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        self.users.list_by_role(role).await
    }

    async fn validate_token(&self, token: &str) -> Result<Option<User>> {
        self.users.find_by_token(token, chrono::Utc::now()).await
    }
}

// ============================================================================
// Remote HTTP directory
// ============================================================================

/// Directory served by the account service over HTTP
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET returning `None` on 404
    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await.context("Directory request failed")?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .context("Directory returned an error")?;
        let body = response
            .json()
            .await
            .context("Failed to parse directory response")?;
        Ok(Some(body))
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.fetch(self.client.get(self.url(&format!("/users/{}", id))))
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch(
            self.client
                .get(self.url("/users/by-email"))
                .query(&[("email", email)]),
        )
        .await
    }

    async fn get_recruiter_profile_by_id(&self, id: i64) -> Result<Option<RecruiterProfile>> {
        self.fetch(
            self.client
                .get(self.url(&format!("/recruiter-profiles/{}", id))),
        )
        .await
    }

    async fn get_student_profile_by_id(&self, id: i64) -> Result<Option<StudentProfile>> {
        self.fetch(self.client.get(self.url(&format!("/student-profiles/{}", id))))
            .await
    }

    async fn get_recruiter_profile_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<RecruiterProfile>> {
        self.fetch(
            self.client
                .get(self.url(&format!("/recruiter-profiles/by-user/{}", user_id))),
        )
        .await
    }

    async fn get_recruiter_profiles_by_company_id(
        &self,
        company_id: i64,
    ) -> Result<Vec<RecruiterProfile>> {
        let profiles = self
            .fetch(
                self.client
                    .get(self.url("/recruiter-profiles"))
                    .query(&[("company_id", company_id)]),
            )
            .await?;
        Ok(profiles.unwrap_or_default())
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let users = self
            .fetch(
                self.client
                    .get(self.url("/users"))
                    .query(&[("role", role.as_str())]),
            )
            .await?;
        Ok(users.unwrap_or_default())
    }

    async fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let response = self
            .client
            .post(self.url("/auth/validate"))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .context("Directory request failed")?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(None),
            _ => {
                let user = response
                    .error_for_status()
                    .context("Directory returned an error")?
                    .json()
                    .await
                    .context("Failed to parse directory response")?;
                Ok(Some(user))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_recruiter, seed_student, setup};
    use crate::db::repositories::SqlxUserRepository;
    use axum::{
        extract::{Path, Query},
        http::StatusCode as HttpStatus,
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;

    fn remote_user(id: i64, role: UserRole) -> User {
        User {
            id,
            email: format!("user{}@example.com", id),
            full_name: None,
            role,
            created_at: chrono::Utc::now(),
        }
    }

    /// Serve a minimal directory on an ephemeral port
    async fn spawn_directory() -> String {
        let app = Router::new()
            .route(
                "/users/{id}",
                get(|Path(id): Path<i64>| async move {
                    if id == 1 {
                        Ok(Json(remote_user(1, UserRole::Student)))
                    } else {
                        Err(HttpStatus::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/users",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let users = if q.get("role").map(String::as_str) == Some("admin") {
                        vec![remote_user(7, UserRole::Admin), remote_user(8, UserRole::Admin)]
                    } else {
                        Vec::new()
                    };
                    Json(users)
                }),
            )
            .route(
                "/recruiter-profiles/{id}",
                get(|Path(id): Path<i64>| async move {
                    Json(RecruiterProfile {
                        id,
                        user_id: 40 + id,
                        company_id: None,
                        company_name: "Acme".to_string(),
                    })
                }),
            )
            .route(
                "/auth/validate",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["token"] == "good" {
                        Ok(Json(remote_user(7, UserRole::Admin)))
                    } else {
                        Err(HttpStatus::UNAUTHORIZED)
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_local_directory_resolves_profiles() {
        let pool = setup().await;
        let (recruiter_user, recruiter_profile) = seed_recruiter(&pool, "hr@acme.io").await;
        let (student_user, student_profile) = seed_student(&pool, "sam@uni.edu").await;
        let directory = LocalDirectory::new(SqlxUserRepository::boxed(pool));

        assert_eq!(
            directory
                .resolve_owner(OwnerRef::RecruiterProfile(recruiter_profile))
                .await
                .unwrap(),
            Some(recruiter_user)
        );
        assert_eq!(
            directory
                .resolve_owner(OwnerRef::StudentProfile(student_profile))
                .await
                .unwrap(),
            Some(student_user)
        );
        assert_eq!(directory.resolve_owner(OwnerRef::User(5)).await.unwrap(), Some(5));
        assert_eq!(
            directory
                .resolve_owner(OwnerRef::RecruiterProfile(999))
                .await
                .unwrap(),
            None
        );
        let by_user = directory
            .get_recruiter_profile_by_user_id(recruiter_user)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_user.id, recruiter_profile);
    }

    #[tokio::test]
    async fn test_http_directory() {
        let base_url = spawn_directory().await;
        let client = HttpDirectoryClient::new(&base_url, Duration::from_secs(2)).unwrap();

        assert_eq!(client.get_user_by_id(1).await.unwrap().unwrap().id, 1);
        assert!(client.get_user_by_id(2).await.unwrap().is_none());
        assert_eq!(
            client
                .resolve_owner(OwnerRef::RecruiterProfile(3))
                .await
                .unwrap(),
            Some(43)
        );
        assert_eq!(client.list_users_by_role(UserRole::Admin).await.unwrap().len(), 2);
        assert!(client.validate_token("good").await.unwrap().unwrap().is_admin());
        assert!(client.validate_token("bad").await.unwrap().is_none());
        // Route not served by the stub
        assert!(client.get_student_profile_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_directory_unreachable() {
        // Nothing listens on port 9 locally
        let client = HttpDirectoryClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.get_user_by_id(1).await.is_err());
    }
}
