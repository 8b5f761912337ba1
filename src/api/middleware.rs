//! API middleware
//!
//! Contains middleware for:
//! - Authentication (bearer token validated by the directory)
//! - Authorization (admin guard)
//!
//! plus the shared application state and the JSON error type.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::db::repositories::{
    SqlxArticleRepository, SqlxAuditLogRepository, SqlxCascadeRepository, SqlxJobRepository,
    SqlxSubscriptionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AuditLogService, CascadeCoordinator, DirectoryClient, ModerationError, ModerationService,
    NotificationClient, NotificationDispatcher, PackageService, SubscriptionService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub moderation: Arc<ModerationService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub packages: Arc<PackageService>,
    pub audit: Arc<AuditLogService>,
    pub directory: Arc<dyn DirectoryClient>,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(
        pool: DynDatabasePool,
        directory: Arc<dyn DirectoryClient>,
        notifications: Arc<dyn NotificationClient>,
        notification_timeout: Duration,
    ) -> Self {
        let audit = Arc::new(AuditLogService::new(SqlxAuditLogRepository::boxed(
            pool.clone(),
        )));
        let notifier = Arc::new(NotificationDispatcher::new(
            directory.clone(),
            notifications,
            notification_timeout,
        ));
        let cascade = Arc::new(CascadeCoordinator::new(SqlxCascadeRepository::boxed(
            pool.clone(),
        )));
        let moderation = Arc::new(ModerationService::new(
            SqlxJobRepository::boxed(pool.clone()),
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            cascade,
            audit.clone(),
            notifier.clone(),
        ));
        let subscription_repo = SqlxSubscriptionRepository::boxed(pool);
        let subscriptions = Arc::new(SubscriptionService::new(
            subscription_repo.clone(),
            audit.clone(),
            notifier,
            directory.clone(),
        ));
        let packages = Arc::new(PackageService::new(subscription_repo));
        Self {
            moderation,
            subscriptions,
            packages,
            audit,
            directory,
        }
    }
}

/// Authenticated user extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::NotFound(message) => Self::not_found(message),
            ModerationError::Validation(message) => Self::validation_error(message),
            ModerationError::Conflict(message) => Self::conflict(message),
            ModerationError::Authorization(message) => Self::forbidden(message),
            ModerationError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

fn extract_bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer token through the directory and attach the user
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .directory
        .validate_token(&token)
        .await
        .map_err(|e| {
            tracing::warn!("Token validation failed: {:#}", e);
            ApiError::internal_error("Token validation failed")
        })?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Must run after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
