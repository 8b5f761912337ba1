//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Admin moderation of jobs, articles and accounts
//! - Admin subscription approval and listings
//! - Package catalogue (admin writes, authenticated reads)
//! - Audit log browsing
//! - Subscription requests for any authenticated user

pub mod audit_logs;
pub mod common;
pub mod middleware;
pub mod moderation;
pub mod packages;
pub mod subscriptions;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::{Article, Job};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin/jobs", moderation::router::<Job>())
        .nest("/admin/articles", moderation::router::<Article>())
        .nest("/admin/users", moderation::user_router())
        .nest("/admin/subscriptions", subscriptions::admin_router())
        .nest("/admin/packages", packages::admin_router())
        .nest("/admin/audit-logs", audit_logs::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/subscriptions", subscriptions::router())
        .nest("/packages", packages::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    Router::new().merge(admin_routes).merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!("Invalid CORS origin {:?}, falling back to localhost", cors_origin);
        HeaderValue::from_static("http://localhost:3000")
    });
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
