//! Subscription endpoints
//!
//! Subscribers request, inspect and cancel their own subscriptions; admins
//! approve or reject requests and browse the lists.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::common::{parse_body, Admin, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{PagedResult, Subscription};
use crate::services::Moderated;

/// Routes for any authenticated user
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(request_subscription))
        .route("/mine", get(list_mine))
        .route("/current", get(current))
        .route("/{id}/cancel", post(cancel))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/approved", get(list_approved))
        .route("/history", get(list_history))
        .route("/{id}/approve", post(approve))
        .route("/{id}/reject", post(reject))
}

#[derive(Debug, Deserialize)]
struct RequestSubscriptionInput {
    package_id: i64,
}

#[derive(Serialize)]
struct SubscriptionsResponse {
    subscriptions: Vec<Subscription>,
}

#[derive(Serialize)]
struct CurrentResponse {
    subscription: Option<Subscription>,
}

async fn request_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: RequestSubscriptionInput = parse_body(&body)?;
    let outcome = state
        .subscriptions
        .request(user.id, input.package_id)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list_mine(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SubscriptionsResponse>, ApiError> {
    let subscriptions = state.subscriptions.list_mine(user.id).await?;
    Ok(Json(SubscriptionsResponse { subscriptions }))
}

async fn current(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<CurrentResponse>, ApiError> {
    let subscription = state.subscriptions.current(user.id).await?;
    Ok(Json(CurrentResponse { subscription }))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Moderated<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.cancel(id, user.id).await?))
}

async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.list_pending(&query.params()).await?))
}

async fn list_approved(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.list_approved(&query.params()).await?))
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.list_history(&query.params()).await?))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<Json<Moderated<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.approve(id, &admin).await?))
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<Json<Moderated<Subscription>>, ApiError> {
    Ok(Json(state.subscriptions.reject(id, &admin).await?))
}
