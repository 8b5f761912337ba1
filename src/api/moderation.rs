//! Admin moderation endpoints for jobs, articles and accounts

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};

use super::common::{parse_reason, Admin};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Article, Job, ModeratedResource};
use crate::services::{Deleted, Moderated, ModerationService, ResourceModerator};

/// Picks the moderator for a resource type out of the service
pub trait Moderates: ModeratedResource {
    fn moderator(service: &ModerationService) -> &ResourceModerator<Self>;
}

impl Moderates for Job {
    fn moderator(service: &ModerationService) -> &ResourceModerator<Self> {
        service.jobs()
    }
}

impl Moderates for Article {
    fn moderator(service: &ModerationService) -> &ResourceModerator<Self> {
        service.articles()
    }
}

/// The five moderation routes, for one resource type
pub fn router<R: Moderates>() -> Router<AppState> {
    Router::new()
        .route("/{id}", delete(delete_resource::<R>))
        .route("/{id}/approve", post(approve::<R>))
        .route("/{id}/reject", post(reject::<R>))
        .route("/{id}/hide", post(hide::<R>))
        .route("/{id}/unhide", post(unhide::<R>))
}

pub fn user_router() -> Router<AppState> {
    Router::new().route("/{id}", delete(delete_user))
}

async fn approve<R: Moderates>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<Json<Moderated<R>>, ApiError> {
    let outcome = R::moderator(&state.moderation).approve(id, &admin).await?;
    Ok(Json(outcome))
}

async fn reject<R: Moderates>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<Json<Moderated<R>>, ApiError> {
    let outcome = R::moderator(&state.moderation).reject(id, &admin).await?;
    Ok(Json(outcome))
}

async fn hide<R: Moderates>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
    body: Bytes,
) -> Result<Json<Moderated<R>>, ApiError> {
    let reason = parse_reason(&body)?;
    let outcome = R::moderator(&state.moderation)
        .hide(id, &admin, reason.as_deref())
        .await?;
    Ok(Json(outcome))
}

async fn unhide<R: Moderates>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<Json<Moderated<R>>, ApiError> {
    let outcome = R::moderator(&state.moderation).unhide(id, &admin).await?;
    Ok(Json(outcome))
}

async fn delete_resource<R: Moderates>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
    body: Bytes,
) -> Result<Json<Moderated<Deleted>>, ApiError> {
    let reason = parse_reason(&body)?;
    let outcome = R::moderator(&state.moderation)
        .delete(id, &admin, reason.as_deref())
        .await?;
    Ok(Json(outcome))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
    body: Bytes,
) -> Result<Json<Moderated<Deleted>>, ApiError> {
    let reason = parse_reason(&body)?;
    let outcome = state
        .moderation
        .delete_user(id, &admin, reason.as_deref())
        .await?;
    Ok(Json(outcome))
}
