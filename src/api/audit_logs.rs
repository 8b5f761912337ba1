//! Audit log endpoints (admin only)

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{AuditLogEntry, EntityType, PagedResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all))
        .route("/admin/{admin_id}", get(list_by_admin))
        .route("/entity/{entity_type}/{entity_id}", get(list_by_entity))
}

async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<AuditLogEntry>>, ApiError> {
    Ok(Json(state.audit.list(&query.params()).await?))
}

async fn list_by_admin(
    State(state): State<AppState>,
    Path(admin_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<AuditLogEntry>>, ApiError> {
    Ok(Json(
        state.audit.list_by_admin(admin_id, &query.params()).await?,
    ))
}

async fn list_by_entity(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, i64)>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<AuditLogEntry>>, ApiError> {
    let entity: EntityType = entity_type
        .parse()
        .map_err(|e: anyhow::Error| ApiError::validation_error(e.to_string()))?;
    Ok(Json(
        state
            .audit
            .list_by_entity(entity, entity_id, &query.params())
            .await?,
    ))
}
