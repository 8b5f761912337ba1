//! Package endpoints
//!
//! Any authenticated user can browse packages; only admins change them.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::common::{parse_body, Admin};
use crate::api::middleware::{ApiError, AppState};
use crate::models::Package;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_packages))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_package))
        .route("/{id}", put(update_package).delete(delete_package))
}

#[derive(Debug, Deserialize)]
struct PackageInput {
    name: String,
    duration_days: i64,
}

#[derive(Serialize)]
struct PackagesResponse {
    packages: Vec<Package>,
}

async fn list_packages(State(state): State<AppState>) -> Result<Json<PackagesResponse>, ApiError> {
    let packages = state.packages.list().await?;
    Ok(Json(PackagesResponse { packages }))
}

async fn create_package(
    State(state): State<AppState>,
    Admin(admin): Admin,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: PackageInput = parse_body(&body)?;
    let package = state
        .packages
        .create(&input.name, input.duration_days)
        .await?;
    tracing::debug!("Package {} created by admin {}", package.id, admin.admin_id);
    Ok((StatusCode::CREATED, Json(package)))
}

async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
    body: Bytes,
) -> Result<Json<Package>, ApiError> {
    let input: PackageInput = parse_body(&body)?;
    let package = state
        .packages
        .update(id, &input.name, input.duration_days)
        .await?;
    tracing::debug!("Package {} updated by admin {}", id, admin.admin_id);
    Ok(Json(package))
}

async fn delete_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Admin(admin): Admin,
) -> Result<StatusCode, ApiError> {
    state.packages.delete(id).await?;
    tracing::debug!("Package {} deleted by admin {}", id, admin.admin_id);
    Ok(StatusCode::NO_CONTENT)
}
