use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use playgate_core::{Capability, Principal};
use playgate_types::api::{SetActiveRequest, SystemStats, UpdateRoleRequest};
use playgate_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<SystemStats>, ApiError> {
    principal.require(Capability::ViewStats)?;
    let stats = run_blocking(&state, |s| Ok(s.db.stats()?)).await?;
    Ok(Json(stats))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = run_blocking(&state, move |s| Ok(s.credentials.list_users(&principal)?)).await?;
    Ok(Json(users))
}

/// Existing tokens keep the role they were issued with.
pub async fn update_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(&state, move |s| {
        Ok(s.credentials.set_role(&principal, user_id, req.role)?)
    })
    .await?;
    Ok(Json(user))
}

pub async fn set_active(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(&state, move |s| {
        Ok(s.credentials.set_active(&principal, user_id, req.is_active)?)
    })
    .await?;
    Ok(Json(user))
}
