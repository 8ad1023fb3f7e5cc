use axum::{Extension, Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};

use playgate_core::{Error, Principal};
use playgate_types::api::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, WhoAmIResponse,
};
use playgate_types::models::Role;

use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::state::{AppState, run_blocking};

/// Open to anyone for viewer accounts. Asking for a higher role needs an
/// admin bearer token on the same request.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // A stale token must not block plain viewer sign-up.
    let elevated = req.role.is_some_and(|role| role > Role::Viewer);
    let caller = match bearer_token(&headers) {
        Some(token) if elevated => Some(state.tokens.validate(token)?),
        _ => None,
    };

    let user = run_blocking(&state, move |s| {
        Ok(s.credentials
            .register(&req.username, &req.password, req.role, caller.as_ref())?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            username: user.username,
            role: user.role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = run_blocking(&state, move |s| {
        Ok(s.credentials.verify(&req.username, &req.password)?)
    })
    .await?;

    let issued = state.tokens.issue(&user)?;

    Ok(Json(LoginResponse {
        expires_in: issued.expires_in(),
        access_token: issued.token,
        token_type: "bearer".into(),
        user_id: user.id,
        role: user.role,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<WhoAmIResponse>, ApiError> {
    let user_id = principal.user_id;
    let user = run_blocking(&state, move |s| {
        s.credentials.user(user_id)?.ok_or(ApiError::from(Error::UserNotFound))
    })
    .await?;

    Ok(Json(WhoAmIResponse {
        user,
        token_role: principal.role,
        token_expires_at: principal.expires_at,
    }))
}
