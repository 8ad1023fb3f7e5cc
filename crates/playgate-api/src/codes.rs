use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use playgate_core::{GenerateCode, Principal};
use playgate_types::api::{AccessCodeResponse, GenerateCodeRequest};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn generate_code(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<GenerateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = GenerateCode {
        playlist_id: req.playlist_id,
        max_uses: req.max_uses,
        expiry_hours: req.expiry_hours.or(state.default_code_expiry_hours),
    };

    let response = run_blocking(&state, move |s| {
        let code = s.codes.generate(&principal, request)?;
        Ok(AccessCodeResponse::at(code, s.codes.now()))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_codes(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<AccessCodeResponse>>, ApiError> {
    let codes = run_blocking(&state, move |s| {
        let now = s.codes.now();
        Ok(s.codes
            .list(&principal)?
            .into_iter()
            .map(|code| AccessCodeResponse::at(code, now))
            .collect())
    })
    .await?;

    Ok(Json(codes))
}

pub async fn revoke_code(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
) -> Result<Json<AccessCodeResponse>, ApiError> {
    let response = run_blocking(&state, move |s| {
        let code = s.codes.revoke(&principal, &code)?;
        Ok(AccessCodeResponse::at(code, s.codes.now()))
    })
    .await?;

    Ok(Json(response))
}
