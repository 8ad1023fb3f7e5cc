use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Duration;
use tracing::info;
use uuid::Uuid;

use playgate_core::{Capability, Clock, Error, ManifestFormat, Principal, Rendered};
use playgate_types::api::CreatePlaylistRequest;
use playgate_types::models::{Channel, Playlist};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn create_playlist(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreatePlaylistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Capability::CreatePlaylist)?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Playlist name is required"));
    }

    let now = state.clock.now();
    let expiry_date = match req.expiry_hours {
        Some(h) if h <= 0 => return Err(Error::InvalidExpiry.into()),
        Some(h) => Some(
            Duration::try_hours(h)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or(Error::InvalidExpiry)?,
        ),
        None => None,
    };

    let playlist = Playlist {
        id: Uuid::new_v4(),
        name,
        description: req.description,
        channels: req.channels,
        is_public: req.is_public,
        created_by: principal.user_id,
        created_at: now,
        expiry_date,
    };

    let playlist = run_blocking(&state, move |s| {
        let active: HashSet<Uuid> = s
            .db
            .get_channels(&playlist.channels)?
            .into_iter()
            .map(Channel::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?
            .into_iter()
            .filter(|c| c.is_active)
            .map(|c| c.id)
            .collect();
        if let Some(missing) = playlist.channels.iter().find(|id| !active.contains(*id)) {
            return Err(ApiError::validation(format!(
                "Channel {} does not exist or is inactive",
                missing
            )));
        }

        s.db.insert_playlist(&playlist)?;
        Ok(playlist)
    })
    .await?;

    info!(
        "{} created playlist {} with {} slots",
        principal.username,
        playlist.id,
        playlist.channels.len()
    );
    Ok((StatusCode::CREATED, Json(playlist)))
}

/// The caller's playlists; admins see every playlist.
pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Playlist>>, ApiError> {
    principal.require(Capability::BrowseCatalog)?;

    let owner = (!principal.can(Capability::ManageAnyResource)).then_some(principal.user_id);
    let playlists = run_blocking(&state, move |s| Ok(s.db.list_playlists(owner)?)).await?;
    Ok(Json(playlists))
}

pub async fn redeem_m3u8(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    redeem(state, code, ManifestFormat::M3u8).await
}

pub async fn redeem_json(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    redeem(state, code, ManifestFormat::Json).await
}

async fn redeem(state: AppState, code: String, format: ManifestFormat) -> Result<Response, ApiError> {
    let rendered = run_blocking(&state, move |s| Ok(s.resolver.resolve(&code, format)?)).await?;

    Ok(match rendered {
        Rendered::M3u8(text) => {
            ([(header::CONTENT_TYPE, format.content_type())], text).into_response()
        }
        Rendered::Json(manifest) => Json(manifest).into_response(),
    })
}
