use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use playgate_core::{Capability, Clock, Principal};
use playgate_types::api::{ChannelQuery, CreateChannelRequest};
use playgate_types::models::Channel;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

const DEFAULT_QUALITY: &str = "HD";

/// Validates a request and turns it into a new active channel.
fn build_channel(
    req: CreateChannelRequest,
    owner: Uuid,
    now: DateTime<Utc>,
) -> Result<Channel, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Channel name is required"));
    }
    let url = req.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::validation(format!(
            "Channel url must be http(s): {}",
            url
        )));
    }

    Ok(Channel {
        id: Uuid::new_v4(),
        name: name.to_string(),
        url: url.to_string(),
        logo_url: req.logo_url,
        category: req.category,
        country: req.country,
        language: req.language,
        quality: Some(req.quality.unwrap_or_else(|| DEFAULT_QUALITY.into())),
        is_active: true,
        created_by: owner,
        created_at: now,
    })
}

pub async fn create_channel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Capability::CreateChannel)?;

    let channel = build_channel(req, principal.user_id, state.clock.now())?;
    let channel = run_blocking(&state, move |s| {
        s.db.insert_channel(&channel)?;
        Ok(channel)
    })
    .await?;

    info!("{} added channel {} ({})", principal.username, channel.name, channel.id);
    Ok((StatusCode::CREATED, Json(channel)))
}

/// All entries are validated first and stored in one transaction, so a bad
/// entry leaves the catalog untouched.
pub async fn create_channels_bulk(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(reqs): Json<Vec<CreateChannelRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Capability::CreateChannel)?;

    let now = state.clock.now();
    let channels = reqs
        .into_iter()
        .map(|req| build_channel(req, principal.user_id, now))
        .collect::<Result<Vec<_>, _>>()?;

    let channels = run_blocking(&state, move |s| {
        s.db.insert_channels(&channels)?;
        Ok(channels)
    })
    .await?;

    info!("{} added {} channels in bulk", principal.username, channels.len());
    Ok((StatusCode::CREATED, Json(channels)))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ChannelQuery>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    principal.require(Capability::BrowseCatalog)?;

    let channels = run_blocking(&state, move |s| {
        let rows = s.db.list_channels(query.category, query.country.as_deref())?;
        Ok(rows
            .into_iter()
            .map(Channel::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;

    Ok(Json(channels))
}

/// Soft delete: the channel stays referenced by playlists but is no longer
/// listed or rendered.
pub async fn delete_channel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(channel_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    principal.require(Capability::DeleteChannel)?;

    let removed = run_blocking(&state, move |s| Ok(s.db.deactivate_channel(channel_id)?)).await?;
    if !removed {
        return Err(ApiError::not_found("Channel"));
    }

    info!("{} deactivated channel {}", principal.username, channel_id);
    Ok(StatusCode::NO_CONTENT)
}
