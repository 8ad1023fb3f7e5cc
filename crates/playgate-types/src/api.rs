use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccessCode, ChannelCategory, CodeStatus, Role, User};

// -- JWT Claims --

/// JWT claims shared by the token issuer (playgate-core) and the bearer
/// middleware (playgate-api). `role` is a snapshot taken when the token was
/// issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user_id: Uuid,
    pub role: Role,
}

/// Stored profile plus the role the presented token was issued with.
/// Authorization always follows `token_role`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    #[serde(flatten)]
    pub user: User,
    pub token_role: Role,
    pub token_expires_at: DateTime<Utc>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_users: u64,
    pub total_channels: u64,
    pub total_playlists: u64,
    pub total_access_codes: u64,
}

// -- Catalog --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub category: ChannelCategory,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    pub category: Option<ChannelCategory>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePlaylistRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channels: Vec<Uuid>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub expiry_hours: Option<i64>,
}

// -- Access codes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateCodeRequest {
    pub playlist_id: Uuid,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub expiry_hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessCodeResponse {
    #[serde(flatten)]
    pub code: AccessCode,
    pub status: CodeStatus,
    pub uses_remaining: Option<u32>,
}

impl AccessCodeResponse {
    pub fn at(code: AccessCode, now: DateTime<Utc>) -> Self {
        Self {
            status: code.status_at(now),
            uses_remaining: code.uses_remaining(),
            code,
        }
    }
}

// -- Manifests --

/// Structured rendering of a redeemed playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistManifest {
    pub playlist_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub channel_count: usize,
    pub channels: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub position: usize,
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub category: ChannelCategory,
    pub country: Option<String>,
    pub language: Option<String>,
    pub quality: Option<String>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
