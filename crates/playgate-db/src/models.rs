/// Database row types. These map directly to SQLite rows.
/// Distinct from playgate-types models to keep the DB layer independent;
/// conversion (and validation of stored text) happens in the `TryFrom` impls.
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use playgate_types::models::{AccessCode, Channel, Playlist, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub category: String,
    pub country: Option<String>,
    pub language: Option<String>,
    pub quality: Option<String>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: String,
}

pub struct PlaylistRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_by: String,
    pub created_at: String,
    pub expiry_date: Option<String>,
}

pub struct AccessCodeRow {
    pub code: String,
    pub playlist_id: String,
    pub created_by: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub max_uses: Option<i64>,
    pub current_uses: i64,
    pub is_active: bool,
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

fn parse_opt_ts(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

fn count(raw: i64, what: &str) -> Result<u32> {
    u32::try_from(raw).map_err(|_| anyhow!("Corrupt {} value {}", what, raw))
}

impl UserRow {
    /// Splits into the public user and the stored password hash.
    pub fn into_parts(self) -> Result<(User, String)> {
        let user = User {
            id: parse_id(&self.id)?,
            role: self
                .role
                .parse()
                .with_context(|| format!("Corrupt role on user '{}'", self.id))?,
            username: self.username,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
            last_login: parse_opt_ts(self.last_login.as_deref())?,
        };
        Ok((user, self.password))
    }
}

impl TryFrom<ChannelRow> for Channel {
    type Error = anyhow::Error;

    fn try_from(row: ChannelRow) -> Result<Self> {
        Ok(Channel {
            id: parse_id(&row.id)?,
            category: row
                .category
                .parse()
                .with_context(|| format!("Corrupt category on channel '{}'", row.id))?,
            created_by: parse_id(&row.created_by)?,
            created_at: parse_ts(&row.created_at)?,
            name: row.name,
            url: row.url,
            logo_url: row.logo_url,
            country: row.country,
            language: row.language,
            quality: row.quality,
            is_active: row.is_active,
        })
    }
}

impl PlaylistRow {
    pub fn into_playlist(self, channels: Vec<Uuid>) -> Result<Playlist> {
        Ok(Playlist {
            id: parse_id(&self.id)?,
            created_by: parse_id(&self.created_by)?,
            created_at: parse_ts(&self.created_at)?,
            expiry_date: parse_opt_ts(self.expiry_date.as_deref())?,
            name: self.name,
            description: self.description,
            channels,
            is_public: self.is_public,
        })
    }
}

impl TryFrom<AccessCodeRow> for AccessCode {
    type Error = anyhow::Error;

    fn try_from(row: AccessCodeRow) -> Result<Self> {
        Ok(AccessCode {
            playlist_id: parse_id(&row.playlist_id)?,
            created_by: parse_id(&row.created_by)?,
            created_at: parse_ts(&row.created_at)?,
            expires_at: parse_opt_ts(row.expires_at.as_deref())?,
            max_uses: row.max_uses.map(|n| count(n, "max_uses")).transpose()?,
            current_uses: count(row.current_uses, "current_uses")?,
            is_active: row.is_active,
            code: row.code,
        })
    }
}
