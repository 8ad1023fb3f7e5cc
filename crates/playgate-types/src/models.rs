use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Privilege levels, ordered from least to most privileged.
///
/// The derived `Ord` follows declaration order, so `Viewer < User < Admin`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Public view of an account. The password hash never leaves the credential
/// store, so it has no place here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelCategory {
    Sports,
    News,
    Movies,
    Series,
    Kids,
    Music,
    Documentary,
    General,
}

impl ChannelCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelCategory::Sports => "sports",
            ChannelCategory::News => "news",
            ChannelCategory::Movies => "movies",
            ChannelCategory::Series => "series",
            ChannelCategory::Kids => "kids",
            ChannelCategory::Music => "music",
            ChannelCategory::Documentary => "documentary",
            ChannelCategory::General => "general",
        }
    }
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sports" => Ok(ChannelCategory::Sports),
            "news" => Ok(ChannelCategory::News),
            "movies" => Ok(ChannelCategory::Movies),
            "series" => Ok(ChannelCategory::Series),
            "kids" => Ok(ChannelCategory::Kids),
            "music" => Ok(ChannelCategory::Music),
            "documentary" => Ok(ChannelCategory::Documentary),
            "general" => Ok(ChannelCategory::General),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub category: ChannelCategory,
    pub country: Option<String>,
    pub language: Option<String>,
    pub quality: Option<String>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An ordered collection of channel references.
/// `channels` keeps insertion order and may repeat an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub channels: Vec<Uuid>,
    pub is_public: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Playlist {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| now > expiry)
    }
}

/// Redeemable grant on a single playlist.
///
/// `current_uses <= max_uses` holds whenever `max_uses` is set; only the
/// registry's redemption path increments `current_uses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    pub code: String,
    pub playlist_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub is_active: bool,
}

/// Where an access code sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Active,
    Revoked,
    Expired,
    Exhausted,
}

impl AccessCode {
    /// Status at `now`, using the same precedence redemption reports
    /// failures in: revoked, then expired, then exhausted.
    pub fn status_at(&self, now: DateTime<Utc>) -> CodeStatus {
        if !self.is_active {
            CodeStatus::Revoked
        } else if self.expires_at.is_some_and(|expiry| now > expiry) {
            CodeStatus::Expired
        } else if self.max_uses.is_some_and(|cap| self.current_uses >= cap) {
            CodeStatus::Exhausted
        } else {
            CodeStatus::Active
        }
    }

    pub fn uses_remaining(&self) -> Option<u32> {
        self.max_uses
            .map(|cap| cap.saturating_sub(self.current_uses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn code(now: DateTime<Utc>) -> AccessCode {
        AccessCode {
            code: "abc".into(),
            playlist_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            created_at: now,
            expires_at: Some(now + Duration::hours(1)),
            max_uses: Some(2),
            current_uses: 0,
            is_active: true,
        }
    }

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Viewer < Role::User);
        assert!(Role::User < Role::Admin);
        assert_eq!(Role::default(), Role::Viewer);
    }

    #[test]
    fn role_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn revoked_wins_over_expired_and_exhausted() {
        let now = Utc::now();
        let mut c = code(now);
        c.is_active = false;
        c.current_uses = 2;
        assert_eq!(c.status_at(now + Duration::hours(2)), CodeStatus::Revoked);

        c.is_active = true;
        assert_eq!(c.status_at(now + Duration::hours(2)), CodeStatus::Expired);
        assert_eq!(c.status_at(now), CodeStatus::Exhausted);
    }

    #[test]
    fn uncapped_code_has_no_remaining_count() {
        let now = Utc::now();
        let mut c = code(now);
        c.max_uses = None;
        c.current_uses = 500;
        assert_eq!(c.uses_remaining(), None);
        assert_eq!(c.status_at(now), CodeStatus::Active);
    }
}
