use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use tracing::warn;

use playgate_api::ServiceConfig;

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
    /// `None` when set to 0: codes never expire unless the request says so.
    pub code_expiry_hours: Option<i64>,
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = match get("PLAYGATE_JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("PLAYGATE_JWT_SECRET is not set; using the development secret");
                DEV_SECRET.into()
            }
        };

        let token_ttl_hours: i64 = parse_or(&get, "PLAYGATE_TOKEN_TTL_HOURS", 24)?;
        if token_ttl_hours <= 0 {
            bail!("PLAYGATE_TOKEN_TTL_HOURS must be positive");
        }
        let code_expiry_hours: i64 = parse_or(&get, "PLAYGATE_CODE_EXPIRY_HOURS", 24)?;
        if code_expiry_hours < 0 {
            bail!("PLAYGATE_CODE_EXPIRY_HOURS must not be negative");
        }

        let admin = match (get("PLAYGATE_ADMIN_USERNAME"), get("PLAYGATE_ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            _ => {
                warn!("Admin bootstrap needs both PLAYGATE_ADMIN_USERNAME and PLAYGATE_ADMIN_PASSWORD");
                None
            }
        };

        Ok(Self {
            jwt_secret,
            db_path: get("PLAYGATE_DB_PATH")
                .unwrap_or_else(|| "playgate.db".into())
                .into(),
            host: get("PLAYGATE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PLAYGATE_PORT", 3000)?,
            token_ttl_hours,
            code_expiry_hours: (code_expiry_hours > 0).then_some(code_expiry_hours),
            admin,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn service(&self) -> ServiceConfig {
        let mut service = ServiceConfig::new(self.jwt_secret.clone());
        service.token_ttl = Duration::hours(self.token_ttl_hours);
        service.default_code_expiry_hours = self.code_expiry_hours;
        service
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
