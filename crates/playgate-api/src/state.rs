use std::sync::Arc;

use argon2::Params;
use chrono::Duration;
use tracing::warn;

use playgate_core::tokens::DEFAULT_TOKEN_TTL_HOURS;
use playgate_core::{
    AccessCodeRegistry, Clock, CredentialStore, PlaylistResolver, SystemClock, TokenIssuer,
};
use playgate_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub credentials: CredentialStore,
    pub tokens: TokenIssuer,
    pub codes: Arc<AccessCodeRegistry>,
    pub resolver: PlaylistResolver,
    pub clock: Arc<dyn Clock>,
    /// Applied when a generate request leaves `expiry_hours` out.
    pub default_code_expiry_hours: Option<i64>,
}

/// Knobs the service needs from the binary's configuration.
#[derive(Clone)]
pub struct ServiceConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub default_code_expiry_hours: Option<i64>,
    pub argon2_params: Params,
}

impl ServiceConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            default_code_expiry_hours: Some(24),
            argon2_params: Params::default(),
        }
    }
}

impl AppStateInner {
    pub fn new(db: Database, config: ServiceConfig) -> AppState {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: ServiceConfig, clock: Arc<dyn Clock>) -> AppState {
        if config.jwt_secret.len() < 32 {
            warn!("JWT secret is shorter than 32 bytes");
        }

        let db = Arc::new(db);
        let credentials =
            CredentialStore::with_params(db.clone(), clock.clone(), config.argon2_params);
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl, clock.clone());
        let codes = Arc::new(AccessCodeRegistry::new(db.clone(), db.clone(), clock.clone()));
        let resolver = PlaylistResolver::new(codes.clone(), db.clone(), db.clone(), clock.clone());

        Arc::new(Self {
            db,
            credentials,
            tokens,
            codes,
            resolver,
            clock,
            default_code_expiry_hours: config.default_code_expiry_hours,
        })
    }
}

/// Runs storage-bound work (SQLite, Argon2) off the async workers.
pub async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
}
