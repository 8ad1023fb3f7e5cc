use thiserror::Error;

/// Every failure the core reports. All of them are terminal: the core never
/// retries internally, the caller decides what to do next.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Username is already taken")]
    DuplicateUsername,

    /// Same text for unknown user, wrong password and deactivated account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token signature is invalid")]
    TokenInvalidSignature,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Access denied")]
    InsufficientRole,

    #[error("User not found")]
    UserNotFound,

    #[error("Playlist not found")]
    InvalidPlaylist,

    #[error("max_uses must be a positive integer no greater than 4294967295")]
    InvalidUsageCap,

    #[error("expiry_hours must be a positive integer")]
    InvalidExpiry,

    #[error("Access code not found")]
    CodeNotFound,

    #[error("Access code has been revoked")]
    CodeRevoked,

    #[error("Access code has expired")]
    CodeExpired,

    #[error("Access code usage limit reached")]
    CodeExhausted,

    #[error("Playlist has expired")]
    PlaylistExpired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// Stable snake_case identifier, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DuplicateUsername => "duplicate_username",
            Error::InvalidCredentials => "invalid_credentials",
            Error::TokenInvalidSignature => "token_invalid_signature",
            Error::TokenExpired => "token_expired",
            Error::InsufficientRole => "insufficient_role",
            Error::UserNotFound => "user_not_found",
            Error::InvalidPlaylist => "invalid_playlist",
            Error::InvalidUsageCap => "invalid_usage_cap",
            Error::InvalidExpiry => "invalid_expiry",
            Error::CodeNotFound => "code_not_found",
            Error::CodeRevoked => "code_revoked",
            Error::CodeExpired => "code_expired",
            Error::CodeExhausted => "code_exhausted",
            Error::PlaylistExpired => "playlist_expired",
            Error::InvalidInput(_) => "invalid_input",
            Error::Storage(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
