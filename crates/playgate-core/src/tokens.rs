use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use playgate_types::api::Claims;
use playgate_types::models::User;

use crate::authz::Principal;
use crate::clock::Clock;
use crate::error::{Error, Result};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Mints and checks HS256 bearer tokens.
///
/// Validation is a pure function of the signature and the clock: nothing is
/// looked up, so the role in a token stays whatever it was at issuance.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock below.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken> {
        // Claims carry whole seconds; keep the returned instants in step.
        let now = self.clock.now();
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Storage(anyhow::anyhow!("Token signing failed: {}", e)))?;

        debug!("Issued token for {} as {}", user.username, user.role);
        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    pub fn validate(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| Error::TokenInvalidSignature)?;
        let claims = data.claims;

        let issued_at =
            DateTime::from_timestamp(claims.iat, 0).ok_or(Error::TokenInvalidSignature)?;
        let expires_at =
            DateTime::from_timestamp(claims.exp, 0).ok_or(Error::TokenInvalidSignature)?;

        if self.clock.now() > expires_at {
            return Err(Error::TokenExpired);
        }

        Ok(Principal {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use playgate_types::models::Role;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "viewer".into(),
            role,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn issuer(secret: &[u8], clock: Arc<ManualClock>) -> TokenIssuer {
        TokenIssuer::new(secret, Duration::hours(DEFAULT_TOKEN_TTL_HOURS), clock)
    }

    #[test]
    fn issued_token_validates_with_embedded_role() {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(b"secret", clock);
        let user = user(Role::User);

        let issued = issuer.issue(&user).unwrap();
        assert_eq!(issued.expires_in(), 24 * 3600);

        let principal = issuer.validate(&issued.token).unwrap();
        assert_eq!(principal.user_id, user.id);
        assert_eq!(principal.role, Role::User);
        assert_eq!(principal.expires_at, issued.expires_at);
    }

    #[test]
    fn token_expires_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let issuer = TokenIssuer::new(b"secret", Duration::hours(1), clock.clone());
        let issued = issuer.issue(&user(Role::Viewer)).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(issuer.validate(&issued.token).is_ok());

        clock.advance(Duration::minutes(2));
        assert!(matches!(
            issuer.validate(&issued.token),
            Err(Error::TokenExpired)
        ));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let clock = Arc::new(ManualClock::default());
        let ours = issuer(b"secret", clock.clone());
        let theirs = issuer(b"other-secret", clock);

        let forged = theirs.issue(&user(Role::Admin)).unwrap();
        assert!(matches!(
            ours.validate(&forged.token),
            Err(Error::TokenInvalidSignature)
        ));
        assert!(matches!(
            ours.validate("not-a-token"),
            Err(Error::TokenInvalidSignature)
        ));
    }

    #[test]
    fn role_is_a_snapshot_taken_at_issuance() {
        let clock = Arc::new(ManualClock::default());
        let issuer = issuer(b"secret", clock);
        let mut user = user(Role::Viewer);

        let before = issuer.issue(&user).unwrap();
        user.role = Role::Admin;

        assert_eq!(issuer.validate(&before.token).unwrap().role, Role::Viewer);
        let after = issuer.issue(&user).unwrap();
        assert_eq!(issuer.validate(&after.token).unwrap().role, Role::Admin);
    }
}
