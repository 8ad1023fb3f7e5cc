use std::sync::{Arc, OnceLock};

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::{info, warn};
use uuid::Uuid;

use playgate_types::models::{Role, User};

use crate::authz::{Capability, Principal};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::store::{UserRecord, UserStore};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 8;

/// Salted password storage and login verification.
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    hasher: Argon2<'static>,
    /// Hash checked against when the username is unknown, so that path costs
    /// the same as a wrong password.
    decoy: OnceLock<String>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_params(users, clock, Params::default())
    }

    /// Argon2id with explicit cost parameters.
    pub fn with_params(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>, params: Params) -> Self {
        Self {
            users,
            clock,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: OnceLock::new(),
        }
    }

    /// Creates an account. Anything above `viewer` must be granted by a
    /// caller whose token carries the admin role.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        role: Option<Role>,
        caller: Option<&Principal>,
    ) -> Result<User> {
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(Error::InvalidInput(
                "username must be 3 to 32 characters".into(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::InvalidInput(
                "password must be at least 8 characters".into(),
            ));
        }

        let role = role.unwrap_or_default();
        if role > Role::Viewer {
            match caller {
                Some(caller) => caller.require(Capability::RegisterElevated)?,
                None => return Err(Error::InsufficientRole),
            }
        }

        let password_hash = self.hash(password)?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
            is_active: true,
            created_at: self.clock.now(),
            last_login: None,
        };

        let record = UserRecord {
            user: user.clone(),
            password_hash,
        };
        if !self.users.insert_user(&record)? {
            return Err(Error::DuplicateUsername);
        }

        info!("Registered {} ({}) as {}", user.username, user.id, user.role);
        Ok(user)
    }

    /// Checks a username/password pair. Unknown users, wrong passwords and
    /// deactivated accounts all fail the same way after the same hashing work.
    pub fn verify(&self, username: &str, password: &str) -> Result<User> {
        let record = self.users.user_by_username(username)?;

        let stored_hash = match &record {
            Some(record) => record.password_hash.as_str(),
            None => self.decoy_hash(),
        };
        let password_ok = self.check(password, stored_hash);

        match record {
            Some(record) if password_ok && record.user.is_active => {
                let now = self.clock.now();
                self.users.record_login(record.user.id, now)?;
                Ok(User {
                    last_login: Some(now),
                    ..record.user
                })
            }
            _ => Err(Error::InvalidCredentials),
        }
    }

    /// Seeds an admin account if the username is still free. Used at startup.
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<Option<User>> {
        if self.users.user_by_username(username)?.is_some() {
            return Ok(None);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role: Role::Admin,
            is_active: true,
            created_at: self.clock.now(),
            last_login: None,
        };
        let record = UserRecord {
            user: user.clone(),
            password_hash: self.hash(password)?,
        };
        if !self.users.insert_user(&record)? {
            return Ok(None);
        }

        info!("Bootstrapped admin account {}", user.username);
        Ok(Some(user))
    }

    pub fn user(&self, id: Uuid) -> Result<Option<User>> {
        self.users.user_by_id(id)
    }

    pub fn list_users(&self, actor: &Principal) -> Result<Vec<User>> {
        actor.require(Capability::ManageUsers)?;
        self.users.list_users()
    }

    /// Changes a stored role. Tokens already issued keep the role they were
    /// issued with until they expire.
    pub fn set_role(&self, actor: &Principal, user_id: Uuid, role: Role) -> Result<User> {
        actor.require(Capability::ManageUsers)?;
        let user = self
            .users
            .set_role(user_id, role)?
            .ok_or(Error::UserNotFound)?;
        info!("{} changed role of {} to {}", actor.username, user.username, role);
        Ok(user)
    }

    pub fn set_active(&self, actor: &Principal, user_id: Uuid, is_active: bool) -> Result<User> {
        actor.require(Capability::ManageUsers)?;
        let user = self
            .users
            .set_active(user_id, is_active)?
            .ok_or(Error::UserNotFound)?;
        info!(
            "{} {} account {}",
            actor.username,
            if is_active { "activated" } else { "deactivated" },
            user.username
        );
        Ok(user)
    }

    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Storage(anyhow::anyhow!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn check(&self, password: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self
                .hasher
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Unparseable password hash in store: {}", e);
                false
            }
        }
    }

    fn decoy_hash(&self) -> &str {
        self.decoy.get_or_init(|| {
            self.hash("decoy-password-never-matches")
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryUserStore;
    use chrono::Utc;

    fn store() -> CredentialStore {
        CredentialStore::with_params(
            Arc::new(MemoryUserStore::new()),
            Arc::new(ManualClock::default()),
            Params::new(8 * 1024, 1, 1, None).unwrap(),
        )
    }

    fn admin() -> Principal {
        let now = Utc::now();
        Principal {
            user_id: Uuid::new_v4(),
            username: "root".into(),
            role: Role::Admin,
            issued_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn register_defaults_to_viewer_and_hides_plaintext() {
        let users = Arc::new(MemoryUserStore::new());
        let creds = CredentialStore::with_params(
            users.clone(),
            Arc::new(ManualClock::default()),
            Params::new(8 * 1024, 1, 1, None).unwrap(),
        );

        let user = creds.register("alice", "correct horse", None, None).unwrap();
        assert_eq!(user.role, Role::Viewer);

        let record = users.user_by_username("alice").unwrap().unwrap();
        assert!(record.password_hash.starts_with("$argon2id$"));
        assert!(!record.password_hash.contains("correct horse"));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let creds = store();
        creds.register("alice", "password1", None, None).unwrap();
        assert!(matches!(
            creds.register("alice", "password2", None, None),
            Err(Error::DuplicateUsername)
        ));
    }

    #[test]
    fn elevated_registration_needs_an_admin_caller() {
        let creds = store();
        assert!(matches!(
            creds.register("bob", "password1", Some(Role::User), None),
            Err(Error::InsufficientRole)
        ));

        let mut not_admin = admin();
        not_admin.role = Role::User;
        assert!(matches!(
            creds.register("bob", "password1", Some(Role::Admin), Some(&not_admin)),
            Err(Error::InsufficientRole)
        ));

        let user = creds
            .register("bob", "password1", Some(Role::User), Some(&admin()))
            .unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn verify_failures_are_indistinguishable() {
        let creds = store();
        creds.register("carol", "password1", None, None).unwrap();

        let unknown = creds.verify("nobody", "password1").unwrap_err();
        let wrong = creds.verify("carol", "password2").unwrap_err();
        assert!(matches!(unknown, Error::InvalidCredentials));
        assert!(matches!(wrong, Error::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn verify_records_last_login() {
        let creds = store();
        creds.register("dave", "password1", None, None).unwrap();
        let user = creds.verify("dave", "password1").unwrap();
        assert!(user.last_login.is_some());
        assert_eq!(creds.user(user.id).unwrap().unwrap().last_login, user.last_login);
    }

    #[test]
    fn deactivated_account_cannot_log_in() {
        let creds = store();
        let user = creds.register("erin", "password1", None, None).unwrap();
        creds.set_active(&admin(), user.id, false).unwrap();
        assert!(matches!(
            creds.verify("erin", "password1"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn input_validation() {
        let creds = store();
        assert!(matches!(
            creds.register("ab", "password1", None, None),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            creds.register("frank", "short", None, None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let creds = store();
        let first = creds.ensure_admin("admin", "admin-password").unwrap();
        assert_eq!(first.unwrap().role, Role::Admin);
        assert!(creds.ensure_admin("admin", "admin-password").unwrap().is_none());
        assert_eq!(creds.verify("admin", "admin-password").unwrap().role, Role::Admin);
    }
}
