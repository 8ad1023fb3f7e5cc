use chrono::{DateTime, Utc};
use uuid::Uuid;

use playgate_types::models::Role;

use crate::error::{Error, Result};

/// Operations gated by role. Each capability names the least privileged role
/// allowed to perform it; higher roles inherit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BrowseCatalog,
    CreateChannel,
    CreatePlaylist,
    GenerateCode,
    RevokeCode,
    ListCodes,
    DeleteChannel,
    ManageUsers,
    RegisterElevated,
    ViewStats,
    /// Act on playlists and codes owned by someone else.
    ManageAnyResource,
}

impl Capability {
    pub fn min_role(self) -> Role {
        match self {
            Capability::BrowseCatalog => Role::Viewer,
            Capability::CreateChannel
            | Capability::CreatePlaylist
            | Capability::GenerateCode
            | Capability::RevokeCode
            | Capability::ListCodes => Role::User,
            Capability::DeleteChannel
            | Capability::ManageUsers
            | Capability::RegisterElevated
            | Capability::ViewStats
            | Capability::ManageAnyResource => Role::Admin,
        }
    }

    pub fn allowed_for(self, role: Role) -> bool {
        role >= self.min_role()
    }
}

/// The authenticated caller of one request, as proven by a validated token.
///
/// Built only by [`crate::TokenIssuer::validate`] (or by tests); the role is
/// whatever the token carried, never re-read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn can(&self, capability: Capability) -> bool {
        capability.allowed_for(self.role)
    }

    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(Error::InsufficientRole)
        }
    }

    /// Owner of a resource, or someone allowed to manage anyone's.
    pub fn owns_or_manages(&self, owner: Uuid) -> bool {
        self.user_id == owner || self.can(Capability::ManageAnyResource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        let now = Utc::now();
        Principal {
            user_id: Uuid::new_v4(),
            username: "someone".into(),
            role,
            issued_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn higher_roles_inherit_capabilities() {
        assert!(principal(Role::Admin).can(Capability::GenerateCode));
        assert!(principal(Role::User).can(Capability::GenerateCode));
        assert!(!principal(Role::Viewer).can(Capability::GenerateCode));
        assert!(principal(Role::Viewer).can(Capability::BrowseCatalog));
    }

    #[test]
    fn admin_only_capabilities() {
        for cap in [
            Capability::DeleteChannel,
            Capability::ManageUsers,
            Capability::RegisterElevated,
            Capability::ViewStats,
        ] {
            assert!(principal(Role::Admin).require(cap).is_ok());
            assert!(matches!(
                principal(Role::User).require(cap),
                Err(Error::InsufficientRole)
            ));
        }
    }

    #[test]
    fn ownership_check() {
        let user = principal(Role::User);
        assert!(user.owns_or_manages(user.user_id));
        assert!(!user.owns_or_manages(Uuid::new_v4()));
        assert!(principal(Role::Admin).owns_or_manages(Uuid::new_v4()));
    }
}
