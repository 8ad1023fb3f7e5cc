//! Collaborators the core consults but does not own.
//!
//! Implementations live in `playgate-db` (SQLite) and [`crate::memory`].
//! Store failures travel as [`Error::Storage`](crate::Error::Storage).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use playgate_types::models::{AccessCode, Channel, Playlist, Role, User};

use crate::error::Result;

/// A user together with its PHC-encoded password hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

pub trait UserStore: Send + Sync {
    /// Inserts the record unless its username is taken.
    /// Returns `false` (and writes nothing) when it is.
    fn insert_user(&self, record: &UserRecord) -> Result<bool>;

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    fn list_users(&self) -> Result<Vec<User>>;

    /// Returns the updated user, or `None` if no such user exists.
    fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>>;

    fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>>;

    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

pub trait AccessCodeStore: Send + Sync {
    /// Inserts the code unless one with the same string already exists.
    /// Returns `false` (and writes nothing) on collision.
    fn insert_if_absent(&self, code: &AccessCode) -> Result<bool>;

    fn code(&self, code: &str) -> Result<Option<AccessCode>>;

    /// Codes created by `created_by`, or every code when `None`.
    fn codes(&self, created_by: Option<Uuid>) -> Result<Vec<AccessCode>>;

    /// Runs `apply` against the stored record while holding exclusive access
    /// to that code. If `apply` returns `Ok(true)` the modified record is
    /// persisted before access is released; `Ok(false)` leaves it untouched and
    /// `Err` aborts with nothing written.
    ///
    /// Returns the record as it stands afterwards, or
    /// [`Error::CodeNotFound`](crate::Error::CodeNotFound).
    fn update(
        &self,
        code: &str,
        apply: &mut dyn FnMut(&mut AccessCode) -> Result<bool>,
    ) -> Result<AccessCode>;
}

pub trait PlaylistStore: Send + Sync {
    fn playlist(&self, id: Uuid) -> Result<Option<Playlist>>;
}

pub trait ChannelStore: Send + Sync {
    /// Channels with the given ids, in no particular order. Unknown ids are
    /// skipped.
    fn channels(&self, ids: &[Uuid]) -> Result<Vec<Channel>>;
}
