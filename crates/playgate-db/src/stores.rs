//! `playgate-core` collaborator traits backed by SQLite.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use playgate_core::Error;
use playgate_core::error::Result;
use playgate_core::store::{AccessCodeStore, ChannelStore, PlaylistStore, UserRecord, UserStore};
use playgate_types::models::{AccessCode, Channel, Playlist, Role, User};

use crate::Database;

fn into_user(row: crate::models::UserRow) -> Result<User> {
    Ok(row.into_parts()?.0)
}

impl UserStore for Database {
    fn insert_user(&self, record: &UserRecord) -> Result<bool> {
        Ok(Database::insert_user(self, &record.user, &record.password_hash)?)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        match self.get_user_by_username(username)? {
            Some(row) => {
                let (user, password_hash) = row.into_parts()?;
                Ok(Some(UserRecord {
                    user,
                    password_hash,
                }))
            }
            None => Ok(None),
        }
    }

    fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.get_user_by_id(id)?.map(into_user).transpose()
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Database::list_users(self)?
            .into_iter()
            .map(into_user)
            .collect()
    }

    fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        self.update_user_role(id, role)?.map(into_user).transpose()
    }

    fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>> {
        self.update_user_active(id, is_active)?
            .map(into_user)
            .transpose()
    }

    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        Ok(self.update_last_login(id, at)?)
    }
}

impl AccessCodeStore for Database {
    fn insert_if_absent(&self, code: &AccessCode) -> Result<bool> {
        Ok(self.insert_access_code(code)?)
    }

    fn code(&self, code: &str) -> Result<Option<AccessCode>> {
        Ok(self
            .get_access_code(code)?
            .map(AccessCode::try_from)
            .transpose()?)
    }

    fn codes(&self, created_by: Option<Uuid>) -> Result<Vec<AccessCode>> {
        Ok(self
            .list_access_codes(created_by)?
            .into_iter()
            .map(AccessCode::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    fn update(
        &self,
        code: &str,
        apply: &mut dyn FnMut(&mut AccessCode) -> Result<bool>,
    ) -> Result<AccessCode> {
        let outcome = self.modify_access_code(code, |mut record| {
            let persist = apply(&mut record)?;
            Ok::<_, Error>(persist.then_some(record))
        })?;
        outcome.ok_or(Error::CodeNotFound)?
    }
}

impl PlaylistStore for Database {
    fn playlist(&self, id: Uuid) -> Result<Option<Playlist>> {
        Ok(self.get_playlist(id)?)
    }
}

impl ChannelStore for Database {
    fn channels(&self, ids: &[Uuid]) -> Result<Vec<Channel>> {
        Ok(self
            .get_channels(ids)?
            .into_iter()
            .map(Channel::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?)
    }
}
