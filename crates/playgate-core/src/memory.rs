//! In-process collaborators, used by tests and single-node setups that do not
//! need durability.
//!
//! Access codes get one mutex per code, so redemptions of different codes never
//! contend while redemptions of the same code are serialized.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use playgate_types::models::{AccessCode, Channel, Playlist, Role, User};

use crate::error::{Error, Result};
use crate::store::{AccessCodeStore, ChannelStore, PlaylistStore, UserRecord, UserStore};

fn poisoned(what: &str) -> Error {
    Error::Storage(anyhow!("{} lock poisoned", what))
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut User)) -> Result<Option<User>> {
        let mut users = self.users.write().map_err(|_| poisoned("user"))?;
        Ok(users.get_mut(&id).map(|record| {
            f(&mut record.user);
            record.user.clone()
        }))
    }
}

impl UserStore for MemoryUserStore {
    fn insert_user(&self, record: &UserRecord) -> Result<bool> {
        let mut users = self.users.write().map_err(|_| poisoned("user"))?;
        if users
            .values()
            .any(|r| r.user.username == record.user.username)
        {
            return Ok(false);
        }
        users.insert(record.user.id, record.clone());
        Ok(true)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned("user"))?;
        Ok(users
            .values()
            .find(|r| r.user.username == username)
            .cloned())
    }

    fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| poisoned("user"))?;
        Ok(users.get(&id).map(|r| r.user.clone()))
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(|_| poisoned("user"))?;
        let mut list: Vec<User> = users.values().map(|r| r.user.clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        Ok(list)
    }

    fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        self.modify(id, |user| user.role = role)
    }

    fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<User>> {
        self.modify(id, |user| user.is_active = is_active)
    }

    fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.modify(id, |user| user.last_login = Some(at))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCodeStore {
    codes: RwLock<HashMap<String, Arc<Mutex<AccessCode>>>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, code: &str) -> Result<Option<Arc<Mutex<AccessCode>>>> {
        let codes = self.codes.read().map_err(|_| poisoned("code table"))?;
        Ok(codes.get(code).cloned())
    }
}

impl AccessCodeStore for MemoryCodeStore {
    fn insert_if_absent(&self, code: &AccessCode) -> Result<bool> {
        let mut codes = self.codes.write().map_err(|_| poisoned("code table"))?;
        if codes.contains_key(&code.code) {
            return Ok(false);
        }
        codes.insert(code.code.clone(), Arc::new(Mutex::new(code.clone())));
        Ok(true)
    }

    fn code(&self, code: &str) -> Result<Option<AccessCode>> {
        match self.slot(code)? {
            Some(slot) => {
                let record = slot.lock().map_err(|_| poisoned("code"))?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn codes(&self, created_by: Option<Uuid>) -> Result<Vec<AccessCode>> {
        let slots: Vec<Arc<Mutex<AccessCode>>> = {
            let codes = self.codes.read().map_err(|_| poisoned("code table"))?;
            codes.values().cloned().collect()
        };

        let mut list = Vec::with_capacity(slots.len());
        for slot in slots {
            let record = slot.lock().map_err(|_| poisoned("code"))?;
            if created_by.is_none_or(|owner| record.created_by == owner) {
                list.push(record.clone());
            }
        }
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.code.cmp(&b.code)));
        Ok(list)
    }

    fn update(
        &self,
        code: &str,
        apply: &mut dyn FnMut(&mut AccessCode) -> Result<bool>,
    ) -> Result<AccessCode> {
        let slot = self.slot(code)?.ok_or(Error::CodeNotFound)?;
        let mut record = slot.lock().map_err(|_| poisoned("code"))?;

        let mut draft = record.clone();
        if apply(&mut draft)? {
            *record = draft;
        }
        Ok(record.clone())
    }
}

/// Playlist and channel catalog held in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    playlists: RwLock<HashMap<Uuid, Playlist>>,
    channels: RwLock<HashMap<Uuid, Channel>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_playlist(&self, playlist: Playlist) -> Result<()> {
        let mut playlists = self.playlists.write().map_err(|_| poisoned("playlist"))?;
        playlists.insert(playlist.id, playlist);
        Ok(())
    }

    pub fn put_channel(&self, channel: Channel) -> Result<()> {
        let mut channels = self.channels.write().map_err(|_| poisoned("channel"))?;
        channels.insert(channel.id, channel);
        Ok(())
    }
}

impl PlaylistStore for MemoryCatalog {
    fn playlist(&self, id: Uuid) -> Result<Option<Playlist>> {
        let playlists = self.playlists.read().map_err(|_| poisoned("playlist"))?;
        Ok(playlists.get(&id).cloned())
    }
}

impl ChannelStore for MemoryCatalog {
    fn channels(&self, ids: &[Uuid]) -> Result<Vec<Channel>> {
        let channels = self.channels.read().map_err(|_| poisoned("channel"))?;
        Ok(ids.iter().filter_map(|id| channels.get(id).cloned()).collect())
    }
}
