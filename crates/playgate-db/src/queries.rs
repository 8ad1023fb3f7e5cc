use crate::Database;
use crate::models::{AccessCodeRow, ChannelRow, PlaylistRow, UserRow, format_ts, parse_id};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, TransactionBehavior};
use uuid::Uuid;

use playgate_types::api::SystemStats;
use playgate_types::models::{AccessCode, Channel, ChannelCategory, Playlist, Role, User};

const USER_COLUMNS: &str = "id, username, password, role, is_active, created_at, last_login";
const CHANNEL_COLUMNS: &str = "id, name, url, logo_url, category, country, language, quality, is_active, created_by, created_at";
const PLAYLIST_COLUMNS: &str = "id, name, description, is_public, created_by, created_at, expiry_date";
const CODE_COLUMNS: &str = "code, playlist_id, created_by, created_at, expires_at, max_uses, current_uses, is_active";

impl Database {
    // -- Users --

    /// Returns false when the username is already taken.
    pub fn insert_user(&self, user: &User, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, password, role, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id.to_string(),
                    user.username,
                    password_hash,
                    user.role.as_str(),
                    user.is_active,
                    format_ts(user.created_at),
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            conn.query_row(&sql, [username], user_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users ORDER BY created_at, username",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user_role(&self, id: Uuid, role: Role) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET role = ?2 WHERE id = ?1",
                (id.to_string(), role.as_str()),
            )?;
            query_user_by_id(conn, id)
        })
    }

    pub fn update_user_active(&self, id: Uuid, is_active: bool) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_active = ?2 WHERE id = ?1",
                (id.to_string(), is_active),
            )?;
            query_user_by_id(conn, id)
        })
    }

    pub fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = ?2 WHERE id = ?1",
                (id.to_string(), format_ts(at)),
            )?;
            Ok(())
        })
    }

    // -- Channels --

    pub fn insert_channel(&self, channel: &Channel) -> Result<()> {
        self.with_conn(|conn| insert_channel_row(conn, channel))
    }

    /// Inserts every channel or none of them.
    pub fn insert_channels(&self, channels: &[Channel]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for channel in channels {
                insert_channel_row(&tx, channel)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Active channels, optionally narrowed by category and country.
    pub fn list_channels(
        &self,
        category: Option<ChannelCategory>,
        country: Option<&str>,
    ) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM channels
                 WHERE is_active = 1
                   AND (?1 IS NULL OR category = ?1)
                   AND (?2 IS NULL OR country = ?2)
                 ORDER BY created_at, name",
                CHANNEL_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![category.map(|c| c.as_str()), country],
                    channel_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch channels by id, active or not. Order is unspecified.
    pub fn get_channels(&self, ids: &[Uuid]) -> Result<Vec<ChannelRow>> {
        let mut unique: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=unique.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM channels WHERE id IN ({})",
                CHANNEL_COLUMNS,
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = unique
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), channel_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Soft delete: playlists keep their slots, rendering skips the channel.
    pub fn deactivate_channel(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE channels SET is_active = 0 WHERE id = ?1 AND is_active = 1",
                [id.to_string()],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Playlists --

    pub fn insert_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO playlists (id, name, description, is_public, created_by, created_at, expiry_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    playlist.id.to_string(),
                    playlist.name,
                    playlist.description,
                    playlist.is_public,
                    playlist.created_by.to_string(),
                    format_ts(playlist.created_at),
                    playlist.expiry_date.map(format_ts),
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO playlist_channels (playlist_id, position, channel_id) VALUES (?1, ?2, ?3)",
                )?;
                for (position, channel_id) in playlist.channels.iter().enumerate() {
                    stmt.execute(rusqlite::params![
                        playlist.id.to_string(),
                        position as i64,
                        channel_id.to_string(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_playlist(&self, id: Uuid) -> Result<Option<Playlist>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS);
            let Some(row) = conn
                .query_row(&sql, [id.to_string()], playlist_row)
                .optional()?
            else {
                return Ok(None);
            };
            let channels = query_playlist_slots(conn, &row.id)?;
            Ok(Some(row.into_playlist(channels)?))
        })
    }

    /// Playlists created by `created_by`, or all of them when `None`.
    pub fn list_playlists(&self, created_by: Option<Uuid>) -> Result<Vec<Playlist>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM playlists
                 WHERE (?1 IS NULL OR created_by = ?1)
                 ORDER BY created_at, name",
                PLAYLIST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([created_by.map(|id| id.to_string())], playlist_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|row| {
                    let channels = query_playlist_slots(conn, &row.id)?;
                    row.into_playlist(channels)
                })
                .collect()
        })
    }

    // -- Access codes --

    /// Returns false when the code string is already in use.
    pub fn insert_access_code(&self, code: &AccessCode) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO access_codes (code, playlist_id, created_by, created_at, expires_at, max_uses, current_uses, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    code.code,
                    code.playlist_id.to_string(),
                    code.created_by.to_string(),
                    format_ts(code.created_at),
                    code.expires_at.map(format_ts),
                    code.max_uses,
                    code.current_uses,
                    code.is_active,
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_access_code(&self, code: &str) -> Result<Option<AccessCodeRow>> {
        self.with_conn(|conn| query_access_code(conn, code))
    }

    pub fn list_access_codes(&self, created_by: Option<Uuid>) -> Result<Vec<AccessCodeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM access_codes
                 WHERE (?1 IS NULL OR created_by = ?1)
                 ORDER BY created_at, code",
                CODE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([created_by.map(|id| id.to_string())], access_code_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Read-modify-write of one access code inside an IMMEDIATE transaction,
    /// so no other writer (in this process or another) can interleave.
    ///
    /// `apply` returns `Ok(Some(record))` to persist `record`, `Ok(None)` to
    /// leave the row alone. Returns `None` when the code does not exist,
    /// otherwise the closure's verdict together with the row as it stands.
    pub fn modify_access_code<E>(
        &self,
        code: &str,
        apply: impl FnOnce(AccessCode) -> std::result::Result<Option<AccessCode>, E>,
    ) -> Result<Option<std::result::Result<AccessCode, E>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(row) = query_access_code(&tx, code)? else {
                return Ok(None);
            };
            let current = AccessCode::try_from(row)?;

            let verdict = match apply(current.clone()) {
                Ok(Some(updated)) => {
                    tx.execute(
                        "UPDATE access_codes SET current_uses = ?2, is_active = ?3 WHERE code = ?1",
                        rusqlite::params![updated.code, updated.current_uses, updated.is_active],
                    )?;
                    tx.commit()?;
                    Ok(updated)
                }
                Ok(None) => Ok(current),
                Err(e) => Err(e),
            };
            Ok(Some(verdict))
        })
    }

    // -- Stats --

    pub fn stats(&self) -> Result<SystemStats> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n.max(0) as u64)
            };
            Ok(SystemStats {
                total_users: count("SELECT COUNT(*) FROM users")?,
                total_channels: count("SELECT COUNT(*) FROM channels WHERE is_active = 1")?,
                total_playlists: count("SELECT COUNT(*) FROM playlists")?,
                total_access_codes: count("SELECT COUNT(*) FROM access_codes WHERE is_active = 1")?,
            })
        })
    }
}

fn insert_channel_row(conn: &Connection, channel: &Channel) -> Result<()> {
    conn.execute(
        "INSERT INTO channels (id, name, url, logo_url, category, country, language, quality, is_active, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            channel.id.to_string(),
            channel.name,
            channel.url,
            channel.logo_url,
            channel.category.as_str(),
            channel.country,
            channel.language,
            channel.quality,
            channel.is_active,
            channel.created_by.to_string(),
            format_ts(channel.created_at),
        ],
    )?;
    Ok(())
}

fn user_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        last_login: row.get(6)?,
    })
}

fn channel_row(row: &Row) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        logo_url: row.get(3)?,
        category: row.get(4)?,
        country: row.get(5)?,
        language: row.get(6)?,
        quality: row.get(7)?,
        is_active: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn playlist_row(row: &Row) -> rusqlite::Result<PlaylistRow> {
    Ok(PlaylistRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_public: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        expiry_date: row.get(6)?,
    })
}

fn access_code_row(row: &Row) -> rusqlite::Result<AccessCodeRow> {
    Ok(AccessCodeRow {
        code: row.get(0)?,
        playlist_id: row.get(1)?,
        created_by: row.get(2)?,
        created_at: row.get(3)?,
        expires_at: row.get(4)?,
        max_uses: row.get(5)?,
        current_uses: row.get(6)?,
        is_active: row.get(7)?,
    })
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id.to_string()], user_row).optional()
}

fn query_access_code(conn: &Connection, code: &str) -> Result<Option<AccessCodeRow>> {
    let sql = format!("SELECT {} FROM access_codes WHERE code = ?1", CODE_COLUMNS);
    conn.query_row(&sql, [code], access_code_row).optional()
}

fn query_playlist_slots(conn: &Connection, playlist_id: &str) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id FROM playlist_channels WHERE playlist_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map([playlist_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    ids.iter().map(|id| parse_id(id)).collect()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
