use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'viewer'
                        CHECK (role IN ('viewer', 'user', 'admin')),
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            last_login  TEXT
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            url         TEXT NOT NULL,
            logo_url    TEXT,
            category    TEXT NOT NULL,
            country     TEXT,
            language    TEXT,
            quality     TEXT,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT,
            is_public   INTEGER NOT NULL DEFAULT 0,
            created_by  TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL,
            expiry_date TEXT
        );

        -- One row per slot; the same channel may fill several slots.
        CREATE TABLE IF NOT EXISTS playlist_channels (
            playlist_id TEXT NOT NULL REFERENCES playlists(id),
            position    INTEGER NOT NULL,
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            PRIMARY KEY (playlist_id, position)
        );

        CREATE TABLE IF NOT EXISTS access_codes (
            code         TEXT PRIMARY KEY,
            playlist_id  TEXT NOT NULL REFERENCES playlists(id),
            created_by   TEXT NOT NULL REFERENCES users(id),
            created_at   TEXT NOT NULL,
            expires_at   TEXT,
            max_uses     INTEGER CHECK (max_uses IS NULL OR max_uses > 0),
            current_uses INTEGER NOT NULL DEFAULT 0,
            is_active    INTEGER NOT NULL DEFAULT 1,
            CHECK (max_uses IS NULL OR current_uses <= max_uses)
        );

        CREATE INDEX IF NOT EXISTS idx_access_codes_creator
            ON access_codes(created_by, created_at);

        CREATE INDEX IF NOT EXISTS idx_playlists_creator
            ON playlists(created_by, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
