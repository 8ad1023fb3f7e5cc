//! Manifest rendering. Output depends only on the playlist and channel
//! records passed in, never on the time of rendering.

use std::collections::HashMap;
use std::fmt::Write as _;

use uuid::Uuid;

use playgate_types::api::{ManifestEntry, PlaylistManifest};
use playgate_types::models::{Channel, Playlist};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    M3u8,
    Json,
}

impl ManifestFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ManifestFormat::M3u8 => "application/vnd.apple.mpegurl",
            ManifestFormat::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    M3u8(String),
    Json(PlaylistManifest),
}

impl Rendered {
    pub fn format(&self) -> ManifestFormat {
        match self {
            Rendered::M3u8(_) => ManifestFormat::M3u8,
            Rendered::Json(_) => ManifestFormat::Json,
        }
    }

    /// Serialized body, byte-stable for a given input.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Rendered::M3u8(text) => Ok(text.clone().into_bytes()),
            Rendered::Json(manifest) => serde_json::to_vec(manifest)
                .map_err(|e| Error::Storage(anyhow::anyhow!("Manifest encoding failed: {}", e))),
        }
    }
}

/// Pairs each playlist slot with its channel, keeping playlist order and
/// repeats. Slots whose channel is missing or inactive are dropped.
pub fn entries(playlist: &Playlist, channels: &[Channel]) -> Vec<ManifestEntry> {
    let by_id: HashMap<Uuid, &Channel> = channels
        .iter()
        .filter(|c| c.is_active)
        .map(|c| (c.id, c))
        .collect();

    playlist
        .channels
        .iter()
        .filter_map(|id| by_id.get(id))
        .enumerate()
        .map(|(position, channel)| ManifestEntry {
            position: position + 1,
            id: channel.id,
            name: channel.name.clone(),
            url: channel.url.clone(),
            logo_url: channel.logo_url.clone(),
            category: channel.category,
            country: channel.country.clone(),
            language: channel.language.clone(),
            quality: channel.quality.clone(),
        })
        .collect()
}

pub fn render(format: ManifestFormat, playlist: &Playlist, channels: &[Channel]) -> Rendered {
    let entries = entries(playlist, channels);
    match format {
        ManifestFormat::M3u8 => Rendered::M3u8(m3u8(playlist, &entries)),
        ManifestFormat::Json => Rendered::Json(PlaylistManifest {
            playlist_id: playlist.id,
            name: playlist.name.clone(),
            description: playlist.description.clone(),
            expires_at: playlist.expiry_date,
            channel_count: entries.len(),
            channels: entries,
        }),
    }
}

fn m3u8(playlist: &Playlist, entries: &[ManifestEntry]) -> String {
    let mut out = String::from("#EXTM3U\n");
    let _ = writeln!(out, "#PLAYLIST:{}", single_line(&playlist.name));

    for entry in entries {
        out.push_str("#EXTINF:-1");
        attribute(&mut out, "tvg-id", Some(&entry.id.to_string()));
        attribute(&mut out, "tvg-name", Some(&entry.name));
        attribute(&mut out, "tvg-logo", entry.logo_url.as_deref());
        attribute(&mut out, "tvg-country", entry.country.as_deref());
        attribute(&mut out, "tvg-language", entry.language.as_deref());
        attribute(&mut out, "group-title", Some(entry.category.as_str()));
        let _ = writeln!(out, ",{}", single_line(&entry.name));
        let _ = writeln!(out, "{}", single_line(&entry.url));
    }

    out
}

fn attribute(out: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = write!(out, " {}=\"{}\"", key, single_line(value).replace('"', "'"));
    }
}

/// Line breaks would start a new directive.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}
