use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::codes::AccessCodeRegistry;
use crate::error::{Error, Result};
use crate::render::{self, ManifestFormat, Rendered};
use crate::store::{ChannelStore, PlaylistStore};

/// Turns a redeemable code into rendered playlist content.
pub struct PlaylistResolver {
    registry: Arc<AccessCodeRegistry>,
    playlists: Arc<dyn PlaylistStore>,
    channels: Arc<dyn ChannelStore>,
    clock: Arc<dyn Clock>,
}

impl PlaylistResolver {
    pub fn new(
        registry: Arc<AccessCodeRegistry>,
        playlists: Arc<dyn PlaylistStore>,
        channels: Arc<dyn ChannelStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            playlists,
            channels,
            clock,
        }
    }

    /// Redeems `code`, then renders its playlist.
    ///
    /// The use is consumed before the playlist is looked at, so a playlist
    /// that expired on its own still costs the caller one use.
    pub fn resolve(&self, code: &str, format: ManifestFormat) -> Result<Rendered> {
        let redemption = self.registry.redeem(code)?;

        let playlist = match self.playlists.playlist(redemption.playlist_id)? {
            Some(playlist) => playlist,
            None => {
                warn!(
                    "Code redeemed for playlist {} which no longer exists",
                    redemption.playlist_id
                );
                return Err(Error::InvalidPlaylist);
            }
        };

        if playlist.is_expired_at(self.clock.now()) {
            return Err(Error::PlaylistExpired);
        }

        let channels = self.channels.channels(&playlist.channels)?;
        let rendered = render::render(format, &playlist, &channels);

        debug!(
            "Resolved playlist {} as {:?} ({} slots)",
            playlist.id,
            format,
            playlist.channels.len()
        );
        Ok(rendered)
    }
}
