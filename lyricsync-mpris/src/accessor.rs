use crate::error::MprisError;
use crate::proxy::PlayerProxy;
use crate::value::map_to_raw;
use async_trait::async_trait;
use lyricsync_core::time::micros_to_secs;
use lyricsync_core::{metadata_from_raw, PlaybackStatus, PlayerAccessor, TrackMetadata};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The player currently followed by the transport, shared with the accessor.
#[derive(Clone, Default)]
pub(crate) struct ActivePlayer(Arc<RwLock<Option<PlayerProxy<'static>>>>);

impl ActivePlayer {
    pub(crate) async fn get(&self) -> Option<PlayerProxy<'static>> {
        self.0.read().await.clone()
    }

    pub(crate) async fn name(&self) -> Option<String> {
        self.0
            .read()
            .await
            .as_ref()
            .map(|proxy| proxy.inner().destination().to_string())
    }

    pub(crate) async fn set(&self, proxy: Option<PlayerProxy<'static>>) {
        *self.0.write().await = proxy;
    }
}

/// Reads playback state from the followed MPRIS player.
///
/// Properties are fetched with a fresh `Get` call each time. With no player
/// selected every read returns the neutral value.
#[derive(Clone)]
pub struct MprisAccessor {
    active: ActivePlayer,
}

impl MprisAccessor {
    pub(crate) const fn new(active: ActivePlayer) -> Self {
        Self { active }
    }

    /// Bus name of the followed player, if any
    pub async fn player_name(&self) -> Option<String> {
        self.active.name().await
    }
}

#[async_trait]
impl PlayerAccessor for MprisAccessor {
    async fn playback_status(&self) -> lyricsync_core::Result<PlaybackStatus> {
        let Some(player) = self.active.get().await else {
            return Ok(PlaybackStatus::Stopped);
        };
        let status = player.playback_status().await.map_err(MprisError::from)?;
        Ok(status
            .parse::<PlaybackStatus>()
            .map_err(MprisError::InvalidValue)?)
    }

    async fn position(&self) -> lyricsync_core::Result<f64> {
        let Some(player) = self.active.get().await else {
            return Ok(0.0);
        };
        let micros = player.position().await.map_err(MprisError::from)?;
        Ok(micros_to_secs(micros).max(0.0))
    }

    async fn rate(&self) -> lyricsync_core::Result<f64> {
        let Some(player) = self.active.get().await else {
            return Ok(1.0);
        };
        let rate = player.rate().await.map_err(MprisError::from)?;
        Ok(if rate.is_finite() && rate > 0.0 { rate } else { 1.0 })
    }

    async fn metadata(&self) -> lyricsync_core::Result<TrackMetadata> {
        let Some(player) = self.active.get().await else {
            return Ok(TrackMetadata::default());
        };
        let metadata = player.metadata().await.map_err(MprisError::from)?;
        Ok(metadata_from_raw(&map_to_raw(&metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_neutral_values_without_player() {
        let accessor = MprisAccessor::new(ActivePlayer::default());
        assert_eq!(
            accessor.playback_status().await.unwrap(),
            PlaybackStatus::Stopped
        );
        assert!(accessor.position().await.unwrap().abs() < f64::EPSILON);
        assert!((accessor.rate().await.unwrap() - 1.0).abs() < f64::EPSILON);
        assert!(accessor.metadata().await.unwrap().is_empty());
        assert_eq!(accessor.player_name().await, None);
    }
}
