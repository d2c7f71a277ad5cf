//! Shared player state.
//!
//! One [`PlayerState`] record describes what the external media player is
//! doing. It lives behind a single async mutex in [`SharedPlayer`]; every
//! reader takes a snapshot and every writer mutates under the same lock.

use crate::lyrics::LyricsData;
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transport status as reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaybackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Playing" => Ok(Self::Playing),
            "Paused" => Ok(Self::Paused),
            "Stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown playback status: {other}")),
        }
    }
}

/// Stable identity of a song, derived from its descriptive fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackFingerprint(u64);

impl fmt::Display for TrackFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Descriptive metadata for a track, as delivered by the player.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    /// Duration in seconds, zero when unknown.
    pub duration: f64,
}

impl TrackMetadata {
    /// Artists joined the way lyric services expect them.
    #[must_use]
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    #[must_use]
    pub fn fingerprint(&self) -> TrackFingerprint {
        let mut hasher = Sha1::new();
        hasher.update(self.title.as_bytes());
        hasher.update([0]);
        hasher.update(self.artist_line().as_bytes());
        hasher.update([0]);
        hasher.update(self.album.as_bytes());
        hasher.update([0]);
        hasher.update(format!("{:.3}", self.duration).as_bytes());
        let digest = hasher.finalize();
        let value = digest
            .iter()
            .take(8)
            .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte));
        TrackFingerprint(value)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artists.is_empty() && self.album.is_empty()
    }
}

/// The current track together with its lyrics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    pub metadata: TrackMetadata,
    pub lyrics: LyricsData,
}

impl Track {
    #[must_use]
    pub fn new(metadata: TrackMetadata) -> Self {
        Self {
            metadata,
            lyrics: LyricsData::loading(),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> TrackFingerprint {
        self.metadata.fingerprint()
    }
}

/// Everything the engine knows about the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub status: PlaybackStatus,
    pub rate: f64,
    /// Estimated position in seconds.
    pub position: f64,
    pub track: Track,
    /// Bumped whenever `track.lyrics` is replaced.
    pub lyrics_revision: u64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            rate: 1.0,
            position: 0.0,
            track: Track::default(),
            lyrics_revision: 0,
        }
    }
}

impl PlayerState {
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    /// Replace the lyric set and mark the change for observers.
    pub fn install_lyrics(&mut self, lyrics: LyricsData) {
        self.track.lyrics = lyrics;
        self.lyrics_revision = self.lyrics_revision.wrapping_add(1);
    }
}

/// Cloneable handle to the single shared [`PlayerState`].
#[derive(Debug, Clone, Default)]
pub struct SharedPlayer {
    inner: Arc<Mutex<PlayerState>>,
}

impl SharedPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> PlayerState {
        self.inner.lock().await.clone()
    }

    /// Mutate the state under the lock. The closure must not block.
    pub async fn update<R>(&self, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        let mut state = self.inner.lock().await;
        f(&mut state)
    }

    /// Read a projection of the state under the lock.
    pub async fn read<R>(&self, f: impl FnOnce(&PlayerState) -> R) -> R {
        let state = self.inner.lock().await;
        f(&state)
    }
}
