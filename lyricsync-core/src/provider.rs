use crate::error::CoreError;
use crate::lyrics::LyricsData;
use crate::player::TrackMetadata;
use async_trait::async_trait;

/// Query parameters for fetching lyrics
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsQuery {
    /// Track name
    pub track_name: String,
    /// All credited artists, in player order
    pub artists: Vec<String>,
    /// Album name (optional)
    pub album_name: Option<String>,
    /// Track duration in seconds (for matching)
    pub duration_secs: Option<f64>,
}

impl LyricsQuery {
    /// Create a new lyrics query
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artists: vec![artist_name.into()],
            album_name: None,
            duration_secs: None,
        }
    }

    /// Set album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    /// Set duration
    #[must_use]
    pub const fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }

    /// Artists joined with ", "
    #[must_use]
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// The primary artist, or an empty string if none is known
    #[must_use]
    pub fn first_artist(&self) -> &str {
        self.artists.first().map_or("", String::as_str)
    }
}

impl From<&TrackMetadata> for LyricsQuery {
    fn from(metadata: &TrackMetadata) -> Self {
        Self {
            track_name: metadata.title.clone(),
            artists: metadata.artists.clone(),
            album_name: (!metadata.album.is_empty()).then(|| metadata.album.clone()),
            duration_secs: (metadata.duration > 0.0).then_some(metadata.duration),
        }
    }
}

/// Trait for lyrics providers
///
/// Implementations return [`CoreError::LyricsNotFound`] when the service
/// has no lyrics for the track; every other error is treated as transient.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Fetch lyrics for a query
    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsData, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_from_metadata() {
        let metadata = TrackMetadata {
            title: "Song".to_string(),
            artists: vec!["A".to_string(), "B".to_string()],
            album: String::new(),
            duration: 0.0,
        };
        let query = LyricsQuery::from(&metadata);
        assert_eq!(query.track_name, "Song");
        assert_eq!(query.artist_line(), "A, B");
        assert_eq!(query.first_artist(), "A");
        assert_eq!(query.album_name, None);
        assert_eq!(query.duration_secs, None);
    }

    #[test]
    fn test_query_builder() {
        let query = LyricsQuery::new("Song", "Artist")
            .with_album("Album")
            .with_duration(181.0);
        assert_eq!(query.album_name.as_deref(), Some("Album"));
        assert_eq!(query.duration_secs, Some(181.0));
    }
}
