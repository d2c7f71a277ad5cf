use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. Run with --config-gen to create one.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Lyrics errors
    #[error("Lyrics not found for track: {track} by {artist}")]
    LyricsNotFound { track: String, artist: String },

    #[error("Lyrics provider {provider} failed: {reason}")]
    LyricsProviderFailed { provider: String, reason: String },

    #[error("Failed to parse LRC: {reason}")]
    LrcParseError { reason: String },

    // Player errors
    #[error("Media player request failed: {reason}")]
    Player { reason: String },

    #[error("Synchronization engine has stopped")]
    EngineStopped,

    // Cache errors
    #[error("Cache database error: {0}")]
    CacheError(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Failed to encode cached lyrics: {0}")]
    CacheEncodeError(#[from] serde_json::Error),

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Network request failed: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error means "the lyrics do not exist", as opposed to a
    /// transient failure worth retrying on the next track change.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::LyricsNotFound { .. })
    }

    /// Shorthand for a player accessor failure.
    pub fn player(reason: impl Into<String>) -> Self {
        Self::Player {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let not_found = CoreError::LyricsNotFound {
            track: "Song".to_string(),
            artist: "Artist".to_string(),
        };
        assert!(not_found.is_not_found());

        let failed = CoreError::LyricsProviderFailed {
            provider: "lrclib".to_string(),
            reason: "status 500".to_string(),
        };
        assert!(!failed.is_not_found());
        assert!(!CoreError::player("no bus").is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = CoreError::LyricsNotFound {
            track: "Song".to_string(),
            artist: "Artist".to_string(),
        };
        assert_eq!(err.to_string(), "Lyrics not found for track: Song by Artist");
        assert_eq!(
            CoreError::player("timeout").to_string(),
            "Media player request failed: timeout"
        );
    }
}
