use lyricsync_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MprisError {
    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("D-Bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("D-Bus value error: {0}")]
    Variant(#[from] zbus::zvariant::Error),

    #[error("Signal stream ended: {stream}")]
    StreamEnded { stream: &'static str },

    #[error("Player reported an invalid value: {0}")]
    InvalidValue(String),
}

impl From<MprisError> for CoreError {
    fn from(err: MprisError) -> Self {
        Self::player(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MprisError>;
