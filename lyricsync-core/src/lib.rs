pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lrc;
pub mod lyrics;
pub mod output;
pub mod paths;
pub mod player;
pub mod postprocess;
pub mod provider;
pub mod signal;
pub mod source;
pub mod sync;
pub mod time;
pub mod timer;

pub use cache::{CacheLookup, CacheState, LyricsCache};
pub use config::{
    Config, LyricsProviderType, OutputType, PipedConfig, PipedFormat, ValidationIssue,
    CONFIG_TEMPLATE,
};
pub use error::{CoreError, Result};
pub use fetcher::LyricsFetcher;
pub use lrc::{format_timestamp, LrcFile, LrcMetadata};
pub use lyrics::{Lyric, LyricsData, LyricsState};
pub use output::OutputController;
pub use player::{
    PlaybackStatus, PlayerState, SharedPlayer, Track, TrackFingerprint, TrackMetadata,
};
pub use postprocess::{LyricsPostProcessor, Passthrough, WhitespaceNormalizer};
pub use provider::{LyricsProvider, LyricsQuery};
pub use signal::{
    metadata_from_raw, normalize, PlayerMessage, RawSignal, RawValue, SignalSender,
    PLAYER_INTERFACE,
};
pub use source::{PlayerAccessor, SignalTransport};
pub use sync::{EngineDeps, EngineSettings, SyncEngine, SyncHandle};
pub use time::DurationExt;
