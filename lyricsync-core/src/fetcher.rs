//! Lyrics fetcher that consults the cache and then each provider in order.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheState, LyricsCache};
use crate::error::{CoreError, Result};
use crate::lyrics::{LyricsData, LyricsState};
use crate::player::TrackMetadata;
use crate::provider::{LyricsProvider, LyricsQuery};

/// Resolves lyrics for a track.
pub struct LyricsFetcher {
    providers: Vec<Box<dyn LyricsProvider>>,
    cache: Option<Arc<LyricsCache>>,
    store_condition: Vec<LyricsState>,
}

impl LyricsFetcher {
    /// Create a new lyrics fetcher
    ///
    /// # Arguments
    /// * `providers` - List of lyrics providers to try in order
    /// * `cache` - Lyrics cache, `None` when caching is disabled
    /// * `store_condition` - Lyric states that are written to the cache
    pub fn new(
        providers: Vec<Box<dyn LyricsProvider>>,
        cache: Option<Arc<LyricsCache>>,
        store_condition: Vec<LyricsState>,
    ) -> Self {
        Self {
            providers,
            cache,
            store_condition,
        }
    }

    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch lyrics for a track.
    ///
    /// An active cache entry wins. Otherwise providers are asked in order;
    /// synced lyrics end the search, other results are kept as a fallback
    /// while later providers are tried. An expired cache entry is used when
    /// every provider failed transiently.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LyricsNotFound`] when no source has lyrics, or the
    /// last transient provider error.
    pub async fn fetch(&self, metadata: &TrackMetadata) -> Result<LyricsData> {
        if metadata.title.trim().is_empty() {
            return Err(not_found(metadata));
        }

        let mut expired = None;
        if let Some(cache) = &self.cache {
            match cache.lookup(metadata).await {
                Ok(lookup) => match (lookup.state, lookup.lyrics) {
                    (CacheState::Active, Some(lyrics)) => {
                        info!("Using cached lyrics for {}", metadata.title);
                        return Ok(lyrics);
                    }
                    (CacheState::Expired, Some(lyrics)) => {
                        debug!("Cached lyrics for {} expired, refetching", metadata.title);
                        expired = Some(lyrics);
                    }
                    _ => {}
                },
                Err(e) => warn!("Lyrics cache lookup failed: {}", e),
            }
        }

        let query = LyricsQuery::from(metadata);
        info!(
            "Fetching lyrics for: {} - {} (providers: {:?})",
            query.artist_line(),
            query.track_name,
            self.provider_names()
        );

        let mut fallback: Option<LyricsData> = None;
        let mut transient: Option<CoreError> = None;

        for provider in &self.providers {
            match provider.fetch(&query).await {
                Ok(lyrics) if lyrics.state() == LyricsState::Synced => {
                    info!(
                        "Found synced lyrics from {} ({} lines)",
                        provider.name(),
                        lyrics.lines().len()
                    );
                    self.store(metadata, &lyrics).await;
                    return Ok(lyrics);
                }
                Ok(lyrics) => {
                    info!(
                        "Provider {} returned {} lyrics, trying next provider",
                        provider.name(),
                        lyrics.state()
                    );
                    if fallback.is_none() {
                        fallback = Some(lyrics);
                    }
                }
                Err(e) if e.is_not_found() => {
                    info!("Provider {} has no lyrics", provider.name());
                }
                Err(e) => {
                    warn!("Provider {} failed with error: {}", provider.name(), e);
                    transient = Some(e);
                }
            }
        }

        if let Some(lyrics) = fallback {
            self.store(metadata, &lyrics).await;
            return Ok(lyrics);
        }

        if let Some(error) = transient {
            return match expired {
                Some(lyrics) => {
                    info!("Providers unavailable, using expired cache entry");
                    Ok(lyrics)
                }
                None => Err(error),
            };
        }

        info!(
            "No lyrics found for {} - {}",
            query.artist_line(),
            query.track_name
        );
        self.store(metadata, &LyricsData::not_found()).await;
        Err(not_found(metadata))
    }

    async fn store(&self, metadata: &TrackMetadata, lyrics: &LyricsData) {
        let Some(cache) = &self.cache else {
            return;
        };
        if !self.store_condition.contains(&lyrics.state()) {
            return;
        }
        if let Err(e) = cache.store(metadata, lyrics).await {
            warn!("Failed to cache lyrics: {}", e);
        }
    }
}

fn not_found(metadata: &TrackMetadata) -> CoreError {
    CoreError::LyricsNotFound {
        track: metadata.title.clone(),
        artist: metadata.artist_line(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::Lyric;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticProvider {
        name: &'static str,
        result: fn() -> Result<LyricsData>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticProvider {
        fn boxed(
            name: &'static str,
            result: fn() -> Result<LyricsData>,
        ) -> (Box<dyn LyricsProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Self {
                name,
                result,
                calls: calls.clone(),
            };
            (Box::new(provider), calls)
        }
    }

    #[async_trait]
    impl LyricsProvider for StaticProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _query: &LyricsQuery) -> Result<LyricsData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn synced() -> Result<LyricsData> {
        Ok(LyricsData::synced(vec![Lyric::new(1.0, "line")]))
    }

    fn plain() -> Result<LyricsData> {
        Ok(LyricsData::plain("line"))
    }

    fn missing() -> Result<LyricsData> {
        Err(CoreError::LyricsNotFound {
            track: "Song".to_string(),
            artist: "Artist".to_string(),
        })
    }

    fn broken() -> Result<LyricsData> {
        Err(CoreError::LyricsProviderFailed {
            provider: "test".to_string(),
            reason: "503".to_string(),
        })
    }

    fn metadata() -> TrackMetadata {
        TrackMetadata {
            title: "Song".to_string(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            duration: 120.0,
        }
    }

    fn all_states() -> Vec<LyricsState> {
        vec![
            LyricsState::Synced,
            LyricsState::Plain,
            LyricsState::Instrumental,
            LyricsState::NotFound,
        ]
    }

    #[tokio::test]
    async fn test_synced_stops_search() {
        let (first, first_calls) = StaticProvider::boxed("first", synced);
        let (second, second_calls) = StaticProvider::boxed("second", plain);
        let fetcher = LyricsFetcher::new(vec![first, second], None, all_states());

        let lyrics = fetcher.fetch(&metadata()).await.unwrap();
        assert_eq!(lyrics.state(), LyricsState::Synced);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plain_is_fallback_for_later_synced() {
        let (first, _) = StaticProvider::boxed("first", plain);
        let (second, _) = StaticProvider::boxed("second", synced);
        let fetcher = LyricsFetcher::new(vec![first, second], None, all_states());
        let lyrics = fetcher.fetch(&metadata()).await.unwrap();
        assert_eq!(lyrics.state(), LyricsState::Synced);

        let (first, _) = StaticProvider::boxed("first", plain);
        let (second, _) = StaticProvider::boxed("second", missing);
        let fetcher = LyricsFetcher::new(vec![first, second], None, all_states());
        let lyrics = fetcher.fetch(&metadata()).await.unwrap();
        assert_eq!(lyrics.state(), LyricsState::Plain);
    }

    #[tokio::test]
    async fn test_all_not_found() {
        let (first, _) = StaticProvider::boxed("first", missing);
        let fetcher = LyricsFetcher::new(vec![first], None, all_states());
        let err = fetcher.fetch(&metadata()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_transient_error_wins_over_not_found() {
        let (first, _) = StaticProvider::boxed("first", broken);
        let (second, _) = StaticProvider::boxed("second", missing);
        let fetcher = LyricsFetcher::new(vec![first, second], None, all_states());
        let err = fetcher.fetch(&metadata()).await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_empty_title_is_not_found_without_query() {
        let (first, calls) = StaticProvider::boxed("first", synced);
        let fetcher = LyricsFetcher::new(vec![first], None, all_states());
        let err = fetcher.fetch(&TrackMetadata::default()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let cache = Arc::new(LyricsCache::open_in_memory(None).await.unwrap());
        cache
            .store(&metadata(), &LyricsData::instrumental())
            .await
            .unwrap();
        let (first, calls) = StaticProvider::boxed("first", synced);
        let fetcher = LyricsFetcher::new(vec![first], Some(cache), all_states());

        let lyrics = fetcher.fetch(&metadata()).await.unwrap();
        assert_eq!(lyrics.state(), LyricsState::Instrumental);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_condition_respected() {
        let cache = Arc::new(LyricsCache::open_in_memory(None).await.unwrap());
        let (first, _) = StaticProvider::boxed("first", plain);
        let fetcher = LyricsFetcher::new(
            vec![first],
            Some(cache.clone()),
            vec![LyricsState::Synced],
        );
        fetcher.fetch(&metadata()).await.unwrap();
        assert_eq!(
            cache.lookup(&metadata()).await.unwrap().state,
            CacheState::Missing
        );

        let (first, _) = StaticProvider::boxed("first", missing);
        let fetcher = LyricsFetcher::new(vec![first], Some(cache.clone()), all_states());
        assert!(fetcher.fetch(&metadata()).await.is_err());
        let cached = cache.lookup(&metadata()).await.unwrap().lyrics.unwrap();
        assert_eq!(cached.state(), LyricsState::NotFound);
    }
}
