//! [LRCLIB](https://lrclib.net) lyrics provider.
//!
//! Lookups go from most to least specific: exact `/get` requests first,
//! then `/search` with and without the album, each retried with only the
//! first artist when a track credits several. The first step that yields
//! a plausible match wins.

use async_trait::async_trait;
use lyricsync_core::{CoreError, LrcFile, LyricsData, LyricsProvider, LyricsQuery};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Duration tolerance for matching (±2 seconds)
const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// One step of the lookup cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// `/get` with album and duration
    Get { single_artist: bool },
    /// `/search` by title and artist, optionally with album
    Search { album: bool, single_artist: bool },
}

impl Lookup {
    const fn endpoint(self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Search { .. } => "search",
        }
    }
}

/// Steps to try for a query, most specific first.
fn lookup_plan(query: &LyricsQuery) -> Vec<Lookup> {
    let multi_artist = query.artists.len() > 1;
    let has_album = query.album_name.is_some();
    let mut plan = Vec::with_capacity(6);

    if query.duration_secs.is_some() {
        plan.push(Lookup::Get {
            single_artist: false,
        });
        if multi_artist {
            plan.push(Lookup::Get {
                single_artist: true,
            });
        }
    }
    if has_album {
        plan.push(Lookup::Search {
            album: true,
            single_artist: false,
        });
        if multi_artist {
            plan.push(Lookup::Search {
                album: true,
                single_artist: true,
            });
        }
    }
    plan.push(Lookup::Search {
        album: false,
        single_artist: false,
    });
    if multi_artist {
        plan.push(Lookup::Search {
            album: false,
            single_artist: true,
        });
    }
    plan
}

fn build_url(base: &str, query: &LyricsQuery, lookup: Lookup) -> String {
    let (album, single_artist) = match lookup {
        Lookup::Get { single_artist } => (true, single_artist),
        Lookup::Search {
            album,
            single_artist,
        } => (album, single_artist),
    };
    let artist = if single_artist {
        query.first_artist().to_string()
    } else {
        query.artist_line()
    };

    let mut url = format!(
        "{}/{}?track_name={}&artist_name={}",
        base,
        lookup.endpoint(),
        urlencoding::encode(&query.track_name),
        urlencoding::encode(&artist)
    );
    if album {
        if let Some(ref name) = query.album_name {
            let _ = write!(url, "&album_name={}", urlencoding::encode(name));
        }
    }
    if let (Lookup::Get { .. }, Some(duration)) = (lookup, query.duration_secs) {
        let _ = write!(url, "&duration={}", duration.ceil());
    }
    url
}

/// Response from LRCLIB API
/// Note: API returns additional fields (id, albumName) that we don't use;
/// serde ignores unknown fields by default.
#[derive(Debug, Clone, Deserialize)]
struct LrclibResponse {
    #[serde(rename = "trackName", default)]
    track_name: String,
    #[serde(rename = "artistName", default)]
    artist_name: String,
    duration: Option<f64>,
    #[serde(default)]
    instrumental: bool,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

impl LrclibResponse {
    fn has_synced(&self) -> bool {
        self.synced_lyrics
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    fn has_plain(&self) -> bool {
        self.plain_lyrics
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// `/get` answers with one object, `/search` with a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseBody {
    One(LrclibResponse),
    Many(Vec<LrclibResponse>),
}

impl ResponseBody {
    fn into_vec(self) -> Vec<LrclibResponse> {
        match self {
            Self::One(one) => vec![one],
            Self::Many(many) => many,
        }
    }
}

/// Drop candidates whose title differs or whose duration is off by more
/// than the tolerance. Unknown durations on either side are accepted.
fn remove_mismatches(query: &LyricsQuery, candidates: Vec<LrclibResponse>) -> Vec<LrclibResponse> {
    let title = query.track_name.trim();
    candidates
        .into_iter()
        .filter(|c| c.track_name.trim().to_lowercase() == title.to_lowercase())
        .filter(|c| match (query.duration_secs, c.duration) {
            (Some(expected), Some(actual)) => (expected - actual).abs() <= DURATION_TOLERANCE_SECS,
            _ => true,
        })
        .collect()
}

/// Prefer synced lyrics, then the closest duration.
fn best_match(query: &LyricsQuery, candidates: Vec<LrclibResponse>) -> Option<LrclibResponse> {
    let distance = |c: &LrclibResponse| match (query.duration_secs, c.duration) {
        (Some(expected), Some(actual)) => (expected - actual).abs(),
        _ => DURATION_TOLERANCE_SECS,
    };
    candidates.into_iter().min_by(|a, b| {
        b.has_synced()
            .cmp(&a.has_synced())
            .then_with(|| distance(a).total_cmp(&distance(b)))
    })
}

fn to_lyrics(result: LrclibResponse) -> LyricsData {
    if result.instrumental {
        debug!("Track is instrumental ({} - {})", result.artist_name, result.track_name);
        return LyricsData::instrumental();
    }

    if let Some(synced) = result.synced_lyrics.as_deref().filter(|s| !s.trim().is_empty()) {
        match LrcFile::parse(synced) {
            Ok(lrc) => {
                debug!("Got synced lyrics with {} lines", lrc.lines.len());
                return lrc.into_lyrics();
            }
            Err(e) => warn!("Failed to parse synced lyrics: {}", e),
        }
    }

    if let Some(plain) = result.plain_lyrics.as_deref().filter(|s| !s.trim().is_empty()) {
        debug!("Got plain lyrics");
        return LyricsData::plain(plain.trim());
    }

    LyricsData::unknown()
}

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl LrclibProvider {
    /// Create a new LRCLIB provider with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_base_url(LRCLIB_API_URL)
    }

    /// Create a provider talking to another LRCLIB-compatible server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, CoreError> {
        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!(
                "lyricsync/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/kvnxiao/lyricsync)"
            ))
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Run one lookup step. A 404 is an empty candidate list.
    async fn request(&self, url: &str) -> Result<Vec<LrclibResponse>, CoreError> {
        debug!("LRCLIB GET: {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            warn!("LRCLIB returned status: {}", status);
            return Err(CoreError::LyricsProviderFailed {
                provider: self.name().to_string(),
                reason: format!("LRCLIB returned status: {status}"),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<ResponseBody>(&body)
            .map(ResponseBody::into_vec)
            .map_err(|e| CoreError::LyricsProviderFailed {
                provider: self.name().to_string(),
                reason: format!("unexpected response body: {e}"),
            })
    }
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch(&self, query: &LyricsQuery) -> Result<LyricsData, CoreError> {
        info!(
            "Fetching lyrics from LRCLIB for: {} - {} (duration: {:?}s)",
            query.artist_line(),
            query.track_name,
            query.duration_secs
        );

        for lookup in lookup_plan(query) {
            let url = build_url(&self.base_url, query, lookup);
            let candidates = remove_mismatches(query, self.request(&url).await?);
            let usable: Vec<_> = candidates
                .into_iter()
                .filter(|c| c.instrumental || c.has_synced() || c.has_plain())
                .collect();

            if let Some(result) = best_match(query, usable) {
                info!(
                    "LRCLIB match via {:?} (artist: {}, duration: {:?})",
                    lookup, result.artist_name, result.duration
                );
                return Ok(to_lyrics(result));
            }
            debug!("LRCLIB {:?} found nothing usable", lookup);
        }

        Err(CoreError::LyricsNotFound {
            track: query.track_name.clone(),
            artist: query.artist_line(),
        })
    }
}
