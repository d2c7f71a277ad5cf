use crate::error::Result;
use crate::lyrics::{Lyric, LyricsData, LyricsState};
use crate::player::TrackMetadata;
use crate::time::DurationExt;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use std::path::Path;
use std::time::Duration;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS lyrics (
    fingerprint TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    artists TEXT NOT NULL,
    album TEXT NOT NULL,
    duration_ms INTEGER NOT NULL,
    state TEXT NOT NULL,
    lines TEXT NOT NULL,
    stored_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lyrics_stored_at ON lyrics(stored_at);
";

/// Freshness of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Present and within its life span
    Active,
    /// Present but older than the life span
    Expired,
    /// No entry for the track
    Missing,
}

/// Result of a cache lookup. `lyrics` is set for active and expired entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub lyrics: Option<LyricsData>,
    pub state: CacheState,
}

impl CacheLookup {
    const fn missing() -> Self {
        Self {
            lyrics: None,
            state: CacheState::Missing,
        }
    }
}

struct CachedRow {
    state: String,
    lines: String,
    stored_at: i64,
}

/// SQLite-based lyrics cache keyed by track fingerprint
pub struct LyricsCache {
    conn: Connection,
    life_span: Option<Duration>,
}

impl LyricsCache {
    /// Open a cache at a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path, life_span: Option<Duration>) -> Result<Self> {
        info!("Opening lyrics cache database at {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Ok(())
        })
        .await?;

        Self::init(conn, life_span).await
    }

    /// Open a throwaway cache that lives only as long as this value.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the in-memory database.
    pub async fn open_in_memory(life_span: Option<Duration>) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, life_span).await
    }

    async fn init(conn: Connection, life_span: Option<Duration>) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            Ok(())
        })
        .await?;

        debug!("Lyrics cache schema ready (life span: {:?})", life_span);
        Ok(Self { conn, life_span })
    }

    /// Look up lyrics for a track.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails. Undecodable rows are
    /// reported as missing.
    pub async fn lookup(&self, metadata: &TrackMetadata) -> Result<CacheLookup> {
        self.lookup_at(metadata, Utc::now()).await
    }

    async fn lookup_at(&self, metadata: &TrackMetadata, now: DateTime<Utc>) -> Result<CacheLookup> {
        let key = metadata.fingerprint().to_string();
        debug!("Looking up lyrics in cache: {}", key);

        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT state, lines, stored_at FROM lyrics WHERE fingerprint = ?1",
                )?;
                let row = stmt
                    .query_row(rusqlite::params![key], |row| {
                        Ok(CachedRow {
                            state: row.get(0)?,
                            lines: row.get(1)?,
                            stored_at: row.get(2)?,
                        })
                    })
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some(row) = row else {
            return Ok(CacheLookup::missing());
        };

        let state = match row.state.parse::<LyricsState>() {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring cache entry with bad state: {}", e);
                return Ok(CacheLookup::missing());
            }
        };
        let lines: Vec<Lyric> = match serde_json::from_str(&row.lines) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Ignoring cache entry with bad lines: {}", e);
                return Ok(CacheLookup::missing());
            }
        };

        let expired = self.life_span.is_some_and(|span| {
            let age_ms = now.timestamp_millis().saturating_sub(row.stored_at);
            age_ms > span.as_millis_i64()
        });

        Ok(CacheLookup {
            lyrics: Some(LyricsData::from_parts(state, lines)),
            state: if expired {
                CacheState::Expired
            } else {
                CacheState::Active
            },
        })
    }

    /// Store lyrics for a track, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the lyrics cannot be encoded or written.
    pub async fn store(&self, metadata: &TrackMetadata, lyrics: &LyricsData) -> Result<()> {
        self.store_at(metadata, lyrics, Utc::now()).await
    }

    async fn store_at(
        &self,
        metadata: &TrackMetadata,
        lyrics: &LyricsData,
        stored_at: DateTime<Utc>,
    ) -> Result<()> {
        info!(
            "Storing {} lyrics in cache: {} - {}",
            lyrics.state(),
            metadata.artist_line(),
            metadata.title
        );

        let key = metadata.fingerprint().to_string();
        let title = metadata.title.clone();
        let artists = metadata.artist_line();
        let album = metadata.album.clone();
        let duration_ms = crate::time::secs_to_duration(metadata.duration).as_millis_i64();
        let state = lyrics.state().as_str();
        let lines = serde_json::to_string(lyrics.lines())?;
        let stored_at = stored_at.timestamp_millis();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r"
                    INSERT INTO lyrics (fingerprint, title, artists, album, duration_ms, state, lines, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(fingerprint) DO UPDATE SET
                        state = excluded.state,
                        lines = excluded.lines,
                        stored_at = excluded.stored_at
                ",
                    rusqlite::params![key, title, artists, album, duration_ms, state, lines, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    /// Remove the entry for a track. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove(&self, metadata: &TrackMetadata) -> Result<bool> {
        let key = metadata.fingerprint().to_string();
        self.conn
            .call(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM lyrics WHERE fingerprint = ?1", rusqlite::params![key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Into::into)
    }

    /// Delete entries older than the life span. A cache without a life span
    /// keeps everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cleanup fails.
    pub async fn cleanup(&self) -> Result<usize> {
        let Some(span) = self.life_span else {
            return Ok(0);
        };
        let cutoff = Utc::now().timestamp_millis() - span.as_millis_i64();

        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM lyrics WHERE stored_at < ?1",
                    rusqlite::params![cutoff],
                )?;
                Ok(deleted)
            })
            .await?;

        if deleted > 0 {
            info!("Removed {} expired lyrics cache entries", deleted);
        }
        Ok(deleted)
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            artists: vec!["Artist".to_string()],
            album: "Album".to_string(),
            duration: 200.0,
        }
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let cache = LyricsCache::open_in_memory(None).await.unwrap();
        let lookup = cache.lookup(&metadata("Song")).await.unwrap();
        assert_eq!(lookup.state, CacheState::Missing);
        assert!(lookup.lyrics.is_none());
    }

    #[tokio::test]
    async fn test_store_and_lookup_synced() {
        let cache = LyricsCache::open_in_memory(None).await.unwrap();
        let lyrics = LyricsData::synced(vec![Lyric::new(1.0, "one"), Lyric::new(2.5, "two")]);
        cache.store(&metadata("Song"), &lyrics).await.unwrap();

        let lookup = cache.lookup(&metadata("Song")).await.unwrap();
        assert_eq!(lookup.state, CacheState::Active);
        assert_eq!(lookup.lyrics, Some(lyrics));

        let other = cache.lookup(&metadata("Other")).await.unwrap();
        assert_eq!(other.state, CacheState::Missing);
    }

    #[tokio::test]
    async fn test_store_replaces_entry() {
        let cache = LyricsCache::open_in_memory(None).await.unwrap();
        cache
            .store(&metadata("Song"), &LyricsData::plain("words"))
            .await
            .unwrap();
        cache
            .store(&metadata("Song"), &LyricsData::instrumental())
            .await
            .unwrap();

        let lookup = cache.lookup(&metadata("Song")).await.unwrap();
        assert_eq!(
            lookup.lyrics.map(|l| l.state()),
            Some(LyricsState::Instrumental)
        );
    }

    #[tokio::test]
    async fn test_expired_entry() {
        let cache = LyricsCache::open_in_memory(Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
        cache
            .store_at(&metadata("Old"), &LyricsData::plain("old"), two_hours_ago)
            .await
            .unwrap();
        cache
            .store(&metadata("New"), &LyricsData::plain("new"))
            .await
            .unwrap();

        let old = cache.lookup(&metadata("Old")).await.unwrap();
        assert_eq!(old.state, CacheState::Expired);
        assert!(old.lyrics.is_some());
        assert_eq!(
            cache.lookup(&metadata("New")).await.unwrap().state,
            CacheState::Active
        );

        assert_eq!(cache.cleanup().await.unwrap(), 1);
        assert_eq!(
            cache.lookup(&metadata("Old")).await.unwrap().state,
            CacheState::Missing
        );
    }

    #[tokio::test]
    async fn test_no_life_span_never_expires() {
        let cache = LyricsCache::open_in_memory(None).await.unwrap();
        let long_ago = Utc::now() - chrono::Duration::days(3650);
        cache
            .store_at(&metadata("Song"), &LyricsData::not_found(), long_ago)
            .await
            .unwrap();
        assert_eq!(
            cache.lookup(&metadata("Song")).await.unwrap().state,
            CacheState::Active
        );
        assert_eq!(cache.cleanup().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let cache = LyricsCache::open_in_memory(None).await.unwrap();
        cache
            .store(&metadata("Song"), &LyricsData::plain("x"))
            .await
            .unwrap();
        assert!(cache.remove(&metadata("Song")).await.unwrap());
        assert!(!cache.remove(&metadata("Song")).await.unwrap());
    }
}
