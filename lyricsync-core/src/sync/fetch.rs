//! Lyric fetch coordinator.
//!
//! Every track change issues a new token and starts a fetch. Fetches are
//! never cancelled; a result is installed only if its token is still the
//! latest one and the track has not changed underneath it.

use super::EngineContext;
use crate::fetcher::LyricsFetcher;
use crate::lyrics::LyricsData;
use crate::postprocess::LyricsPostProcessor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identifies one fetch attempt.
pub type FetchToken = u64;

/// Issues fetch tokens and hands them to the coordinator task.
#[derive(Debug, Clone)]
pub struct FetchTrigger {
    latest: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<FetchToken>,
}

impl FetchTrigger {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<FetchToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                latest: Arc::new(AtomicU64::new(0)),
                tx,
            },
            rx,
        )
    }

    /// Start a fetch for the current track, superseding earlier ones.
    pub fn trigger(&self) -> FetchToken {
        let token = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        if self.tx.send(token).is_err() {
            debug!("Fetch coordinator stopped, dropping fetch {}", token);
        }
        token
    }

    #[must_use]
    pub fn is_latest(&self, token: FetchToken) -> bool {
        self.latest.load(Ordering::Acquire) == token
    }
}

pub(crate) async fn run(
    ctx: Arc<EngineContext>,
    fetcher: Arc<LyricsFetcher>,
    postprocessor: Arc<dyn LyricsPostProcessor>,
    mut tokens: mpsc::UnboundedReceiver<FetchToken>,
    cancel: CancellationToken,
) {
    info!("Lyrics fetch coordinator started");
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            token = tokens.recv() => {
                let Some(token) = token else {
                    break;
                };
                in_flight.spawn(fetch_and_install(
                    ctx.clone(),
                    fetcher.clone(),
                    postprocessor.clone(),
                    token,
                ));
            }
            Some(joined) = in_flight.join_next() => {
                if let Err(e) = joined {
                    warn!("Lyrics fetch task failed: {}", e);
                }
            }
        }
    }
    in_flight.abort_all();
    info!("Lyrics fetch coordinator stopped");
}

async fn fetch_and_install(
    ctx: Arc<EngineContext>,
    fetcher: Arc<LyricsFetcher>,
    postprocessor: Arc<dyn LyricsPostProcessor>,
    token: FetchToken,
) {
    let metadata = ctx.player.read(|state| state.track.metadata.clone()).await;
    let fingerprint = metadata.fingerprint();
    debug!("Fetch {} started for {}", token, metadata.title);

    let mut lyrics = match fetcher.fetch(&metadata).await {
        Ok(lyrics) => lyrics,
        Err(e) if e.is_not_found() => LyricsData::not_found(),
        Err(e) => {
            warn!("Fetching lyrics for {} failed: {}", metadata.title, e);
            return;
        }
    };

    if !ctx.fetch.is_latest(token) {
        debug!("Fetch {} superseded, discarding result", token);
        return;
    }

    postprocessor.configure(&mut lyrics);

    let state = lyrics.state();
    let installed = ctx
        .player
        .update(|player| {
            if !ctx.fetch.is_latest(token) || player.track.fingerprint() != fingerprint {
                return false;
            }
            player.install_lyrics(lyrics);
            true
        })
        .await;

    if !installed {
        debug!("Fetch {} superseded before install, discarding result", token);
        return;
    }

    info!("Installed {} lyrics for {}", state, metadata.title);
    ctx.output.on_player_info_changed();
    ctx.sync.request();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokens_increase_and_supersede() {
        let (trigger, mut rx) = FetchTrigger::new();
        let first = trigger.trigger();
        let second = trigger.trigger();
        assert!(second > first);
        assert!(!trigger.is_latest(first));
        assert!(trigger.is_latest(second));
        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }
}
