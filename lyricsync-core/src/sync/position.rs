//! Position synchronizer.
//!
//! The engine keeps its own position estimate and only occasionally asks
//! the player. A sync takes two samples 50 ms apart: a player that reports
//! the same value twice is not advancing (or reports a cached value), so
//! only a changed second sample is trusted and committed.

use super::EngineContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Gap between the two position samples of one sync
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Coalescing intake for sync requests.
///
/// At most one sync is queued or running at a time; requests made meanwhile
/// are dropped since the pending sync will observe their effect anyway.
#[derive(Debug, Clone)]
pub struct SyncRequester {
    busy: Arc<AtomicBool>,
    tx: mpsc::Sender<()>,
}

impl SyncRequester {
    pub(crate) fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                busy: Arc::new(AtomicBool::new(false)),
                tx,
            },
            rx,
        )
    }

    /// Ask for a position sync. Returns whether a new sync was queued.
    pub fn request(&self) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.tx.try_send(()).is_err() {
            self.busy.store(false, Ordering::Release);
            return false;
        }
        true
    }

    fn complete(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub(crate) async fn run(
    ctx: Arc<EngineContext>,
    mut requests: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    info!("Position synchronizer started");
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = sync_once(&ctx) => ctx.sync.complete(),
                }
            }
        }
    }
    info!("Position synchronizer stopped");
}

/// One dual-sample sync. Returns whether a new position was committed.
#[allow(clippy::float_cmp)]
pub(crate) async fn sync_once(ctx: &EngineContext) -> bool {
    if !ctx.player.read(|state| state.is_playing()).await {
        debug!("Player not playing, stopping lyric timer");
        ctx.timer.stop();
        return false;
    }

    let Some(first) = sample(ctx).await else {
        return false;
    };
    tokio::time::sleep(SAMPLE_INTERVAL).await;
    let Some(second) = sample(ctx).await else {
        return false;
    };

    if first == second {
        debug!("Position samples identical ({:.3}s), keeping estimate", first);
        return false;
    }

    debug!("Committing position {:.3}s", second);
    ctx.player.update(|state| state.position = second).await;
    ctx.resync();
    true
}

async fn sample(ctx: &EngineContext) -> Option<f64> {
    match ctx.accessor.position().await {
        Ok(position) => Some(position),
        Err(e) => {
            warn!("Position sync aborted: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_coalesce_until_complete() {
        let (requester, mut rx) = SyncRequester::new();
        assert!(requester.request());
        for _ in 0..9 {
            assert!(!requester.request());
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // Still running: further requests are dropped.
        assert!(!requester.request());
        requester.complete();
        assert!(requester.request());
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_wedge() {
        let (requester, rx) = SyncRequester::new();
        drop(rx);
        assert!(!requester.request());
        assert!(!requester.busy.load(Ordering::Acquire));
    }
}
