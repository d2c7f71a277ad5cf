//! Synchronization loop.
//!
//! [`SyncEngine::start`] spawns four cooperating tasks around one
//! [`SharedPlayer`]:
//!
//! - the event consumer applies normalized player messages in order,
//! - the fetch coordinator resolves lyrics for each track change,
//! - the position synchronizer corrects the position estimate on request,
//! - the scheduler advances the displayed line on timer fires.
//!
//! They talk through channels and the player lock only; none of them holds
//! the lock across a network call, a sampling delay or a timer wait.

mod events;
mod fetch;
mod position;
mod scheduler;

pub use fetch::{FetchToken, FetchTrigger};
pub use position::{SyncRequester, SAMPLE_INTERVAL};
pub use scheduler::{delay_until, select_line, LineSelection};

use crate::fetcher::LyricsFetcher;
use crate::output::OutputController;
use crate::player::SharedPlayer;
use crate::postprocess::LyricsPostProcessor;
use crate::signal::{signal_channel, SignalSender};
use crate::source::PlayerAccessor;
use crate::timer::LyricTimer;
use scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineSettings {
    /// Seconds added to lyric timestamps before comparing with the position.
    pub timestamp_offset: f64,
}

/// Collaborators the engine works with.
pub struct EngineDeps {
    pub player: SharedPlayer,
    pub accessor: Arc<dyn PlayerAccessor>,
    pub fetcher: Arc<LyricsFetcher>,
    pub postprocessor: Arc<dyn LyricsPostProcessor>,
    pub output: Arc<dyn OutputController>,
}

/// State shared by the engine tasks.
pub(crate) struct EngineContext {
    pub(crate) player: SharedPlayer,
    pub(crate) accessor: Arc<dyn PlayerAccessor>,
    pub(crate) output: Arc<dyn OutputController>,
    pub(crate) timer: LyricTimer,
    pub(crate) sync: SyncRequester,
    pub(crate) fetch: FetchTrigger,
    pub(crate) settings: EngineSettings,
}

impl EngineContext {
    /// Re-evaluate the current line as soon as possible.
    pub(crate) fn resync(&self) {
        self.timer.reset(Duration::ZERO);
    }
}

/// Engine that keeps the displayed lyric in step with the player
pub struct SyncEngine {
    deps: EngineDeps,
    settings: EngineSettings,
}

impl SyncEngine {
    #[must_use]
    pub const fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        Self { deps, settings }
    }

    /// Spawn the engine tasks. They run until `cancel` fires or
    /// [`SyncHandle::shutdown`] is called.
    #[must_use]
    pub fn start(self, cancel: &CancellationToken) -> SyncHandle {
        let EngineDeps {
            player,
            accessor,
            fetcher,
            postprocessor,
            output,
        } = self.deps;

        let cancel = cancel.child_token();
        let (timer, fires) = LyricTimer::new();
        let (sync, sync_rx) = SyncRequester::new();
        let (fetch, fetch_rx) = FetchTrigger::new();
        let (signals, signal_rx) = signal_channel();

        let ctx = Arc::new(EngineContext {
            player: player.clone(),
            accessor,
            output,
            timer,
            sync: sync.clone(),
            fetch,
            settings: self.settings,
        });

        let tasks = vec![
            tokio::spawn(position::run(ctx.clone(), sync_rx, cancel.clone())),
            tokio::spawn(fetch::run(
                ctx.clone(),
                fetcher,
                postprocessor,
                fetch_rx,
                cancel.clone(),
            )),
            tokio::spawn(Scheduler::new().run(ctx.clone(), fires, cancel.clone())),
            tokio::spawn(events::run(ctx, signal_rx, cancel.clone())),
        ];
        info!("Sync engine started");

        SyncHandle {
            signals,
            sync,
            player,
            cancel,
            tasks,
        }
    }
}

/// Handle to a running engine.
pub struct SyncHandle {
    signals: SignalSender,
    sync: SyncRequester,
    player: SharedPlayer,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    /// Intake for raw player signals.
    #[must_use]
    pub fn signal_sender(&self) -> SignalSender {
        self.signals.clone()
    }

    /// Ask for a position sync. Returns whether a new one was queued.
    pub fn request_position_sync(&self) -> bool {
        self.sync.request()
    }

    #[must_use]
    pub const fn player(&self) -> &SharedPlayer {
        &self.player
    }

    /// Stop all engine tasks and wait for them.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Sync engine task ended abnormally: {}", e);
            }
        }
        info!("Sync engine stopped");
    }
}
