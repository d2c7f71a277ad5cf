//! Piped output: one line of text (or JSON) per update, to stdout or a file.

use super::format::{animation_frame, finish, next_frame, render_line};
use lyricsync_core::config::PipedConfig;
use lyricsync_core::paths::expand_home;
use lyricsync_core::time::secs_to_duration;
use lyricsync_core::{LyricsState, OutputController, PlayerState, SharedPlayer};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "lyricsync::output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    InfoChanged,
    Display(Option<usize>),
}

/// Engine-facing side of the piped output. Commands are queued for the
/// writer task.
pub struct PipedOutput {
    tx: mpsc::UnboundedSender<Command>,
}

impl PipedOutput {
    pub fn spawn(
        config: PipedConfig,
        player: SharedPlayer,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let sink = Sink::from_config(&config);
        Self::spawn_with_sink(config, player, sink, cancel)
    }

    fn spawn_with_sink(
        config: PipedConfig,
        player: SharedPlayer,
        sink: Sink,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Writer::new(config, player, sink);
        (Self { tx }, tokio::spawn(writer.run(rx, cancel)))
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!(target: LOG_TARGET, "Writer stopped, dropping {:?}", command);
        }
    }
}

impl OutputController for PipedOutput {
    fn on_player_info_changed(&self) {
        self.send(Command::InfoChanged);
    }

    fn display_lyric(&self, index: Option<usize>) {
        self.send(Command::Display(index));
    }
}

/// Where rendered text goes.
enum Sink {
    Stdout,
    /// Rewritten on every update through a temp file and a rename.
    File { path: PathBuf, temp: PathBuf },
    #[cfg(test)]
    Capture(std::sync::Arc<std::sync::Mutex<Vec<String>>>),
}

impl Sink {
    fn from_config(config: &PipedConfig) -> Self {
        if config.is_stdout() {
            return Self::Stdout;
        }
        let path = expand_home(&config.destination);
        let mut temp_name = path
            .file_name()
            .map_or_else(|| OsString::from("lyricsync"), ToOwned::to_owned);
        temp_name.push(format!(".{}.tmp", std::process::id()));
        let temp = path.with_file_name(temp_name);
        info!(target: LOG_TARGET, "Writing lyrics to {}", path.display());
        Self::File { path, temp }
    }

    async fn write(&self, text: &str) -> std::io::Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await
            }
            Self::File { path, temp } => {
                let atomic = async {
                    tokio::fs::write(temp, text).await?;
                    tokio::fs::rename(temp, path).await
                };
                if let Err(e) = atomic.await {
                    warn!(target: LOG_TARGET, "Atomic write failed, writing in place: {}", e);
                    tokio::fs::write(path, text).await?;
                }
                Ok(())
            }
            #[cfg(test)]
            Self::Capture(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(text.to_string());
                }
                Ok(())
            }
        }
    }
}

/// Line last requested by the engine, tied to the lyric set it indexes.
#[derive(Debug, Clone, Copy)]
struct Shown {
    index: Option<usize>,
    revision: u64,
}

#[derive(Debug, Clone, Copy)]
struct Animation {
    frame: u32,
    next: Instant,
}

struct Writer {
    config: PipedConfig,
    player: SharedPlayer,
    sink: Sink,
    interval: Duration,
    last: Option<String>,
    shown: Option<Shown>,
    animation: Option<Animation>,
}

impl Writer {
    fn new(config: PipedConfig, player: SharedPlayer, sink: Sink) -> Self {
        let interval = secs_to_duration(config.instrumental.interval);
        Self {
            config,
            player,
            sink,
            interval,
            last: None,
            shown: None,
            animation: None,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        loop {
            let deadline = self.animation.map(|a| a.next);
            tokio::select! {
                () = cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                () = wait_until(deadline) => self.tick().await,
            }
        }
        debug!(target: LOG_TARGET, "Piped writer stopped");
    }

    async fn handle(&mut self, command: Command) {
        let state = self.player.snapshot().await;
        match command {
            Command::Display(index) => {
                self.shown = Some(Shown {
                    index,
                    revision: state.lyrics_revision,
                });
                self.show(&state, index).await;
            }
            Command::InfoChanged => {
                if !state.is_playing() {
                    self.show_not_playing(&state).await;
                    return;
                }
                if state.track.lyrics.state() != LyricsState::Synced {
                    self.show(&state, None).await;
                    return;
                }
                // A new synced set is announced by the scheduler shortly.
                if let Some(shown) = self.shown {
                    if shown.revision == state.lyrics_revision {
                        self.show(&state, shown.index).await;
                    }
                }
            }
        }
    }

    async fn show(&mut self, state: &PlayerState, index: Option<usize>) {
        match render_line(&state.track.lyrics, index, &self.config) {
            Some(text) => {
                self.animation = None;
                self.write(state, &text).await;
            }
            None if state.is_playing() => {
                if self.animation.is_none() {
                    self.animation = Some(Animation {
                        frame: 1,
                        next: Instant::now(),
                    });
                }
            }
            None => self.show_not_playing(state).await,
        }
    }

    async fn show_not_playing(&mut self, state: &PlayerState) {
        self.animation = None;
        let message = self.config.messages.not_playing.trim().to_string();
        self.write(state, &message).await;
    }

    async fn tick(&mut self) {
        let Some(animation) = self.animation else {
            return;
        };
        let state = self.player.snapshot().await;
        if !state.is_playing() {
            self.show_not_playing(&state).await;
            return;
        }

        let text = animation_frame(state.track.lyrics.state(), animation.frame, &self.config);
        self.write(&state, &text).await;
        self.animation = Some(Animation {
            frame: next_frame(animation.frame, self.config.instrumental.max_symbols),
            next: Instant::now() + self.interval,
        });
    }

    /// Write unless the rendered output equals the previous write.
    async fn write(&mut self, state: &PlayerState, text: &str) {
        let out = finish(text, state, &self.config);
        if self.last.as_deref() == Some(out.as_str()) {
            return;
        }
        if let Err(e) = self.sink.write(&out).await {
            warn!(target: LOG_TARGET, "Failed to write output: {}", e);
        }
        self.last = Some(out);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricsync_core::{Lyric, LyricsData, PlaybackStatus, Track, TrackMetadata};
    use std::sync::{Arc, Mutex};

    struct Harness {
        output: PipedOutput,
        player: SharedPlayer,
        lines: Arc<Mutex<Vec<String>>>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    }

    impl Harness {
        fn new(config: PipedConfig) -> Self {
            let player = SharedPlayer::new();
            let lines = Arc::new(Mutex::new(Vec::new()));
            let cancel = CancellationToken::new();
            let (output, task) = PipedOutput::spawn_with_sink(
                config,
                player.clone(),
                Sink::Capture(lines.clone()),
                cancel.clone(),
            );
            Self {
                output,
                player,
                lines,
                cancel,
                task,
            }
        }

        async fn set(&self, status: PlaybackStatus, lyrics: LyricsData) {
            self.player
                .update(|state| {
                    state.status = status;
                    state.track = Track::new(TrackMetadata {
                        title: "Song".to_string(),
                        artists: vec!["Artist".to_string()],
                        album: String::new(),
                        duration: 100.0,
                    });
                    state.install_lyrics(lyrics);
                })
                .await;
        }

        fn written(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        async fn settle(&self) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.task.await.unwrap();
        }
    }

    fn synced() -> LyricsData {
        LyricsData::synced(vec![
            Lyric::new(1.0, "First"),
            Lyric::new(2.0, ""),
            Lyric::new(3.0, "Third"),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_writes_line() {
        let h = Harness::new(PipedConfig::default());
        h.set(PlaybackStatus::Playing, synced()).await;

        h.output.display_lyric(Some(0));
        h.settle().await;
        h.output.display_lyric(Some(2));
        h.settle().await;

        assert_eq!(h.written(), vec!["First\n", "Third\n"]);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_line_animates() {
        let h = Harness::new(PipedConfig::default());
        h.set(PlaybackStatus::Playing, synced()).await;

        h.output.display_lyric(Some(1));
        h.settle().await;
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(
            h.written(),
            vec!["\u{266a}\n", "\u{266a}\u{266a}\n", "\u{266a}\u{266a}\u{266a}\n"]
        );

        h.output.display_lyric(Some(2));
        h.settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.written().last().map(String::as_str), Some("Third\n"));
        assert_eq!(h.written().len(), 4);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_shows_message() {
        let h = Harness::new(PipedConfig::default());
        h.set(PlaybackStatus::Playing, LyricsData::loading()).await;

        h.output.on_player_info_changed();
        h.settle().await;

        assert_eq!(h.written(), vec!["Getting lyrics... \u{266a}\n"]);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_writes_not_playing_once() {
        let mut config = PipedConfig::default();
        config.messages.not_playing = "Paused".to_string();
        let h = Harness::new(config);
        h.set(PlaybackStatus::Playing, synced()).await;
        h.output.display_lyric(Some(0));
        h.settle().await;

        h.player.update(|s| s.status = PlaybackStatus::Paused).await;
        h.output.on_player_info_changed();
        h.output.on_player_info_changed();
        h.settle().await;
        assert_eq!(h.written(), vec!["First\n", "Paused\n"]);

        // Resuming redraws the line the engine last asked for.
        h.player.update(|s| s.status = PlaybackStatus::Playing).await;
        h.output.on_player_info_changed();
        h.settle().await;
        assert_eq!(h.written(), vec!["First\n", "Paused\n", "First\n"]);
        h.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_synced_set_waits_for_engine() {
        let h = Harness::new(PipedConfig::default());
        h.set(PlaybackStatus::Playing, synced()).await;
        h.output.display_lyric(Some(2));
        h.settle().await;

        h.set(PlaybackStatus::Playing, synced()).await;
        h.output.on_player_info_changed();
        h.settle().await;
        assert_eq!(h.written(), vec!["Third\n"]);
        h.stop().await;
    }

    #[tokio::test]
    async fn test_file_sink_replaces_contents() {
        let dir = std::env::temp_dir().join(format!("lyricsync-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lyrics.txt");
        let config = PipedConfig {
            destination: path.to_string_lossy().into_owned(),
            ..PipedConfig::default()
        };

        let sink = Sink::from_config(&config);
        sink.write("one\n").await.unwrap();
        sink.write("two\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two\n");
        let leftovers = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(leftovers, 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
