//! Output surfaces. The variant is chosen once at startup from the config.

mod format;
mod piped;

pub use piped::PipedOutput;

use lyricsync_core::config::OutputConfig;
use lyricsync_core::{OutputController, OutputType, SharedPlayer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub enum Output {
    Piped(PipedOutput),
}

impl Output {
    /// Build the configured output and spawn its writer task.
    pub fn spawn(
        config: &OutputConfig,
        player: SharedPlayer,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        match config.kind {
            OutputType::Piped => {
                let (output, task) = PipedOutput::spawn(config.piped.clone(), player, cancel);
                (Self::Piped(output), task)
            }
        }
    }
}

impl OutputController for Output {
    fn on_player_info_changed(&self) {
        match self {
            Self::Piped(output) => output.on_player_info_changed(),
        }
    }

    fn display_lyric(&self, index: Option<usize>) {
        match self {
            Self::Piped(output) => output.display_lyric(index),
        }
    }
}
