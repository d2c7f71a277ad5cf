use clap::Parser;
use lyricsync_core::Config;
use std::path::PathBuf;

/// Print synchronized lyrics for the song playing in any MPRIS player.
#[derive(Debug, Parser)]
#[command(name = "lyricsync", version, about)]
pub struct Cli {
    /// Config file to use instead of ~/.config/lyricsync/config.toml
    #[arg(short, long, env = "LYRICSYNC_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write a commented config template to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub config_gen: Option<PathBuf>,

    /// Directory for the lyrics cache database
    #[arg(short = 'd', long, env = "LYRICSYNC_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Where to write lyrics: `stdout` or a file path
    #[arg(short, long, env = "LYRICSYNC_OUTPUT", value_name = "DEST")]
    pub output: Option<String>,

    /// Log filter used when RUST_LOG is unset, e.g. `debug` or `lyricsync=trace`
    #[arg(long, env = "LYRICSYNC_LOG_LEVEL", value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Do not write a log file even if the config enables it
    #[arg(long)]
    pub no_log: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref dir) = self.cache_dir {
            config.cache.dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(ref output) = self.output {
            config.output.piped.destination.clone_from(output);
        }
        if let Some(ref level) = self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.no_log {
            config.logging.file = false;
        }
    }
}
