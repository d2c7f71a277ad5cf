mod cli;
mod error;
mod output;

use crate::cli::Cli;
use crate::error::AppError;
use crate::output::Output;
use clap::Parser;
use lyricsync_core::paths::{log_file_path, lyrics_cache_db_path};
use lyricsync_core::{
    Config, CoreError, EngineDeps, EngineSettings, LyricsCache, LyricsFetcher, LyricsProvider,
    LyricsProviderType, SharedPlayer, SignalTransport, SyncEngine, WhitespaceNormalizer,
};
use lyricsync_lyrics_lrclib::LrclibProvider;
use lyricsync_mpris::MprisTransport;
use std::fs::File;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(ref path) = cli.config_gen {
        return match Config::write_template(path) {
            Ok(()) => {
                eprintln!("Config template written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to write config template: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(CoreError::ConfigParseError(parse_error)) => {
            eprintln!("Config file has syntax errors:\n{parse_error}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    init_tracing(&config.logging.level, config.logging.file);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(mut config: Config) -> Result<(), AppError> {
    let issues = config.validate();
    for issue in issues.iter().filter(|issue| !issue.fatal) {
        warn!("Config: {}", issue);
    }
    let fatal: Vec<_> = issues.into_iter().filter(|issue| issue.fatal).collect();
    if !fatal.is_empty() {
        return Err(AppError::InvalidConfig(fatal));
    }

    let runtime = tokio::runtime::Runtime::new().map_err(AppError::Runtime)?;

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    runtime.block_on(serve(config, cancel_token))
}

async fn serve(config: Config, cancel_token: CancellationToken) -> Result<(), AppError> {
    let cache = open_cache(&config).await;

    let providers = create_providers(&config);
    let provider_names: Vec<_> = providers.iter().map(|p| p.name()).collect();
    info!(
        "Initialized {} lyrics provider(s): {:?}",
        providers.len(),
        provider_names
    );

    let fetcher = Arc::new(LyricsFetcher::new(
        providers,
        cache.clone(),
        config.cache.store_condition.clone(),
    ));

    let player = SharedPlayer::new();
    let (output, writer_task) = Output::spawn(&config.output, player.clone(), cancel_token.clone());

    let transport = Arc::new(MprisTransport::new(config.player.clone()));

    let engine = SyncEngine::new(
        EngineDeps {
            player,
            accessor: Arc::new(transport.accessor()),
            fetcher,
            postprocessor: Arc::new(WhitespaceNormalizer),
            output: Arc::new(output),
        },
        EngineSettings {
            timestamp_offset: config.lyrics.timestamp_offset,
        },
    );
    let handle = engine.start(&cancel_token);

    let transport_task = {
        let transport = transport.clone();
        let signals = handle.signal_sender();
        tokio::spawn(async move {
            if let Err(e) = transport.run(signals).await {
                error!("{} transport failed: {}", transport.name(), e);
            }
        })
    };

    cancel_token.cancelled().await;

    transport.stop();
    if let Err(e) = transport_task.await {
        warn!("Transport task ended abnormally: {}", e);
    }
    handle.shutdown().await;
    if let Err(e) = writer_task.await {
        warn!("Output task ended abnormally: {}", e);
    }

    if let Some(cache) = cache {
        if let Err(e) = cache.checkpoint().await {
            warn!("Failed to checkpoint lyrics cache: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Open the lyrics cache, running without one if it is disabled or broken.
async fn open_cache(config: &Config) -> Option<Arc<LyricsCache>> {
    if !config.cache.enabled {
        info!("Lyrics cache disabled");
        return None;
    }

    let path = lyrics_cache_db_path(&config.cache.resolved_dir());
    match LyricsCache::open(&path, config.cache.life_span()).await {
        Ok(cache) => {
            match cache.cleanup().await {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} expired cache entries", removed),
                Err(e) => warn!("Cache cleanup failed: {}", e),
            }
            Some(Arc::new(cache))
        }
        Err(e) => {
            error!(
                "Failed to open lyrics cache at {}: {}, continuing without it",
                path.display(),
                e
            );
            None
        }
    }
}

fn create_providers(config: &Config) -> Vec<Box<dyn LyricsProvider>> {
    config
        .lyrics
        .providers
        .iter()
        .filter_map(|provider_type| -> Option<Box<dyn LyricsProvider>> {
            match provider_type {
                LyricsProviderType::Lrclib => {
                    info!("Initializing LRCLIB provider");
                    match LrclibProvider::new() {
                        Ok(provider) => Some(Box::new(provider)),
                        Err(e) => {
                            error!("Failed to create LRCLIB provider: {}", e);
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

/// Initialize tracing with stderr output and optional file logging
fn init_tracing(level: &str, file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
