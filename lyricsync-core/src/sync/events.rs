//! Event consumer: applies normalized player messages in arrival order.

use super::EngineContext;
use crate::lyrics::LyricsData;
use crate::player::{PlaybackStatus, Track, TrackMetadata};
use crate::signal::{normalize, PlayerMessage, RawSignal};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) async fn run(
    ctx: Arc<EngineContext>,
    mut signals: mpsc::UnboundedReceiver<RawSignal>,
    cancel: CancellationToken,
) {
    info!("Player event consumer started");
    loop {
        let signal = tokio::select! {
            () = cancel.cancelled() => break,
            signal = signals.recv() => signal,
        };
        let Some(signal) = signal else {
            break;
        };
        for message in normalize(signal) {
            handle(&ctx, message).await;
        }
    }
    info!("Player event consumer stopped");
}

pub(crate) async fn handle(ctx: &EngineContext, message: PlayerMessage) {
    debug!("Player message: {:?}", message);
    match message {
        PlayerMessage::Ready | PlayerMessage::PlayerChanged => refresh(ctx).await,
        PlayerMessage::Seeked(position) => {
            ctx.player.update(|state| state.position = position).await;
            ctx.sync.request();
        }
        PlayerMessage::PlaybackStatusChanged(status) => {
            ctx.player
                .update(|state| {
                    state.status = status;
                    if status == PlaybackStatus::Stopped {
                        state.position = 0.0;
                    }
                })
                .await;
            ctx.output.on_player_info_changed();
            ctx.sync.request();
        }
        PlayerMessage::RateChanged(rate) => {
            ctx.player.update(|state| state.rate = rate).await;
            ctx.sync.request();
        }
        PlayerMessage::MetadataChanged(metadata) => {
            let refetch = apply_metadata(ctx, metadata).await;
            ctx.output.on_player_info_changed();
            if refetch {
                ctx.fetch.trigger();
            }
            ctx.sync.request();
        }
    }
}

/// Replace the track fields. Returns whether the lyrics must be refetched.
async fn apply_metadata(ctx: &EngineContext, metadata: TrackMetadata) -> bool {
    ctx.player
        .update(|state| {
            let same_track = state.track.fingerprint() == metadata.fingerprint();
            if same_track && state.track.lyrics.is_resolved() {
                state.track.metadata = metadata;
                return false;
            }
            info!(
                "Track changed: {} - {}",
                metadata.artist_line(),
                metadata.title
            );
            state.track.metadata = metadata;
            state.install_lyrics(LyricsData::loading());
            true
        })
        .await
}

/// Re-read everything from the player after (re)connecting or switching.
async fn refresh(ctx: &EngineContext) {
    let accessor = &ctx.accessor;
    let status = accessor.playback_status().await.unwrap_or_else(|e| {
        warn!("Failed to read playback status: {}", e);
        PlaybackStatus::Stopped
    });
    let position = accessor.position().await.unwrap_or_else(|e| {
        warn!("Failed to read position: {}", e);
        0.0
    });
    let rate = accessor.rate().await.unwrap_or_else(|e| {
        warn!("Failed to read rate: {}", e);
        1.0
    });
    let metadata = accessor.metadata().await.unwrap_or_else(|e| {
        warn!("Failed to read metadata: {}", e);
        TrackMetadata::default()
    });

    ctx.player
        .update(|state| {
            state.status = status;
            state.position = position;
            state.rate = rate;
            if state.track.fingerprint() != metadata.fingerprint() {
                state.track = Track::new(metadata);
                state.lyrics_revision = state.lyrics_revision.wrapping_add(1);
            } else {
                state.track.metadata = metadata;
            }
        })
        .await;

    if status == PlaybackStatus::Stopped {
        debug!("No active playback after refresh");
        ctx.timer.stop();
        ctx.output.display_lyric(None);
        return;
    }

    ctx.output.on_player_info_changed();
    ctx.fetch.trigger();
    ctx.sync.request();
}
