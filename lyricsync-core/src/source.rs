//! Traits for reaching the external media player.

use crate::error::Result;
use crate::player::{PlaybackStatus, TrackMetadata};
use crate::signal::SignalSender;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Reads live state from the currently selected player.
///
/// When no player is selected implementations return neutral values
/// (`Stopped`, position 0, rate 1.0, empty metadata) instead of errors.
#[async_trait]
pub trait PlayerAccessor: Send + Sync {
    async fn playback_status(&self) -> Result<PlaybackStatus>;

    /// Current transport position in seconds.
    async fn position(&self) -> Result<f64>;

    async fn rate(&self) -> Result<f64>;

    async fn metadata(&self) -> Result<TrackMetadata>;
}

/// Delivers raw player signals into the engine.
///
/// Implementations reconnect on their own after transport failures and
/// return from [`SignalTransport::run`] only once cancelled.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    /// Human-readable transport name for logs.
    fn name(&self) -> &'static str;

    /// Run until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns an error only if the transport cannot work at all.
    async fn run(&self, signals: SignalSender) -> Result<()>;

    /// Token that stops [`SignalTransport::run`].
    fn cancel_token(&self) -> CancellationToken;

    /// Request a stop.
    fn stop(&self) {
        self.cancel_token().cancel();
    }
}
