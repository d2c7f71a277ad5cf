use crate::accessor::{ActivePlayer, MprisAccessor};
use crate::error::{MprisError, Result};
use crate::proxy::{PlayerProxy, PLAYER_PATH};
use crate::selection::{choose_player, is_mpris_name};
use crate::value::to_raw;
use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use lyricsync_core::config::PlayerConfig;
use lyricsync_core::{RawSignal, RawValue, SignalSender, SignalTransport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::fdo::{DBusProxy, PropertiesProxy};
use zbus::proxy::CacheProperties;
use zbus::Connection;

const LOG_TARGET: &str = "lyricsync::mpris";

const BASE_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before reconnect attempt `failures` (0-based): 100 ms doubled per
/// failure, capped at 30 s.
#[must_use]
pub fn reconnect_backoff(failures: u32) -> Duration {
    BASE_BACKOFF
        .checked_mul(2_u32.saturating_pow(failures.min(16)))
        .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

/// Streams MPRIS signals from the session bus into the engine.
///
/// Follows a single player chosen by the include/exclude filters and
/// switches when players appear or vanish.
pub struct MprisTransport {
    filter: PlayerConfig,
    active: ActivePlayer,
    cancel_token: CancellationToken,
}

impl MprisTransport {
    #[must_use]
    pub fn new(filter: PlayerConfig) -> Self {
        Self {
            filter,
            active: ActivePlayer::default(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Accessor reading from whichever player this transport follows
    #[must_use]
    pub fn accessor(&self) -> MprisAccessor {
        MprisAccessor::new(self.active.clone())
    }

    /// One connection lifetime. Returns `Ok` once cancelled or once the
    /// engine stops listening.
    async fn session(&self, signals: &SignalSender, failures: &mut u32) -> Result<()> {
        let connection = Connection::session().await?;
        let dbus = DBusProxy::new(&connection).await?;
        let mut owner_changes = dbus.receive_name_owner_changed().await?;

        self.select_player(&connection, &dbus).await?;
        let mut player_signals = self.player_signals(&connection).await?;

        *failures = 0;
        info!(target: LOG_TARGET, "Connected to the session bus");
        if signals.send(RawSignal::Ready).is_err() {
            return Ok(());
        }

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => return Ok(()),
                change = owner_changes.next() => {
                    let change = change.ok_or(MprisError::StreamEnded { stream: "NameOwnerChanged" })?;
                    let args = change.args()?;
                    if !is_mpris_name(args.name().as_str()) {
                        continue;
                    }
                    debug!(target: LOG_TARGET, "Owner changed for {}", args.name());
                    if self.select_player(&connection, &dbus).await? {
                        player_signals = self.player_signals(&connection).await?;
                        if signals.send(RawSignal::PlayerChanged).is_err() {
                            return Ok(());
                        }
                    }
                }
                signal = next_signal(&mut player_signals) => {
                    let signal = signal.ok_or(MprisError::StreamEnded { stream: "player" })?;
                    debug!(target: LOG_TARGET, "Player signal: {:?}", signal);
                    if signals.send(signal).is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Re-evaluate which player to follow. Returns whether it changed.
    async fn select_player(&self, connection: &Connection, dbus: &DBusProxy<'_>) -> Result<bool> {
        let names: Vec<String> = dbus
            .list_names()
            .await?
            .iter()
            .map(|name| name.as_str().to_owned())
            .collect();
        let current = self.active.name().await;
        let chosen = choose_player(&names, current.as_deref(), &self.filter).map(str::to_owned);

        if chosen == current {
            return Ok(false);
        }

        match chosen {
            Some(name) => {
                info!(target: LOG_TARGET, "Following player {}", name);
                let proxy = PlayerProxy::builder(connection)
                    .destination(name)?
                    .cache_properties(CacheProperties::No)
                    .build()
                    .await?;
                self.active.set(Some(proxy)).await;
            }
            None => {
                info!(target: LOG_TARGET, "No matching player on the bus");
                self.active.set(None).await;
            }
        }
        Ok(true)
    }

    /// `Seeked` and `PropertiesChanged` of the followed player, merged.
    async fn player_signals(
        &self,
        connection: &Connection,
    ) -> Result<Option<BoxStream<'static, RawSignal>>> {
        let Some(player) = self.active.get().await else {
            return Ok(None);
        };

        let seeked = player.receive_seeked().await?.filter_map(|signal| {
            future::ready(match signal.args() {
                Ok(args) => Some(RawSignal::Seeked {
                    body: vec![RawValue::Int(*args.position())],
                }),
                Err(e) => {
                    warn!(target: LOG_TARGET, "Unreadable Seeked signal: {}", e);
                    None
                }
            })
        });

        let properties = PropertiesProxy::builder(connection)
            .destination(player.inner().destination().to_owned())?
            .path(PLAYER_PATH)?
            .build()
            .await?;
        let changes = properties
            .receive_properties_changed()
            .await?
            .filter_map(|signal| {
                future::ready(match signal.args() {
                    Ok(args) => Some(RawSignal::PropertiesChanged {
                        interface: args.interface_name().to_string(),
                        changed: args
                            .changed_properties()
                            .iter()
                            .map(|(name, value)| ((*name).to_string(), to_raw(value)))
                            .collect(),
                    }),
                    Err(e) => {
                        warn!(target: LOG_TARGET, "Unreadable PropertiesChanged signal: {}", e);
                        None
                    }
                })
            });

        Ok(Some(stream::select(seeked, changes).boxed()))
    }
}

async fn next_signal(signals: &mut Option<BoxStream<'static, RawSignal>>) -> Option<RawSignal> {
    match signals {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

#[async_trait]
impl SignalTransport for MprisTransport {
    fn name(&self) -> &'static str {
        "mpris"
    }

    async fn run(&self, signals: SignalSender) -> lyricsync_core::Result<()> {
        info!(target: LOG_TARGET, "Starting MPRIS transport");
        let mut failures = 0_u32;

        loop {
            match self.session(&signals, &mut failures).await {
                Ok(()) => break,
                Err(e) => {
                    self.active.set(None).await;
                    let backoff = reconnect_backoff(failures);
                    failures = failures.saturating_add(1);
                    warn!(
                        target: LOG_TARGET,
                        "MPRIS session failed (attempt {}): {}, reconnecting in {:?}",
                        failures, e, backoff
                    );
                    if signals.send(RawSignal::PlayerChanged).is_err() {
                        break;
                    }
                    tokio::select! {
                        () = self.cancel_token.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        self.active.set(None).await;
        info!(target: LOG_TARGET, "MPRIS transport stopped");
        Ok(())
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}
