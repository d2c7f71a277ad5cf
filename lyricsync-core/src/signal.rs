//! Raw player-bus signals and their normalization into engine messages.
//!
//! Transports translate whatever their bus delivers into [`RawSignal`]s
//! without interpreting them. [`normalize`] reduces those to the closed
//! [`PlayerMessage`] set the engine acts on; anything it cannot read is
//! dropped with a log line.

use crate::error::{CoreError, Result};
use crate::player::{PlaybackStatus, TrackMetadata};
use crate::time::micros_to_secs;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// D-Bus interface whose property changes the engine follows
pub const PLAYER_INTERFACE: &str = "org.mpris.MediaPlayer2.Player";

/// A loosely typed value carried by a raw signal.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
    StrList(Vec<String>),
    Map(HashMap<String, RawValue>),
    Other,
}

impl RawValue {
    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn as_micros(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

/// A signal as received from the player bus.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSignal {
    /// The transport connected and can be queried.
    Ready,
    /// The followed player appeared, vanished or was replaced.
    PlayerChanged,
    /// `Seeked` with its raw body (position in microseconds).
    Seeked { body: Vec<RawValue> },
    /// `PropertiesChanged` on some interface.
    PropertiesChanged {
        interface: String,
        changed: HashMap<String, RawValue>,
    },
}

/// The closed set of player events the engine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMessage {
    Ready,
    PlayerChanged,
    /// New position in seconds
    Seeked(f64),
    PlaybackStatusChanged(PlaybackStatus),
    RateChanged(f64),
    MetadataChanged(TrackMetadata),
}

/// Reduce one raw signal to zero or more messages.
///
/// Property changes yield one message per recognised property, in the order
/// status, rate, metadata.
#[must_use]
pub fn normalize(signal: RawSignal) -> Vec<PlayerMessage> {
    match signal {
        RawSignal::Ready => vec![PlayerMessage::Ready],
        RawSignal::PlayerChanged => vec![PlayerMessage::PlayerChanged],
        RawSignal::Seeked { body } => match body.first().and_then(RawValue::as_micros) {
            Some(micros) => vec![PlayerMessage::Seeked(micros_to_secs(micros))],
            None => {
                warn!("Dropping malformed Seeked signal: {:?}", body);
                Vec::new()
            }
        },
        RawSignal::PropertiesChanged { interface, changed } => {
            if interface != PLAYER_INTERFACE {
                debug!("Ignoring property change on {}", interface);
                return Vec::new();
            }
            normalize_properties(&changed)
        }
    }
}

fn normalize_properties(changed: &HashMap<String, RawValue>) -> Vec<PlayerMessage> {
    let mut messages = Vec::new();

    if let Some(value) = changed.get("PlaybackStatus") {
        match value.as_str().map(str::parse::<PlaybackStatus>) {
            Some(Ok(status)) => messages.push(PlayerMessage::PlaybackStatusChanged(status)),
            _ => warn!("Dropping malformed PlaybackStatus: {:?}", value),
        }
    }

    if let Some(value) = changed.get("Rate") {
        match value.as_f64() {
            Some(rate) if rate.is_finite() => messages.push(PlayerMessage::RateChanged(rate)),
            _ => warn!("Dropping malformed Rate: {:?}", value),
        }
    }

    if let Some(value) = changed.get("Metadata") {
        match value {
            RawValue::Map(map) => {
                messages.push(PlayerMessage::MetadataChanged(metadata_from_raw(map)));
            }
            _ => warn!("Dropping malformed Metadata: {:?}", value),
        }
    }

    if messages.is_empty() {
        debug!("No relevant properties in change: {:?}", changed.keys());
    }
    messages
}

/// Read the `xesam:`/`mpris:` metadata fields the engine uses.
#[must_use]
pub fn metadata_from_raw(map: &HashMap<String, RawValue>) -> TrackMetadata {
    let text = |key: &str| {
        map.get(key)
            .and_then(RawValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let artists = match map.get("xesam:artist") {
        Some(RawValue::StrList(list)) => list.clone(),
        Some(RawValue::Str(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };

    let duration = map
        .get("mpris:length")
        .and_then(RawValue::as_micros)
        .map_or(0.0, |micros| micros_to_secs(micros).max(0.0));

    TrackMetadata {
        title: text("xesam:title"),
        artists,
        album: text("xesam:album"),
        duration,
    }
}

/// Create the channel that carries raw signals into the engine.
#[must_use]
pub fn signal_channel() -> (SignalSender, mpsc::UnboundedReceiver<RawSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, rx)
}

/// Cloneable intake for raw signals.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<RawSignal>,
}

impl SignalSender {
    /// Queue a signal for the engine.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineStopped`] once the engine has shut down.
    pub fn send(&self, signal: RawSignal) -> Result<()> {
        self.tx.send(signal).map_err(|_| CoreError::EngineStopped)
    }
}
