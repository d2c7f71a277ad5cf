//! Client side of `org.mpris.MediaPlayer2.Player`.

use std::collections::HashMap;
use zbus::proxy;
use zbus::zvariant::OwnedValue;

pub const PLAYER_PATH: &str = "/org/mpris/MediaPlayer2";

#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2",
    gen_blocking = false
)]
pub trait Player {
    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    /// Microseconds. Players do not signal changes, so this is always polled.
    #[zbus(property(emits_changed_signal = "false"))]
    fn position(&self) -> zbus::Result<i64>;

    #[zbus(property)]
    fn rate(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(signal)]
    fn seeked(&self, position: i64) -> zbus::Result<()>;
}
