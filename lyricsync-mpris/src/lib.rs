//! MPRIS (D-Bus) integration: reads live state from the selected media
//! player and streams its signals into the lyricsync engine.

mod accessor;
mod error;
mod proxy;
mod selection;
mod transport;
mod value;

pub use accessor::MprisAccessor;
pub use error::{MprisError, Result};
pub use selection::{is_mpris_name, player_allowed, MPRIS_NAME_PREFIX};
pub use transport::{reconnect_backoff, MprisTransport};
