//! Boundary between the engine and whatever displays lyrics.

/// Receives display commands from the engine.
///
/// Calls come from engine tasks and must return quickly; implementations
/// forward work to their own task instead of doing I/O inline.
pub trait OutputController: Send + Sync {
    /// Track, status or lyric set changed. Re-read the shared player state.
    fn on_player_info_changed(&self);

    /// Show the line at `index` of the current synced lyrics, or nothing.
    fn display_lyric(&self, index: Option<usize>);
}
