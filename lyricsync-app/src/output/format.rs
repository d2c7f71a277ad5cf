//! Pure rendering of lyric lines, status messages and JSON records.

use lyricsync_core::config::PipedConfig;
use lyricsync_core::{format_timestamp, LyricsData, LyricsState, PipedFormat, PlayerState};
use serde::Serialize;
use tracing::error;

/// Fill the text template.
fn fill_template(config: &PipedConfig, lyric: &str, multiplier: &str) -> String {
    config
        .text_format
        .replace("{icon}", &config.lyric_icon)
        .replace("{lyric}", lyric)
        .replace("{multiplier}", multiplier)
        .trim()
        .to_string()
}

/// Render line `index` of `lyrics`, or `None` when there is nothing to show
/// (no index, out of range, or a blank line).
///
/// Consecutive repeats of the same text get a multiplier, so the third of
/// three identical lines renders with `x3`.
pub fn render_line(lyrics: &LyricsData, index: Option<usize>, config: &PipedConfig) -> Option<String> {
    let lines = lyrics.lines();
    let index = index?;
    let text = lines.get(index)?.text.as_str();
    if text.trim().is_empty() {
        return None;
    }

    let repeats = lines[..=index]
        .iter()
        .rev()
        .take_while(|line| line.text == text)
        .count();
    let multiplier = if repeats > 1 {
        config
            .multiplier_format
            .replace("{value}", &repeats.to_string())
    } else {
        String::new()
    };

    Some(fill_template(config, text, &multiplier))
}

/// Message shown for a lyrics state while no line is on screen.
pub fn state_message(state: LyricsState, config: &PipedConfig) -> &str {
    let messages = &config.messages;
    match state {
        LyricsState::Synced | LyricsState::Instrumental => "",
        LyricsState::Plain => &messages.no_synced_lyrics,
        LyricsState::NotFound => &messages.not_found,
        LyricsState::Loading => &messages.getting_lyrics,
        LyricsState::Unknown => &messages.error,
    }
}

/// One frame of the instrumental animation: the state message followed by
/// `frame` symbols.
pub fn animation_frame(state: LyricsState, frame: u32, config: &PipedConfig) -> String {
    let mut text = fill_template(config, state_message(state, config), "");
    if !text.is_empty() {
        text.push(' ');
    }
    for _ in 0..frame {
        text.push_str(&config.instrumental.symbol);
    }
    text
}

/// Frame after `frame`, cycling through `1..=max_symbols`.
pub const fn next_frame(frame: u32, max_symbols: u32) -> u32 {
    if frame >= max_symbols {
        1
    } else {
        frame + 1
    }
}

#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    text: &'a str,
    title: &'a str,
    artists: &'a [String],
    album: &'a str,
    position: String,
    duration: String,
    status: String,
    lyrics: &'static str,
}

/// Wrap `text` with track and playback details.
pub fn to_json(text: &str, state: &PlayerState) -> String {
    let metadata = &state.track.metadata;
    let record = JsonRecord {
        text,
        title: &metadata.title,
        artists: &metadata.artists,
        album: &metadata.album,
        position: format_timestamp(state.position),
        duration: format_timestamp(metadata.duration),
        status: state.status.as_str().to_ascii_lowercase(),
        lyrics: state.track.lyrics.state().as_str(),
    };
    serde_json::to_string(&record).unwrap_or_else(|e| {
        error!("Failed to encode JSON output: {}", e);
        "{}".to_string()
    })
}

/// Final text for the sink.
pub fn finish(text: &str, state: &PlayerState, config: &PipedConfig) -> String {
    let mut out = match config.format {
        PipedFormat::Text => text.to_string(),
        PipedFormat::Json => to_json(text, state),
    };
    if config.insert_newline {
        out.push('\n');
    }
    out
}
