use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single timed lyric line. Times are in seconds from track start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lyric {
    pub time: f64,
    pub text: String,
}

impl Lyric {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }
}

/// What kind of lyrics are known for the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsState {
    Synced,
    Plain,
    Instrumental,
    NotFound,
    Loading,
    #[default]
    Unknown,
}

impl LyricsState {
    /// Stable identifier used in the cache and the config file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Plain => "plain",
            Self::Instrumental => "instrumental",
            Self::NotFound => "not_found",
            Self::Loading => "loading",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LyricsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LyricsState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(Self::Synced),
            "plain" => Ok(Self::Plain),
            "instrumental" => Ok(Self::Instrumental),
            "not_found" => Ok(Self::NotFound),
            "loading" => Ok(Self::Loading),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown lyrics state: {other}")),
        }
    }
}

/// Lyric lines plus the state describing them.
///
/// Synced lines are always ordered by time; construct through
/// [`LyricsData::synced`] to keep that guarantee.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LyricsData {
    lines: Vec<Lyric>,
    state: LyricsState,
}

impl LyricsData {
    /// Timed lyrics. Lines are stably sorted by time, so lines sharing a
    /// timestamp keep their original relative order.
    #[must_use]
    pub fn synced(mut lines: Vec<Lyric>) -> Self {
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            lines,
            state: LyricsState::Synced,
        }
    }

    /// Untimed lyrics, one entry per text line.
    #[must_use]
    pub fn plain(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| Lyric::new(0.0, l.trim_end())).collect(),
            state: LyricsState::Plain,
        }
    }

    #[must_use]
    pub const fn instrumental() -> Self {
        Self::empty(LyricsState::Instrumental)
    }

    #[must_use]
    pub const fn not_found() -> Self {
        Self::empty(LyricsState::NotFound)
    }

    #[must_use]
    pub const fn loading() -> Self {
        Self::empty(LyricsState::Loading)
    }

    #[must_use]
    pub const fn unknown() -> Self {
        Self::empty(LyricsState::Unknown)
    }

    const fn empty(state: LyricsState) -> Self {
        Self {
            lines: Vec::new(),
            state,
        }
    }

    /// Rebuild from persisted parts. Synced lines are re-sorted.
    #[must_use]
    pub fn from_parts(state: LyricsState, lines: Vec<Lyric>) -> Self {
        if state == LyricsState::Synced {
            Self::synced(lines)
        } else {
            Self { lines, state }
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[Lyric] {
        &self.lines
    }

    #[must_use]
    pub const fn state(&self) -> LyricsState {
        self.state
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&Lyric> {
        self.lines.get(index)
    }

    /// True once a fetch has settled on an answer for the track.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self.state, LyricsState::Loading | LyricsState::Unknown)
    }

    /// Mutable access to the line texts. Timestamps stay untouched so the
    /// ordering invariant holds.
    pub fn texts_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.lines.iter_mut().map(|l| &mut l.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_sorts_stably() {
        let data = LyricsData::synced(vec![
            Lyric::new(20.0, "c"),
            Lyric::new(10.0, "a"),
            Lyric::new(10.0, "b"),
            Lyric::new(0.0, "start"),
        ]);
        let texts: Vec<_> = data.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["start", "a", "b", "c"]);
        assert_eq!(data.state(), LyricsState::Synced);
    }

    #[test]
    fn test_plain_splits_lines() {
        let data = LyricsData::plain("one\ntwo\r\nthree");
        assert_eq!(data.lines().len(), 3);
        assert_eq!(data.line(1).map(|l| l.text.as_str()), Some("two"));
        assert_eq!(data.state(), LyricsState::Plain);
    }

    #[test]
    fn test_resolved_states() {
        assert!(!LyricsData::loading().is_resolved());
        assert!(!LyricsData::unknown().is_resolved());
        assert!(LyricsData::not_found().is_resolved());
        assert!(LyricsData::instrumental().is_resolved());
    }

    #[test]
    fn test_state_from_str() {
        for state in [
            LyricsState::Synced,
            LyricsState::Plain,
            LyricsState::Instrumental,
            LyricsState::NotFound,
            LyricsState::Loading,
            LyricsState::Unknown,
        ] {
            assert_eq!(state.as_str().parse::<LyricsState>(), Ok(state));
        }
        assert!("karaoke".parse::<LyricsState>().is_err());
    }

    #[test]
    fn test_texts_mut_keeps_times() {
        let mut data = LyricsData::synced(vec![Lyric::new(1.0, "hello")]);
        for text in data.texts_mut() {
            *text = text.to_uppercase();
        }
        assert_eq!(data.lines()[0], Lyric::new(1.0, "HELLO"));
    }
}
