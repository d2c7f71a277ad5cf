//! Hooks that adjust lyrics after they are fetched and before they are shown.

use crate::lyrics::LyricsData;

/// Transforms freshly fetched lyrics in place, e.g. romanization.
///
/// Implementations must leave timestamps untouched.
pub trait LyricsPostProcessor: Send + Sync {
    fn configure(&self, lyrics: &mut LyricsData);
}

/// Leaves lyrics as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl LyricsPostProcessor for Passthrough {
    fn configure(&self, _lyrics: &mut LyricsData) {}
}

/// Trims trailing whitespace and collapses runs of inner whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceNormalizer;

impl LyricsPostProcessor for WhitespaceNormalizer {
    fn configure(&self, lyrics: &mut LyricsData) {
        for text in lyrics.texts_mut() {
            let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
            *text = normalized;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::Lyric;

    #[test]
    fn test_passthrough_keeps_lyrics() {
        let mut lyrics = LyricsData::synced(vec![Lyric::new(1.0, "  spaced  ")]);
        let before = lyrics.clone();
        Passthrough.configure(&mut lyrics);
        assert_eq!(lyrics, before);
    }

    #[test]
    fn test_whitespace_normalizer() {
        let mut lyrics = LyricsData::synced(vec![Lyric::new(1.0, "  a \t b  ")]);
        WhitespaceNormalizer.configure(&mut lyrics);
        assert_eq!(lyrics.lines()[0], Lyric::new(1.0, "a b"));
    }
}
