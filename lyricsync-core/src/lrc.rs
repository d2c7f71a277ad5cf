//! LRC lyric file parsing.

use crate::error::{CoreError, Result};
use crate::lyrics::{Lyric, LyricsData};

/// Parsed LRC file
#[derive(Debug, Clone, Default)]
pub struct LrcFile {
    pub metadata: LrcMetadata,
    /// Timed lines, ordered by time, offset tag already applied.
    pub lines: Vec<Lyric>,
}

/// LRC metadata from ID tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    /// Declared length in seconds.
    pub length: Option<f64>,
    /// Milliseconds, positive values make lines appear earlier.
    pub offset_ms: i64,
}

impl LrcFile {
    /// Parse LRC text.
    ///
    /// Lines may carry several leading time tags (`[00:05.00][00:15.00]text`),
    /// each producing its own lyric. Enhanced word tags (`<mm:ss.xx>`) are
    /// stripped, keeping only the words.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LrcParseError`] if the input contains no timed line.
    pub fn parse(input: &str) -> Result<Self> {
        let mut metadata = LrcMetadata::default();
        let mut lines = Vec::new();

        for raw in input.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((tag, value)) = parse_id_tag(line) {
                match tag.to_ascii_lowercase().as_str() {
                    "ti" => metadata.title = Some(value),
                    "ar" => metadata.artist = Some(value),
                    "al" => metadata.album = Some(value),
                    "au" => metadata.author = Some(value),
                    "length" => metadata.length = parse_timestamp(&value),
                    "offset" => metadata.offset_ms = value.parse().unwrap_or(0),
                    _ => {}
                }
                continue;
            }

            parse_lyric_line(line, &mut lines);
        }

        if lines.is_empty() {
            return Err(CoreError::LrcParseError {
                reason: "no timed lines".to_string(),
            });
        }

        if metadata.offset_ms != 0 {
            #[allow(clippy::cast_precision_loss)]
            let shift = metadata.offset_ms as f64 / 1000.0;
            for lyric in &mut lines {
                lyric.time = (lyric.time - shift).max(0.0);
            }
        }

        // Stable: identical timestamps keep file order.
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));

        Ok(Self { metadata, lines })
    }

    /// Convert into synced lyrics data.
    #[must_use]
    pub fn into_lyrics(self) -> LyricsData {
        LyricsData::synced(self.lines)
    }
}

/// Parse an ID tag like `[ti:Title]`. Time tags are rejected.
fn parse_id_tag(line: &str) -> Option<(String, String)> {
    let content = line.strip_prefix('[')?;
    let end = content.find(']')?;
    let content = &content[..end];
    let (tag, value) = content.split_once(':')?;

    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some((tag.trim().to_string(), value.trim().to_string()))
}

/// Collect every leading time tag of `line` and emit one lyric per tag.
fn parse_lyric_line(line: &str, out: &mut Vec<Lyric>) {
    let mut remaining = line;
    let mut times = Vec::new();

    while let Some(rest) = remaining.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            break;
        };
        let Some(time) = parse_timestamp(&rest[..end]) else {
            break;
        };
        times.push(time);
        remaining = &rest[end + 1..];
    }

    if times.is_empty() {
        return;
    }

    let text = sanitize_text(remaining);
    out.extend(times.into_iter().map(|time| Lyric::new(time, text.clone())));
}

/// Parse `mm:ss`, `mm:ss.xx`, `mm:ss.xxx` or `mm:ss:xx` into seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.trim().split(':').collect();

    match parts.as_slice() {
        [minutes, seconds] => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: f64 = seconds.parse().ok()?;
            (seconds.is_finite() && seconds >= 0.0).then(|| f64::from(minutes) * 60.0 + seconds)
        }
        [minutes, seconds, hundredths] => {
            let minutes: u32 = minutes.parse().ok()?;
            let seconds: u32 = seconds.parse().ok()?;
            let hundredths: u32 = hundredths.parse().ok()?;
            Some(f64::from(minutes) * 60.0 + f64::from(seconds) + f64::from(hundredths) / 100.0)
        }
        _ => None,
    }
}

/// Strip enhanced word tags and stray whitespace.
fn sanitize_text(text: &str) -> String {
    if !text.contains('<') {
        return text.trim().to_string();
    }

    let mut words = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if let Some(rest) = remaining.strip_prefix('<') {
            if let Some(end) = rest.find('>') {
                if parse_timestamp(&rest[..end]).is_some() {
                    remaining = &rest[end + 1..];
                    continue;
                }
            }
        }
        let next = remaining
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '<')
            .map_or(remaining.len(), |(i, _)| i);
        let word = remaining[..next].trim();
        if !word.is_empty() {
            words.push(word);
        }
        remaining = &remaining[next..];
    }
    words.join(" ")
}

/// Format seconds as `mm:ss`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_timestamp(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::LyricsState;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_simple_lrc() {
        let result = LrcFile::parse("[00:12.34]Hello world").unwrap();
        assert_eq!(result.lines.len(), 1);
        assert!(approx(result.lines[0].time, 12.34));
        assert_eq!(result.lines[0].text, "Hello world");
    }

    #[test]
    fn test_parse_id_tags() {
        let input = r"
[ti:Song Title]
[ar:Artist Name]
[al:Album Name]
[length:03:25]
[00:05.00]Lyrics here
";
        let result = LrcFile::parse(input).unwrap();
        assert_eq!(result.metadata.title.as_deref(), Some("Song Title"));
        assert_eq!(result.metadata.artist.as_deref(), Some("Artist Name"));
        assert_eq!(result.metadata.album.as_deref(), Some("Album Name"));
        assert!(approx(result.metadata.length.unwrap(), 205.0));
    }

    #[test]
    fn test_positive_offset_shifts_earlier() {
        let result = LrcFile::parse("[offset:500]\n[00:10.00]Test").unwrap();
        assert!(approx(result.lines[0].time, 9.5));
    }

    #[test]
    fn test_negative_offset_shifts_later() {
        let result = LrcFile::parse("[offset:-500]\n[00:10.00]Test").unwrap();
        assert!(approx(result.lines[0].time, 10.5));
    }

    #[test]
    fn test_multi_timestamp_line_sorted() {
        let input = "[00:15.00]Second\n[00:05.00][00:20.00]Chorus";
        let result = LrcFile::parse(input).unwrap();
        let texts: Vec<_> = result.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Chorus", "Second", "Chorus"]);
    }

    #[test]
    fn test_alternative_timestamp_formats() {
        let result = LrcFile::parse("[00:12:34]a\n[01:02]b\n[00:03.456]c").unwrap();
        assert!(approx(result.lines[0].time, 3.456));
        assert!(approx(result.lines[1].time, 12.34));
        assert!(approx(result.lines[2].time, 62.0));
    }

    #[test]
    fn test_enhanced_words_stripped() {
        let result = LrcFile::parse("[00:12.34] <00:12.34> Hello <00:13.00> world").unwrap();
        assert_eq!(result.lines[0].text, "Hello world");
    }

    #[test]
    fn test_empty_text_line_kept() {
        let result = LrcFile::parse("[00:01.00]Intro\n[00:04.00]\r\n[00:08.00]Verse").unwrap();
        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.lines[1].text, "");
    }

    #[test]
    fn test_no_timed_lines_is_error() {
        assert!(LrcFile::parse("just some words").is_err());
        assert!(LrcFile::parse("[ti:Only tags]").is_err());
    }

    #[test]
    fn test_into_lyrics_is_synced() {
        let data = LrcFile::parse("[00:02.00]b\n[00:01.00]a").unwrap().into_lyrics();
        assert_eq!(data.state(), LyricsState::Synced);
        assert_eq!(data.lines()[0].text, "a");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(75.9), "01:15");
        assert_eq!(format_timestamp(-4.0), "00:00");
        assert_eq!(format_timestamp(3600.0), "60:00");
    }
}
