//! Lyric advancement scheduler.
//!
//! Each timer fire picks the line for the current position estimate, tells
//! the output about it when something visible changed, advances the
//! estimate to the next line boundary and re-arms the timer for that
//! boundary. After the last line the timer is stopped until an external
//! trigger (seek, sync, new lyrics) re-arms it. Between fires the estimate
//! is not touched; drift is corrected by the position synchronizer.

use super::EngineContext;
use crate::lyrics::{Lyric, LyricsState};
use crate::time::secs_to_duration;
use crate::timer::TimerFires;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Line picked for a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSelection {
    /// Index of the current line, `None` before the first line.
    pub index: Option<usize>,
    /// Offset-adjusted timestamp of the current line.
    pub current_time: Option<f64>,
    /// Offset-adjusted start of the following line, `None` on the last line.
    pub next_boundary: Option<f64>,
}

/// Pick the last line whose adjusted time is at or before `position`.
///
/// Lines must be sorted by time. Among equal timestamps the later index wins.
#[must_use]
pub fn select_line(lines: &[Lyric], position: f64, offset: f64) -> LineSelection {
    let mut index = None;
    for (i, line) in lines.iter().enumerate() {
        if line.time + offset > position {
            break;
        }
        index = Some(i);
    }

    let next = index.map_or(0, |i| i + 1);
    LineSelection {
        index,
        current_time: index.map(|i| lines[i].time + offset),
        next_boundary: lines.get(next).map(|l| l.time + offset),
    }
}

/// Wall-clock time until `boundary` at the given playback rate.
#[must_use]
pub fn delay_until(boundary: f64, position: f64, rate: f64) -> Duration {
    let mut secs = (boundary - position).abs();
    if rate > 0.0 && rate.is_finite() {
        secs /= rate;
    }
    secs_to_duration(secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Inactive,
    Tracking,
}

/// Outcome of one fire, computed under the player lock.
enum Step {
    Clear { revision: u64 },
    Advance {
        selection: LineSelection,
        revision: u64,
        playing: bool,
        delay: Option<Duration>,
    },
}

pub(crate) struct Scheduler {
    phase: Phase,
    shown_index: Option<usize>,
    written_time: Option<f64>,
    shown_revision: Option<u64>,
}

impl Scheduler {
    pub(crate) const fn new() -> Self {
        Self {
            phase: Phase::Inactive,
            shown_index: None,
            written_time: None,
            shown_revision: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        ctx: Arc<EngineContext>,
        mut fires: TimerFires,
        cancel: CancellationToken,
    ) {
        info!("Lyric scheduler started");
        loop {
            let fired = tokio::select! {
                () = cancel.cancelled() => false,
                fired = fires.next() => fired,
            };
            if !fired {
                break;
            }
            self.on_fire(&ctx).await;
        }
        info!("Lyric scheduler stopped");
    }

    pub(super) async fn on_fire(&mut self, ctx: &EngineContext) {
        let offset = ctx.settings.timestamp_offset;
        let step = ctx
            .player
            .update(|state| {
                let revision = state.lyrics_revision;
                if state.track.lyrics.state() != LyricsState::Synced {
                    return Step::Clear { revision };
                }
                let selection = select_line(state.track.lyrics.lines(), state.position, offset);
                let delay = selection.next_boundary.map(|boundary| {
                    let delay = delay_until(boundary, state.position, state.rate);
                    state.position = boundary;
                    delay
                });
                // Under the lock, so a resync issued after a state change wins.
                match delay {
                    Some(delay) => ctx.timer.reset(delay),
                    None => ctx.timer.stop(),
                }
                Step::Advance {
                    selection,
                    revision,
                    playing: state.is_playing(),
                    delay,
                }
            })
            .await;

        match step {
            Step::Clear { revision } => {
                if self.phase == Phase::Tracking {
                    debug!("Lyrics not synced, scheduler idle");
                }
                self.phase = Phase::Inactive;
                self.shown_index = None;
                self.written_time = None;
                self.shown_revision = Some(revision);
                ctx.output.display_lyric(None);
            }
            Step::Advance {
                selection,
                revision,
                playing,
                delay,
            } => {
                self.phase = Phase::Tracking;
                #[allow(clippy::float_cmp)]
                let time_changed = selection.current_time != self.written_time;
                let notify = selection.index != self.shown_index
                    || self.shown_revision != Some(revision)
                    || (playing && time_changed);

                if notify {
                    debug!(
                        "Displaying line {:?}, next boundary in {:?}",
                        selection.index, delay
                    );
                    self.shown_index = selection.index;
                    self.written_time = selection.current_time;
                    self.shown_revision = Some(revision);
                    ctx.output.display_lyric(selection.index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(times: &[f64]) -> Vec<Lyric> {
        times
            .iter()
            .enumerate()
            .map(|(i, t)| Lyric::new(*t, format!("line {i}")))
            .collect()
    }

    #[test]
    fn test_select_between_lines() {
        let lyrics = lines(&[0.0, 10.0, 20.0]);
        let selection = select_line(&lyrics, 15.0, 0.0);
        assert_eq!(selection.index, Some(1));
        assert_eq!(selection.current_time, Some(10.0));
        assert_eq!(selection.next_boundary, Some(20.0));
    }

    #[test]
    fn test_select_on_boundary_and_last_line() {
        let lyrics = lines(&[0.0, 10.0, 20.0]);
        let selection = select_line(&lyrics, 20.0, 0.0);
        assert_eq!(selection.index, Some(2));
        assert_eq!(selection.next_boundary, None);
    }

    #[test]
    fn test_select_before_first_line() {
        let lyrics = lines(&[0.0, 10.0, 20.0]);
        let selection = select_line(&lyrics, -1.0, 0.0);
        assert_eq!(selection.index, None);
        assert_eq!(selection.current_time, None);
        assert_eq!(selection.next_boundary, Some(0.0));
    }

    #[test]
    fn test_select_lines_past_an_hour() {
        let lyrics = lines(&[0.0, 6100.0]);
        let selection = select_line(&lyrics, 6200.0, 0.0);
        assert_eq!(selection.index, Some(1));
        assert_eq!(selection.next_boundary, None);
    }

    #[test]
    fn test_select_duplicate_timestamps_takes_later() {
        let lyrics = lines(&[10.0, 10.0, 20.0]);
        assert_eq!(select_line(&lyrics, 10.0, 0.0).index, Some(1));
    }

    #[test]
    fn test_select_empty() {
        let selection = select_line(&[], 42.0, 0.0);
        assert_eq!(selection.index, None);
        assert_eq!(selection.next_boundary, None);
    }

    #[test]
    fn test_select_applies_offset() {
        let lyrics = lines(&[0.0, 10.0, 20.0]);
        let early = select_line(&lyrics, 9.0, -1.5);
        assert_eq!(early.index, Some(1));
        assert_eq!(early.next_boundary, Some(18.5));

        let late = select_line(&lyrics, 11.0, 2.0);
        assert_eq!(late.index, Some(0));
    }

    #[test]
    fn test_delay_until() {
        assert_eq!(delay_until(20.0, 15.0, 1.0), Duration::from_secs(5));
        assert_eq!(delay_until(20.0, 15.0, 2.0), Duration::from_millis(2500));
        assert_eq!(delay_until(20.0, 15.0, 0.0), Duration::from_secs(5));
        // Estimate already past the boundary: absolute distance.
        assert_eq!(delay_until(10.0, 12.0, 1.0), Duration::from_secs(2));
    }
}
