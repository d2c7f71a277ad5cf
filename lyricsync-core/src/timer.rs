//! A resettable one-shot timer.
//!
//! [`LyricTimer`] is the control side: any task may arm it with
//! [`LyricTimer::reset`] or disarm it with [`LyricTimer::stop`]. The single
//! consumer awaits [`TimerFires::next`], which resolves once per arming.
//! Re-arming before the deadline replaces the pending fire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Delays shorter than this are raised to it.
pub const MIN_TIMER_DELAY: Duration = Duration::from_millis(1);

/// Deadline used when `now + delay` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Idle,
    Armed { deadline: Instant, generation: u64 },
}

/// Control handle of the timer.
#[derive(Debug)]
pub struct LyricTimer {
    state: watch::Sender<TimerState>,
    generation: AtomicU64,
}

/// Consumer side of the timer.
#[derive(Debug)]
pub struct TimerFires {
    state: watch::Receiver<TimerState>,
    last_fired: Option<u64>,
}

impl LyricTimer {
    #[must_use]
    pub fn new() -> (Self, TimerFires) {
        let (tx, rx) = watch::channel(TimerState::Idle);
        (
            Self {
                state: tx,
                generation: AtomicU64::new(0),
            },
            TimerFires {
                state: rx,
                last_fired: None,
            },
        )
    }

    /// Arm the timer to fire after `delay`, replacing any pending fire.
    pub fn reset(&self, delay: Duration) {
        let delay = delay.max(MIN_TIMER_DELAY);
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.state.send_replace(TimerState::Armed {
            deadline,
            generation,
        });
    }

    /// Disarm the timer. A pending fire is dropped.
    pub fn stop(&self) {
        self.state.send_replace(TimerState::Idle);
    }
}

impl TimerFires {
    /// Wait for the next fire. Returns `false` once the control handle is gone.
    pub async fn next(&mut self) -> bool {
        loop {
            let state = *self.state.borrow_and_update();
            match state {
                TimerState::Armed {
                    deadline,
                    generation,
                } if self.last_fired != Some(generation) => {
                    tokio::select! {
                        () = tokio::time::sleep_until(deadline) => {
                            self.last_fired = Some(generation);
                            return true;
                        }
                        changed = self.state.changed() => {
                            if changed.is_err() {
                                return false;
                            }
                        }
                    }
                }
                _ => {
                    if self.state.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(2),
            "expected about {expected:?}, got {actual:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let (timer, mut fires) = LyricTimer::new();
        let start = Instant::now();
        timer.reset(Duration::from_millis(300));

        assert!(fires.next().await);
        assert_close(start.elapsed(), Duration::from_millis(300));

        let second = tokio::time::timeout(Duration::from_secs(5), fires.next()).await;
        assert!(second.is_err(), "one-shot timer fired twice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_replaces_pending_fire() {
        let (timer, mut fires) = LyricTimer::new();
        let start = Instant::now();
        timer.reset(Duration::from_secs(10));

        let waiter = tokio::spawn(async move {
            fires.next().await;
            Instant::now()
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        timer.reset(Duration::from_secs(2));

        let fired_at = waiter.await.unwrap();
        assert_close(fired_at - start, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_fire() {
        let (timer, mut fires) = LyricTimer::new();
        timer.reset(Duration::from_millis(50));
        timer.stop();
        assert_eq!(*timer.state.borrow(), TimerState::Idle);

        let fired = tokio::time::timeout(Duration::from_secs(1), fires.next()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_floored() {
        let (timer, mut fires) = LyricTimer::new();
        let start = Instant::now();
        timer.reset(Duration::ZERO);
        assert!(fires.next().await);
        assert_close(start.elapsed(), MIN_TIMER_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_after_fire() {
        let (timer, mut fires) = LyricTimer::new();
        timer.reset(Duration::from_millis(10));
        assert!(fires.next().await);
        timer.stop();
        timer.reset(Duration::from_millis(10));
        assert!(fires.next().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_delay_stays_pending() {
        let (timer, mut fires) = LyricTimer::new();
        timer.reset(Duration::MAX);
        let fired = tokio::time::timeout(Duration::from_secs(3600), fires.next()).await;
        assert!(fired.is_err());

        // A near-zero rate stretches a 5 s gap past what an Instant can hold.
        timer.reset(crate::sync::delay_until(20.0, 15.0, 1e-300));
        let fired = tokio::time::timeout(Duration::from_secs(3600), fires.next()).await;
        assert!(fired.is_err());

        timer.reset(Duration::from_millis(10));
        assert!(fires.next().await);
    }

    #[tokio::test]
    async fn test_dropped_handle_ends_consumer() {
        let (timer, mut fires) = LyricTimer::new();
        drop(timer);
        assert!(!fires.next().await);
    }
}
