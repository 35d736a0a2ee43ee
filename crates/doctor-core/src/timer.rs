//! Deadline timers for the success check and the success countdown.
//!
//! ## Learning: Injected Time
//!
//! Nothing here sleeps. Timers store deadlines and the owner calls
//! `fire`/`advance` with the current instant from a [`Clock`]. Tests and
//! scripted runs use [`ManualClock`] and step time explicitly, so a
//! 500 ms debounce takes no real time to test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ==================== Clocks ====================

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    elapsed_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

// ==================== Timers ====================

/// Fires once, `delay` after the most recent `schedule`.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)starts the timer, replacing any pending deadline.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Whole-second countdown.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining: u8,
    next_tick: Option<Instant>,
}

const TICK: Duration = Duration::from_secs(1);

impl Countdown {
    pub fn start(&mut self, now: Instant, seconds: u8) {
        self.remaining = seconds;
        self.next_tick = (seconds > 0).then(|| now + TICK);
    }

    pub fn cancel(&mut self) {
        self.remaining = 0;
        self.next_tick = None;
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Applies every tick due by `now`. Returns the values counted down to.
    pub fn advance(&mut self, now: Instant) -> Vec<u8> {
        let mut ticks = Vec::new();
        while let Some(due) = self.next_tick {
            if due > now {
                break;
            }
            self.remaining = self.remaining.saturating_sub(1);
            ticks.push(self.remaining);
            self.next_tick = (self.remaining > 0).then(|| due + TICK);
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let start = clock.now();
        other.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }

    #[test]
    fn test_debounce_restarts() {
        let clock = ManualClock::new();
        let mut debounce = Debounce::new(Duration::from_millis(500));
        debounce.schedule(clock.now());

        clock.advance(Duration::from_millis(400));
        assert!(!debounce.fire(clock.now()));
        debounce.schedule(clock.now());

        clock.advance(Duration::from_millis(400));
        assert!(!debounce.fire(clock.now()));
        clock.advance(Duration::from_millis(100));
        assert!(debounce.fire(clock.now()));
        assert!(!debounce.fire(clock.now()));
    }

    #[test]
    fn test_cancelled_debounce_never_fires() {
        let clock = ManualClock::new();
        let mut debounce = Debounce::new(Duration::from_millis(500));
        debounce.schedule(clock.now());
        debounce.cancel();
        clock.advance(Duration::from_secs(5));
        assert!(!debounce.fire(clock.now()));
    }

    #[test]
    fn test_countdown_ticks_once_per_second() {
        let clock = ManualClock::new();
        let mut countdown = Countdown::default();
        countdown.start(clock.now(), 3);

        clock.advance(Duration::from_millis(999));
        assert!(countdown.advance(clock.now()).is_empty());
        clock.advance(Duration::from_millis(1));
        assert_eq!(countdown.advance(clock.now()), vec![2]);

        clock.advance(Duration::from_secs(5));
        assert_eq!(countdown.advance(clock.now()), vec![1, 0]);
        assert!(!countdown.is_running());
        assert_eq!(countdown.remaining(), 0);
    }
}
