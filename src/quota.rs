use std::time::Duration;

use log::debug;
use tokio::time::Instant;

/// Length of the rolling per-minute window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Source of "now" for the quota window.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock, which follows `tokio::time::pause` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Counts requests issued today and in the current minute window.
#[derive(Debug)]
pub struct QuotaTracker<C: Clock = TokioClock> {
    clock: C,
    daily_limit: u64,
    per_minute_limit: u64,
    requests_today: u64,
    requests_this_minute: u64,
    window_start: Instant,
}

impl QuotaTracker<TokioClock> {
    pub fn new(daily_limit: u64, per_minute_limit: u64) -> Self {
        Self::with_clock(daily_limit, per_minute_limit, TokioClock)
    }
}

impl<C: Clock> QuotaTracker<C> {
    pub fn with_clock(daily_limit: u64, per_minute_limit: u64, clock: C) -> Self {
        let window_start = clock.now();
        QuotaTracker {
            clock,
            daily_limit,
            per_minute_limit,
            requests_today: 0,
            requests_this_minute: 0,
            window_start,
        }
    }

    /// Records one request and reports whether it fits under both ceilings.
    ///
    /// The request is counted even when `false` is returned, so a `false`
    /// means "pause before issuing", not "this call did not count".
    pub fn can_proceed(&mut self) -> bool {
        let now = self.clock.now();
        if now.duration_since(self.window_start) >= QUOTA_WINDOW {
            debug!(
                "Quota window rolled over after {} request(s)",
                self.requests_this_minute
            );
            self.requests_this_minute = 0;
            self.window_start = now;
        }

        self.requests_today += 1;
        self.requests_this_minute += 1;

        self.requests_today <= self.daily_limit
            && self.requests_this_minute <= self.per_minute_limit
    }

    pub fn requests_today(&self) -> u64 {
        self.requests_today
    }

    pub fn requests_this_minute(&self) -> u64 {
        self.requests_this_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when told to.
    #[derive(Debug, Clone)]
    struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            ManualClock {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_per_minute_ceiling_blocks_251st_call() {
        let clock = ManualClock::new();
        let mut tracker = QuotaTracker::with_clock(1_000_000, 250, clock.clone());

        for i in 0..250 {
            assert!(tracker.can_proceed(), "call {} should be allowed", i + 1);
        }
        assert!(!tracker.can_proceed());

        clock.advance(Duration::from_secs(59));
        assert!(!tracker.can_proceed());
    }

    #[test]
    fn test_window_rollover_resets_minute_counter() {
        let clock = ManualClock::new();
        let mut tracker = QuotaTracker::with_clock(1_000_000, 250, clock.clone());

        for _ in 0..251 {
            tracker.can_proceed();
        }
        assert!(!tracker.can_proceed());

        clock.advance(QUOTA_WINDOW);
        assert!(tracker.can_proceed());
        assert_eq!(tracker.requests_this_minute(), 1);
        assert_eq!(tracker.requests_today(), 253);
    }

    #[test]
    fn test_daily_ceiling_survives_rollover() {
        let clock = ManualClock::new();
        let mut tracker = QuotaTracker::with_clock(3, 250, clock.clone());

        assert!(tracker.can_proceed());
        assert!(tracker.can_proceed());
        assert!(tracker.can_proceed());
        assert!(!tracker.can_proceed());

        clock.advance(Duration::from_secs(120));
        assert!(!tracker.can_proceed());
    }

    #[test]
    fn test_disallowed_calls_are_still_counted() {
        let clock = ManualClock::new();
        let mut tracker = QuotaTracker::with_clock(1_000_000, 1, clock);

        assert!(tracker.can_proceed());
        assert!(!tracker.can_proceed());
        assert!(!tracker.can_proceed());
        assert_eq!(tracker.requests_this_minute(), 3);
    }
}
