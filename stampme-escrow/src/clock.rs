//! Ambient time source for expiry arithmetic

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Manually driven clock for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move forward by `secs`, saturating at `u64::MAX`, and return the new time
    pub fn advance(&self, secs: u64) -> u64 {
        let step = |now: u64| Some(now.saturating_add(secs));
        match self.now.fetch_update(Ordering::SeqCst, Ordering::SeqCst, step) {
            Ok(prev) | Err(prev) => prev.saturating_add(secs),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(3_600), 4_600);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_advance_saturates_at_max() {
        let clock = ManualClock::new(u64::MAX - 10);
        assert_eq!(clock.advance(60), u64::MAX);
        assert_eq!(clock.now(), u64::MAX);
        assert_eq!(clock.advance(1), u64::MAX);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
