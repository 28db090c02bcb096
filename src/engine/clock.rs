//! # engine::clock
//!
//! Scheduler abstraction for the session's timed waits.
//!
//! `sleep_until` is used for the calendar waits (market open, end of window);
//! `sleep` is the fixed poll interval of the monitoring loop.  Tests swap in
//! [`ManualClock`] so a one-hour hold runs instantly.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `deadline`; returns immediately if it is already past.
    async fn sleep_until(&self, deadline: DateTime<Utc>);

    /// Suspend for a fixed interval.
    async fn sleep(&self, interval: Duration);
}

// ─── SystemClock ──────────────────────────────────────────────────────────────

/// Wall clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        // to_std() fails for negative spans, i.e. the deadline has passed
        if let Ok(wait) = (deadline - Utc::now()).to_std() {
            tokio::time::sleep(wait).await;
        }
    }

    async fn sleep(&self, interval: Duration) {
        tokio::time::sleep(interval).await;
    }
}

// ─── ManualClock ──────────────────────────────────────────────────────────────

/// Virtual clock: sleeping advances time instead of waiting for it.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: std::sync::Mutex::new(now) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut now = self.lock();
        if deadline > *now {
            *now = deadline;
        }
    }

    async fn sleep(&self, interval: Duration) {
        let mut now = self.lock();
        *now += chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_never_goes_backwards() {
        let start = Utc::now();
        let clock = ManualClock::at(start);
        clock.sleep_until(start - chrono::Duration::minutes(5)).await;
        assert_eq!(clock.now(), start);

        clock.sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
    }

    #[tokio::test]
    async fn test_system_clock_past_deadline_returns_immediately() {
        let clock = SystemClock;
        let before = std::time::Instant::now();
        clock.sleep_until(Utc::now() - chrono::Duration::hours(1)).await;
        assert!(before.elapsed() < Duration::from_millis(500));
    }
}
