use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};

/// Monotonic time elapsed since some fixed origin. Never goes backwards.
pub trait MonotonicClock: Send + Sync {
    fn elapsed(&self) -> Duration;
}

pub struct SystemMonotonic {
    origin: Instant,
}

impl SystemMonotonic {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonic {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock advanced by hand. Clones share the same reading.
#[derive(Clone, Debug, Default)]
pub struct ManualMonotonic {
    elapsed_nanos: Arc<AtomicU64>,
}

impl ManualMonotonic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .elapsed_nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_add(nanos))
            });
    }
}

impl MonotonicClock for ManualMonotonic {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::Relaxed))
    }
}

/// Last authoritative instant plus the monotonic reading taken when it was captured.
/// `authoritative == None` is the "time unknown" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAnchor {
    pub authoritative: Option<DateTime<Utc>>,
    pub captured_at: Duration,
}

impl TimeAnchor {
    pub fn known(authoritative: DateTime<Utc>, captured_at: Duration) -> Self {
        Self {
            authoritative: Some(authoritative),
            captured_at,
        }
    }

    pub fn unknown(captured_at: Duration) -> Self {
        Self {
            authoritative: None,
            captured_at,
        }
    }

    pub fn is_known(&self) -> bool {
        self.authoritative.is_some()
    }
}

/// Extrapolates the current time from the anchor by plain elapsed-time addition.
pub struct ClockState {
    anchor: TimeAnchor,
    monotonic: Arc<dyn MonotonicClock>,
}

impl ClockState {
    /// Starts out unknown until the first successful `rebase`.
    pub fn new(monotonic: Arc<dyn MonotonicClock>) -> Self {
        let anchor = TimeAnchor::unknown(monotonic.elapsed());
        Self { anchor, monotonic }
    }

    pub fn rebase(&mut self, anchor: TimeAnchor) {
        self.anchor = anchor;
    }

    pub fn anchor(&self) -> TimeAnchor {
        self.anchor
    }

    pub fn now_utc(&self) -> Option<DateTime<Utc>> {
        let authoritative = self.anchor.authoritative?;
        let since_capture = self
            .monotonic
            .elapsed()
            .saturating_sub(self.anchor.captured_at);
        let delta = TimeDelta::from_std(since_capture).ok()?;
        authoritative.checked_add_signed(delta)
    }

    pub fn now_in<Tz: TimeZone>(&self, zone: &Tz) -> Option<DateTime<Tz>> {
        self.now_utc().map(|now| now.with_timezone(zone))
    }

    pub fn now(&self) -> Option<DateTime<Local>> {
        self.now_in(&Local)
    }
}
