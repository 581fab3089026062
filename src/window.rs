//! # Trailing Window
//! Decides whether a timestamp lies in `[now - duration, now]`.
//!
//! Both ends are inclusive: an event exactly `duration` old is still in the
//! window, and so is one stamped at `now`. Evaluating the same timestamp twice
//! at the same instant always gives the same answer.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::clock::Clock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("window duration must be positive (got {duration})")]
pub struct InvalidWindow {
    pub duration: Duration,
}

/// Trailing time window bound to an injected clock.
#[derive(Clone)]
pub struct TrailingWindow {
    duration: Duration,
    clock: Arc<dyn Clock>,
}

impl TrailingWindow {
    pub fn new(duration: Duration, clock: Arc<dyn Clock>) -> Result<Self, InvalidWindow> {
        if duration <= Duration::zero() {
            return Err(InvalidWindow { duration });
        }
        Ok(Self { duration, clock })
    }

    /// Convenience constructor for whole-second windows. Counts beyond
    /// chrono's range saturate to `Duration::MAX` / `Duration::MIN`.
    pub fn with_secs(secs: i64, clock: Arc<dyn Clock>) -> Result<Self, InvalidWindow> {
        let duration = Duration::try_seconds(secs).unwrap_or(if secs > 0 {
            Duration::MAX
        } else {
            Duration::MIN
        });
        Self::new(duration, clock)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// `(start, end)` of the window at `now`. The start saturates at the
    /// earliest representable instant.
    pub fn bounds_at(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = now
            .checked_sub_signed(self.duration)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        (start, now)
    }

    pub fn contains_at(&self, ts: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds_at(now);
        start <= ts && ts <= end
    }

    /// Same as [`contains_at`](Self::contains_at) against the clock's current instant.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.contains_at(ts, self.now())
    }
}

impl fmt::Debug for TrailingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrailingWindow")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}
