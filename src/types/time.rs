//! Timestamps, time spans and the clock used for delta encoding
//!
//! Time is counted in ticks of 100 ns since 0001-01-01T00:00:00.

use std::time::{SystemTime, UNIX_EPOCH};

/// Ticks per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks per millisecond
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Ticks between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks of 9999-12-31T23:59:59.9999999
const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// A point in time, stored as a tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Earliest representable timestamp
    pub const MIN: Timestamp = Timestamp(0);

    /// Latest representable timestamp
    pub const MAX: Timestamp = Timestamp(MAX_TICKS);

    /// Build a timestamp, or `None` if the ticks are outside `MIN..=MAX`
    pub fn from_ticks(ticks: i64) -> Option<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&ticks) {
            Some(Timestamp(ticks))
        } else {
            None
        }
    }

    /// Build a timestamp, clamping out-of-range ticks to `MIN`/`MAX`
    pub fn saturating_from_ticks(ticks: i64) -> Self {
        Timestamp(ticks.clamp(Self::MIN.0, Self::MAX.0))
    }

    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Current wall clock time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => {
                let delta = i64::try_from(after.as_nanos() / 100).unwrap_or(i64::MAX);
                UNIX_EPOCH_TICKS.saturating_add(delta)
            }
            Err(before) => {
                let delta = i64::try_from(before.duration().as_nanos() / 100).unwrap_or(i64::MAX);
                UNIX_EPOCH_TICKS.saturating_sub(delta)
            }
        };
        Self::saturating_from_ticks(ticks)
    }

    /// Add a span, saturating to `MIN`/`MAX` instead of overflowing
    ///
    /// Overflow towards the past yields `MIN`, towards the future `MAX`.
    pub fn saturating_add(self, span: TimeSpan) -> Self {
        match self.0.checked_add(span.0) {
            Some(ticks) => Self::saturating_from_ticks(ticks),
            None if span.0 < 0 => Self::MIN,
            None => Self::MAX,
        }
    }

    /// Signed span from `origin` to `self`
    pub fn since(self, origin: Timestamp) -> TimeSpan {
        TimeSpan(self.0.saturating_sub(origin.0))
    }
}

/// A signed duration, stored as a tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeSpan(i64);

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan(0);
    pub const MIN: TimeSpan = TimeSpan(i64::MIN);
    pub const MAX: TimeSpan = TimeSpan(i64::MAX);

    pub const fn from_ticks(ticks: i64) -> Self {
        TimeSpan(ticks)
    }

    pub fn from_millis(millis: i64) -> Self {
        TimeSpan(millis.saturating_mul(TICKS_PER_MILLISECOND))
    }

    pub fn from_seconds(seconds: i64) -> Self {
        TimeSpan(seconds.saturating_mul(TICKS_PER_SECOND))
    }

    pub const fn ticks(self) -> i64 {
        self.0
    }
}

/// Source of "now" for delta-encoded timestamps
///
/// Writers and readers each consult their own clock, so a stream saved by
/// one process is reconstructed relative to the loading process's time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
