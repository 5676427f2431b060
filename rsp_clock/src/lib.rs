#[cfg(test)]
#[macro_use]
extern crate approx;

use bincode::{Decode, Encode};
use core::ops::{Add, Sub};
use quanta::{Clock, Instant, Mock};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in robot time, in nanoseconds since the clock reference.
/// It is always positive: subtracting past zero saturates.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    Encode, Decode,
)]
pub struct RobotTime(pub u64);

impl RobotTime {
    pub const ZERO: RobotTime = RobotTime(0);

    #[inline]
    pub fn from_nanos(nanos: u64) -> Self {
        RobotTime(nanos)
    }

    /// Builds a time from (possibly fractional) seconds. Negative values clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs <= 0.0 {
            return RobotTime::ZERO;
        }
        RobotTime((secs * NANOS_PER_SEC as f64) as u64)
    }

    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }
}

/// Durations beyond the `u64` nanosecond range saturate.
impl From<Duration> for RobotTime {
    fn from(duration: Duration) -> Self {
        RobotTime(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl From<RobotTime> for Duration {
    fn from(time: RobotTime) -> Self {
        Duration::from_nanos(time.0)
    }
}

impl From<u64> for RobotTime {
    fn from(nanos: u64) -> Self {
        RobotTime(nanos)
    }
}

impl Add for RobotTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        RobotTime(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for RobotTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self + RobotTime::from(rhs)
    }
}

impl Sub for RobotTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        RobotTime(self.0.saturating_sub(rhs.0))
    }
}

impl Display for RobotTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let nanos = self.0;
        if nanos >= 60 * NANOS_PER_SEC {
            write!(f, "{:.3} m", nanos as f64 / (60 * NANOS_PER_SEC) as f64)
        } else if nanos >= NANOS_PER_SEC {
            write!(f, "{:.3} s", nanos as f64 / NANOS_PER_SEC as f64)
        } else if nanos >= 1_000_000 {
            write!(f, "{:.3} ms", nanos as f64 / 1_000_000.0)
        } else if nanos >= 1_000 {
            write!(f, "{:.3} µs", nanos as f64 / 1_000.0)
        } else {
            write!(f, "{nanos} ns")
        }
    }
}

/// A running robot clock.
/// Monotonic, starting at an arbitrary reference. Clones share the same
/// time source, including when mocked.
#[derive(Clone, Debug)]
pub struct RobotClock {
    inner: Clock,
    ref_time: Instant,
}

/// Handle driving every clone of a mocked [`RobotClock`].
#[derive(Debug, Clone)]
pub struct RobotClockMock(Arc<Mock>);

impl RobotClockMock {
    pub fn increment(&self, amount: Duration) {
        self.0.increment(amount);
    }

    /// Moves time backwards. This breaks the monotonicity of the clock on purpose,
    /// to reproduce a reset time source.
    pub fn decrement(&self, amount: Duration) {
        self.0.decrement(amount);
    }

    pub fn value(&self) -> u64 {
        self.0.value()
    }

    /// Sets the absolute value of the time, in nanoseconds.
    pub fn set_value(&self, value: u64) {
        let v = self.0.value();
        if v < value {
            self.increment(Duration::from_nanos(value - v));
        } else {
            self.decrement(Duration::from_nanos(v - value));
        }
    }
}

impl RobotClock {
    /// Creates a clock that reads 0 now and increases monotonically.
    pub fn new() -> Self {
        let clock = Clock::new();
        let ref_time = clock.now();
        RobotClock {
            inner: clock,
            ref_time,
        }
    }

    /// Fake clock with a reference time of 0, driven through the returned mock.
    pub fn mock() -> (Self, RobotClockMock) {
        let (clock, mock) = Clock::mock();
        let ref_time = clock.now();
        (
            RobotClock {
                inner: clock,
                ref_time,
            },
            RobotClockMock(mock),
        )
    }

    #[inline]
    pub fn now(&self) -> RobotTime {
        self.inner
            .now()
            .checked_duration_since(self.ref_time)
            .unwrap_or_default()
            .into()
    }
}

impl Default for RobotClock {
    fn default() -> Self {
        Self::new()
    }
}
