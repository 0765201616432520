//! Simulation clock.
//!
//! All timestamps and durations are integral milliseconds so event ordering
//! never depends on floating point rounding. Haste scaling converts through
//! `f64` once and rounds to the nearest millisecond.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// A point on (or a span of) the simulation timeline, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub i64);

impl SimTime {
    pub const ZERO: Self = Self(0);

    /// Sentinel for "never expires".
    pub const NEVER: Self = Self(i64::MAX);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    /// Converts fractional seconds, rounding to the nearest millisecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * 1000.0).round() as i64)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub const fn is_never(self) -> bool {
        self.0 == i64::MAX
    }

    /// Scales a duration by `factor` (haste, cast speed), rounding to the nearest millisecond.
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    /// Returns `self * n`, saturating at [`SimTime::NEVER`].
    pub fn times(self, n: u32) -> Self {
        Self(self.0.saturating_mul(i64::from(n)))
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Elapsed span since `earlier`, clamped at zero.
    pub fn since(self, earlier: Self) -> Self {
        Self((self.0 - earlier.0).max(0))
    }
}

impl Add for SimTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            return f.write_str("never");
        }
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_rounds_to_nearest_millisecond() {
        assert_eq!(SimTime::from_millis(1500).scale(1.0 / 1.3), SimTime(1154));
        assert_eq!(SimTime::from_secs(2).scale(0.5), SimTime(1000));
    }

    #[test]
    fn never_saturates() {
        assert_eq!(SimTime::NEVER + SimTime::from_secs(5), SimTime::NEVER);
        assert!(SimTime::NEVER.is_never());
        assert_eq!(SimTime::from_secs(3).times(4), SimTime::from_secs(12));
    }
}
