//! Simulation time with picosecond resolution.
//!
//! One tick of the [`SampleClock`](crate::clock::SampleClock) is one
//! picosecond. Realistic runs are a few simulated seconds at most, so a `u64`
//! counter never overflows in practice.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Picoseconds per nanosecond.
pub const PS_PER_NS: u64 = 1_000;
/// Picoseconds per microsecond.
pub const PS_PER_US: u64 = 1_000_000;
/// Picoseconds per millisecond.
pub const PS_PER_MS: u64 = 1_000_000_000;

/// An absolute simulation time point in picoseconds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime {
    /// Picoseconds since the start of the run.
    pub ps: u64,
}

impl SimTime {
    /// Time zero.
    pub fn zero() -> Self {
        Self { ps: 0 }
    }

    /// Creates a time from a picosecond value.
    pub fn from_ps(ps: u64) -> Self {
        Self { ps }
    }

    /// Creates a time from a nanosecond value, saturating at the end of time.
    pub fn from_ns(ns: u64) -> Self {
        Self {
            ps: ns.saturating_mul(PS_PER_NS),
        }
    }

    /// Creates a time from a microsecond value, saturating at the end of time.
    pub fn from_us(us: u64) -> Self {
        Self {
            ps: us.saturating_mul(PS_PER_US),
        }
    }

    /// Creates a time from a microsecond value, or `None` if it does not fit
    /// the picosecond counter.
    pub fn checked_from_us(us: u64) -> Option<Self> {
        us.checked_mul(PS_PER_US).map(Self::from_ps)
    }

    /// Returns this time shifted forward by `ps`, or `None` on overflow.
    pub fn checked_add_ps(&self, ps: u64) -> Option<Self> {
        self.ps.checked_add(ps).map(Self::from_ps)
    }

    /// Converts to nanoseconds (truncated).
    pub fn to_ns(&self) -> u64 {
        self.ps / PS_PER_NS
    }

    /// Converts to microseconds (truncated).
    pub fn to_us(&self) -> u64 {
        self.ps / PS_PER_US
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ps = self.ps;
        if ps == 0 {
            write!(f, "0 ps")
        } else if ps >= PS_PER_MS && ps % PS_PER_MS == 0 {
            write!(f, "{} ms", ps / PS_PER_MS)
        } else if ps >= PS_PER_US && ps % PS_PER_US == 0 {
            write!(f, "{} us", ps / PS_PER_US)
        } else if ps >= PS_PER_NS && ps % PS_PER_NS == 0 {
            write!(f, "{} ns", ps / PS_PER_NS)
        } else {
            write!(f, "{ps} ps")
        }
    }
}
