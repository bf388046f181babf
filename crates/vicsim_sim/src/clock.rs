//! Picosecond scheduling across asynchronous clock domains.
//!
//! Nothing happens in the model between clock-enable edges, so the clock jumps
//! straight to the earliest pending edge instead of ticking every picosecond.
//! Each domain's edges sit at exact multiples of its interval from time zero;
//! there is no accumulated drift.

use vicsim_common::ChipProfile;

use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};
use crate::time::SimTime;

/// Index of a registered clock domain.
pub type DomainIndex = usize;

/// One clock-enable input toggled at a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDomain {
    /// Human-readable name used in logs and errors.
    pub name: String,
    /// The model input this domain toggles.
    pub pin: Pin,
    /// Time between consecutive toggles.
    pub interval_ps: u64,
    next_edge: SimTime,
    edges: u64,
    level: bool,
}

impl ClockDomain {
    /// Absolute time of this domain's next toggle.
    pub fn next_edge(&self) -> SimTime {
        self.next_edge
    }

    /// Toggles delivered so far.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Current level of the enable input.
    pub fn level(&self) -> bool {
        self.level
    }
}

/// The simulation clock: current time plus the set of clock domains.
#[derive(Debug, Clone, Default)]
pub struct SampleClock {
    now: SimTime,
    domains: Vec<ClockDomain>,
}

impl SampleClock {
    /// Creates a clock at time zero with no domains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the standard clock for a chip: the 4x dot domain first, then
    /// the colour reference domain when `color` is set.
    pub fn for_profile(profile: &ChipProfile, color: bool) -> Result<Self, SimError> {
        let mut clock = Self::new();
        clock.add_domain("dot4x", Pin::ClkDot4x, profile.dot4x_half_period_ps())?;
        if color {
            clock.add_domain("color", Pin::ClkColor, profile.color_half_period_ps())?;
        }
        Ok(clock)
    }

    /// Registers a domain whose first toggle falls one interval after the
    /// current time.
    pub fn add_domain(
        &mut self,
        name: &str,
        pin: Pin,
        interval_ps: u64,
    ) -> Result<DomainIndex, SimError> {
        let invalid = |reason: &str| SimError::InvalidClockDomain {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if interval_ps == 0 {
            return Err(invalid("interval must be non-zero"));
        }
        if self.domains.iter().any(|d| d.pin == pin) {
            return Err(invalid("pin already driven by another domain"));
        }
        let next_edge = self
            .now
            .checked_add_ps(interval_ps)
            .ok_or(SimError::ClockOverflow { time: self.now })?;
        self.domains.push(ClockDomain {
            name: name.to_string(),
            pin,
            interval_ps,
            next_edge,
            edges: 0,
            level: false,
        });
        Ok(self.domains.len() - 1)
    }

    /// Current absolute time. Has no side effects.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// The registered domains, in registration order.
    pub fn domains(&self) -> &[ClockDomain] {
        &self.domains
    }

    /// Toggles delivered so far by domain `index`, or 0 if it does not exist.
    pub fn edges(&self, index: DomainIndex) -> u64 {
        self.domains.get(index).map_or(0, ClockDomain::edges)
    }

    /// Which domain fires next and when. Ties go to the earliest registered.
    pub fn peek(&self) -> Option<(DomainIndex, SimTime)> {
        self.domains
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| d.next_edge)
            .map(|(i, d)| (i, d.next_edge))
    }

    /// Drives every domain's current level onto the model.
    pub fn drive_levels<E: Evaluator + ?Sized>(&self, eval: &mut E) {
        for domain in &self.domains {
            eval.set_input(domain.pin, u16::from(domain.level));
        }
    }

    /// Moves to the earliest pending edge, toggles that domain's input on the
    /// model, and returns the new time.
    pub fn advance<E: Evaluator + ?Sized>(&mut self, eval: &mut E) -> Result<SimTime, SimError> {
        let (index, at) = self.peek().ok_or_else(|| SimError::InvalidClockDomain {
            name: String::new(),
            reason: "no clock domains registered".to_string(),
        })?;
        let now = self.now;
        let domain = &mut self.domains[index];
        domain.next_edge = at
            .checked_add_ps(domain.interval_ps)
            .ok_or(SimError::ClockOverflow { time: now })?;
        domain.edges += 1;
        domain.level = !domain.level;
        eval.set_input(domain.pin, u16::from(domain.level));
        self.now = at;
        Ok(at)
    }
}
