//! The model together with its clock and observed signals.
//!
//! Both the main loop and shadow realignment step the model the same way:
//! settle, sample, let consumers look, store the snapshot, advance the clock.
//! [`Stepper`] owns the pieces that sequence touches.

use vicsim_common::{ChipProfile, FramePoint};

use crate::checks::StateLine;
use crate::clock::{DomainIndex, SampleClock};
use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};
use crate::signal::{SignalId, SignalTable};
use crate::time::SimTime;
use crate::tracker::ChangeTracker;

/// Dot4x edges (toggles) per pixel dot.
pub const EDGES_PER_DOT: u64 = 8;

/// Dot4x edges after which the bus-phase counter repeats.
pub const PHASE_EDGES: u64 = 32;

/// Owns the evaluator, the clock, the signal table and the change tracker.
pub struct Stepper<E: Evaluator> {
    eval: E,
    clock: SampleClock,
    table: SignalTable,
    tracker: ChangeTracker,
    profile: ChipProfile,
    dot: SignalId,
    dot4x: DomainIndex,
}

impl<E: Evaluator> Stepper<E> {
    /// Assembles a stepper. `dot` is forced to monitored since shadow
    /// exchanges and watchpoints key off its rising edge.
    pub fn new(
        eval: E,
        profile: ChipProfile,
        clock: SampleClock,
        mut table: SignalTable,
        dot: SignalId,
    ) -> Result<Self, SimError> {
        let dot4x = clock
            .domains()
            .iter()
            .position(|d| d.pin == Pin::ClkDot4x)
            .ok_or_else(|| SimError::InvalidClockDomain {
                name: "dot4x".to_string(),
                reason: "no domain drives the dot4x clock".to_string(),
            })?;
        table.set_monitored(dot, true);
        let tracker = ChangeTracker::new(&table);
        Ok(Self {
            eval,
            clock,
            table,
            tracker,
            profile,
            dot,
            dot4x,
        })
    }

    /// Settles the model and samples every monitored signal.
    pub fn settle(&mut self) {
        self.eval.settle();
        self.tracker.sample(&self.table, &self.eval);
    }

    /// Snapshots the current samples for the next step's comparisons.
    pub fn store_previous(&mut self) {
        self.tracker.store_previous();
    }

    /// Moves to the next clock edge.
    pub fn advance(&mut self) -> Result<SimTime, SimError> {
        self.clock.advance(&mut self.eval)
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Dot4x toggles delivered so far.
    pub fn dot4x_edges(&self) -> u64 {
        self.clock.edges(self.dot4x)
    }

    /// Dot4x toggle count modulo [`PHASE_EDGES`].
    pub fn phase(&self) -> u8 {
        (self.dot4x_edges() % PHASE_EDGES) as u8
    }

    /// Whether the pixel-dot clock rose on this step.
    pub fn dot_rising(&self) -> bool {
        self.tracker.rising(self.dot)
    }

    /// The model's raster coordinate.
    pub fn position(&self) -> FramePoint {
        FramePoint {
            raster_x: self.eval.read_pin(Pin::RasterX),
            raster_line: self.eval.read_pin(Pin::RasterLine),
        }
    }

    /// Reads a model pin.
    pub fn read(&self, pin: Pin) -> u16 {
        self.eval.read_pin(pin)
    }

    /// Drives a model input.
    pub fn set_input(&mut self, pin: Pin, value: u16) {
        self.eval.set_input(pin, value);
    }

    /// Drives every clock domain's current level onto the model.
    pub fn drive_clocks(&mut self) {
        self.clock.drive_levels(&mut self.eval);
    }

    /// Logs the model state at trace level while dot4x is high.
    pub fn log_state(&self) {
        if log::log_enabled!(log::Level::Trace) && self.read(Pin::ClkDot4x) != 0 {
            log::trace!(
                "{}",
                StateLine::capture(&self.eval, self.dot_rising(), self.phase())
            );
        }
    }

    /// The chip profile.
    pub fn profile(&self) -> &ChipProfile {
        &self.profile
    }

    /// The signal table.
    pub fn table(&self) -> &SignalTable {
        &self.table
    }

    /// The change tracker.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// The clock.
    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    /// The evaluator.
    pub fn evaluator(&self) -> &E {
        &self.eval
    }

    /// The evaluator, mutably.
    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.eval
    }

    /// Consumes the stepper, returning the evaluator.
    pub fn into_evaluator(self) -> E {
        self.eval
    }
}
