//! Consistency checks on captured steps and the per-step state dump.

use std::fmt;

use vicsim_common::{ChipProfile, DOTS_PER_CYCLE};

use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};
use crate::time::SimTime;

/// Horizontal counter cycle at which it wraps to zero.
const XPOS_ROLLOVER_CYCLE: u16 = 12;

/// Value the refresh counter holds at the start of a frame.
const REFRESH_RESET: u16 = 0xff;

/// Assertions evaluated on every captured pixel-dot rising edge.
#[derive(Clone, Debug)]
pub struct Watchpoints {
    profile: ChipProfile,
}

impl Watchpoints {
    /// Creates the watchpoints for a chip variant.
    pub fn new(profile: ChipProfile) -> Self {
        Self { profile }
    }

    /// Checks the model's state after a pixel-dot rising edge.
    pub fn check<E: Evaluator + ?Sized>(&self, eval: &E, time: SimTime) -> Result<(), SimError> {
        let fail = |condition: String| SimError::ConsistencyCheck { time, condition };

        let bit = eval.read_pin(Pin::BitCycle);
        let cycle = eval.read_pin(Pin::CycleNum);
        let xpos = eval.read_pin(Pin::Xpos);
        let raster_x = eval.read_pin(Pin::RasterX);
        let raster_line = eval.read_pin(Pin::RasterLine);
        let first_phase_start = bit == 0;
        let second_phase_start = bit == DOTS_PER_CYCLE / 2;

        if bit < DOTS_PER_CYCLE / 2 && eval.read_pin(Pin::Aec) != 0 {
            return Err(fail(format!("aec high in first phase (bit cycle {bit})")));
        }

        if cycle == XPOS_ROLLOVER_CYCLE && second_phase_start && xpos != 0 {
            return Err(fail(format!(
                "xpos {xpos:#05x} did not roll over at cycle {XPOS_ROLLOVER_CYCLE}"
            )));
        }

        if cycle == 0 && first_phase_start && xpos != self.profile.xpos_reset {
            return Err(fail(format!(
                "xpos {xpos:#05x} at line start, expected {:#05x}",
                self.profile.xpos_reset
            )));
        }

        if let Some(repeat) = self.profile.xpos_repeat {
            let in_repeat = self.profile.xpos_at(raster_x) == repeat.value;
            if in_repeat && (first_phase_start || second_phase_start) && xpos != repeat.value {
                return Err(fail(format!(
                    "xpos {xpos:#05x} at cycle {cycle} bit {bit}, expected repeat {:#05x}",
                    repeat.value
                )));
            }
        }

        if raster_x == 0 && raster_line == 0 {
            let refc = eval.read_pin(Pin::RefreshCounter);
            if refc != REFRESH_RESET {
                return Err(fail(format!("refresh counter {refc:#04x} at frame start")));
            }
        }

        if first_phase_start || second_phase_start {
            if eval.read_pin(Pin::Cas) == 0 {
                return Err(fail(format!("cas low at bit cycle {bit}")));
            }
            if eval.read_pin(Pin::Ras) == 0 {
                return Err(fail(format!("ras low at bit cycle {bit}")));
            }
        }
        Ok(())
    }
}

/// One line of model state, logged at trace level on every dot4x high step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateLine {
    dot_rising: bool,
    phase: u8,
    xpos: u16,
    cycle: u16,
    dot: u16,
    phi: u16,
    bit: u16,
    irq: u16,
    ba: u16,
    aec: u16,
    raster_x: u16,
    raster_line: u16,
    addr: u16,
    data: u16,
    rw: u16,
    ce: u16,
    refresh: u16,
}

impl StateLine {
    /// Reads the state from the model. `phase` is the dot4x edge count
    /// modulo 32.
    pub fn capture<E: Evaluator + ?Sized>(eval: &E, dot_rising: bool, phase: u8) -> Self {
        Self {
            dot_rising,
            phase,
            xpos: eval.read_pin(Pin::Xpos),
            cycle: eval.read_pin(Pin::CycleNum),
            dot: eval.read_pin(Pin::ClkDot),
            phi: eval.read_pin(Pin::ClkPhi),
            bit: eval.read_pin(Pin::BitCycle),
            irq: eval.read_pin(Pin::Irq),
            ba: eval.read_pin(Pin::Ba),
            aec: eval.read_pin(Pin::Aec),
            raster_x: eval.read_pin(Pin::RasterX),
            raster_line: eval.read_pin(Pin::RasterLine),
            addr: eval.read_pin(Pin::AddrIn),
            data: eval.read_pin(Pin::DataIn),
            rw: eval.read_pin(Pin::Rw),
            ce: eval.read_pin(Pin::Ce),
            refresh: eval.read_pin(Pin::RefreshCounter),
        }
    }
}

impl fmt::Display for StateLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02} xps={:03x} cyc={:02} dot={} phi={} bit={} irq={} ba={} aec={} \
             x={:03} y={:03} adi={:03x} dbi={:02x} rw={} ce={} rct={:02x}",
            if self.dot_rising { '*' } else { ' ' },
            self.phase,
            self.xpos,
            self.cycle,
            self.dot,
            self.phi,
            self.bit,
            self.irq,
            self.ba,
            self.aec,
            self.raster_x,
            self.raster_line,
            self.addr,
            self.data,
            self.rw,
            self.ce,
            self.refresh,
        )
    }
}
