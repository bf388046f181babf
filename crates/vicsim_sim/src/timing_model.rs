//! A counter-only stand-in for the hardware model.
//!
//! [`TimingModel`] derives the pixel-dot clock, the two-phase clock and the
//! raster position from edges on the 4x dot clock input, exactly as a real
//! model would present them on its debug taps. It renders no pixels and
//! fetches no memory. A 64-entry register file answers chip-selected reads and
//! writes so bus forwarding can be observed end to end.

use vicsim_common::{ChipModel, ChipProfile, FramePoint, DOTS_PER_CYCLE};

use crate::evaluator::{Evaluator, Pin};

/// Dot4x rising edges per pixel dot.
const QUADS_PER_DOT: u8 = 4;

/// Registers decoded from the low address bits.
const REGISTER_COUNT: usize = 64;

/// Counter-only evaluator for a [`ChipProfile`].
#[derive(Debug, Clone)]
pub struct TimingModel {
    profile: ChipProfile,
    inputs: [u16; Pin::COUNT],
    last_dot4x: bool,
    quad: u8,
    raster_x: u16,
    raster_line: u16,
    registers: [u8; REGISTER_COUNT],
    data_out: u16,
    settles: u64,
}

impl TimingModel {
    /// Creates a model parked at the first dot of the first line.
    pub fn new(profile: ChipProfile) -> Self {
        Self {
            profile,
            inputs: [0; Pin::COUNT],
            last_dot4x: false,
            quad: 0,
            raster_x: 0,
            raster_line: 0,
            registers: [0; REGISTER_COUNT],
            data_out: 0,
            settles: 0,
        }
    }

    /// The profile the model is currently configured as.
    pub fn profile(&self) -> &ChipProfile {
        &self.profile
    }

    /// Current raster coordinate.
    pub fn position(&self) -> FramePoint {
        FramePoint {
            raster_x: self.raster_x,
            raster_line: self.raster_line,
        }
    }

    /// Number of settle calls since construction.
    pub fn settles(&self) -> u64 {
        self.settles
    }

    /// Reads a register without going through the bus.
    pub fn register(&self, index: usize) -> Option<u8> {
        self.registers.get(index).copied()
    }

    fn input(&self, pin: Pin) -> u16 {
        self.inputs[pin.index()]
    }

    fn bit_cycle(&self) -> u16 {
        self.raster_x % DOTS_PER_CYCLE
    }

    fn phi(&self) -> bool {
        self.bit_cycle() >= DOTS_PER_CYCLE / 2
    }

    fn step_dot(&mut self) {
        self.raster_x += 1;
        if self.raster_x >= self.profile.dots_per_line() {
            self.raster_x = 0;
            self.raster_line += 1;
            if self.raster_line >= self.profile.lines_per_frame {
                self.raster_line = 0;
            }
        }
    }

    fn reset_position(&mut self) {
        self.quad = 0;
        self.raster_x = 0;
        self.raster_line = 0;
    }

    fn access_bus(&mut self) {
        if self.input(Pin::Ce) != 0 {
            return;
        }
        let reg = usize::from(self.input(Pin::AddrIn)) % REGISTER_COUNT;
        if self.input(Pin::Rw) == 0 {
            self.registers[reg] = (self.input(Pin::DataIn) & 0xff) as u8;
        } else {
            self.data_out = u16::from(self.registers[reg]);
        }
    }
}

impl Evaluator for TimingModel {
    fn set_input(&mut self, pin: Pin, value: u16) {
        if pin == Pin::Chip {
            if let Some(model) = u8::try_from(value).ok().and_then(ChipModel::from_code) {
                if model != self.profile.model {
                    self.profile = model.profile();
                    self.reset_position();
                }
            }
        }
        self.inputs[pin.index()] = value;
    }

    fn read_pin(&self, pin: Pin) -> u16 {
        match pin {
            Pin::ClkDot4x
            | Pin::ClkColor
            | Pin::Chip
            | Pin::Rst
            | Pin::Ce
            | Pin::Rw
            | Pin::AddrIn
            | Pin::DataIn => self.input(pin),
            Pin::ClkPhi | Pin::Aec => u16::from(self.phi()),
            Pin::ClkDot => u16::from(self.quad < QUADS_PER_DOT / 2),
            Pin::ColorRef => self.input(Pin::ClkColor),
            Pin::Red | Pin::Green | Pin::Blue => 0,
            Pin::CSync | Pin::Ba | Pin::Irq | Pin::Ras | Pin::Cas => 1,
            Pin::AddrOut => self.input(Pin::AddrIn),
            Pin::DataOut => self.data_out,
            Pin::Xpos => self.profile.xpos_at(self.raster_x),
            Pin::CycleNum => self.raster_x / DOTS_PER_CYCLE,
            Pin::BitCycle => self.bit_cycle(),
            Pin::RasterX => self.raster_x,
            Pin::RasterLine => self.raster_line,
            Pin::RefreshCounter => 0xff,
        }
    }

    fn settle(&mut self) {
        self.settles += 1;
        let dot4x = self.input(Pin::ClkDot4x) != 0;
        if self.input(Pin::Rst) != 0 {
            self.reset_position();
        } else if dot4x && !self.last_dot4x {
            self.quad = (self.quad + 1) % QUADS_PER_DOT;
            if self.quad == 0 {
                self.step_dot();
            }
        }
        self.last_dot4x = dot4x;
        self.access_bus();
    }
}
