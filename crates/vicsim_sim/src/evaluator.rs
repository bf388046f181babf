//! The contract between the driver and the hardware model.
//!
//! The model is a black box: the driver writes input pins, asks it to settle,
//! and reads pins back. Debug taps on the model's internal raster counters are
//! exposed as pins too, since realignment and the watchpoints need them.

/// A pin or internal counter tap on the hardware model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pin {
    /// 4x pixel-dot clock enable (input).
    ClkDot4x,
    /// Colour reference clock enable (input).
    ClkColor,
    /// Chip variant selection code (input).
    Chip,
    /// Reset (input, active high).
    Rst,
    /// Chip enable (input, active low).
    Ce,
    /// Read/write direction (input, 1 = read).
    Rw,
    /// Address bus from the CPU side (input, 12 bits).
    AddrIn,
    /// Data bus from the CPU side (input, 12 bits).
    DataIn,
    /// Two-phase system clock (output).
    ClkPhi,
    /// Pixel-dot clock (output).
    ClkDot,
    /// Colour reference clock (output).
    ColorRef,
    /// Red colour output (2 bits).
    Red,
    /// Green colour output (2 bits).
    Green,
    /// Blue colour output (2 bits).
    Blue,
    /// Composite sync (output).
    CSync,
    /// Address bus driven by the chip (output, 12 bits).
    AddrOut,
    /// Data bus driven by the chip (output, 12 bits).
    DataOut,
    /// Bus available (output).
    Ba,
    /// Address enable control (output).
    Aec,
    /// Interrupt request (output, active low).
    Irq,
    /// Row address strobe (output).
    Ras,
    /// Column address strobe (output).
    Cas,
    /// Horizontal position counter (debug tap).
    Xpos,
    /// Bus cycle within the line (debug tap).
    CycleNum,
    /// Dot within the bus cycle, 0..8 (debug tap).
    BitCycle,
    /// Dot within the line (debug tap).
    RasterX,
    /// Raster line (debug tap).
    RasterLine,
    /// DRAM refresh counter (debug tap).
    RefreshCounter,
}

impl Pin {
    /// Number of pins.
    pub const COUNT: usize = 28;

    /// Every pin, in declaration order.
    pub const ALL: [Pin; Pin::COUNT] = [
        Pin::ClkDot4x,
        Pin::ClkColor,
        Pin::Chip,
        Pin::Rst,
        Pin::Ce,
        Pin::Rw,
        Pin::AddrIn,
        Pin::DataIn,
        Pin::ClkPhi,
        Pin::ClkDot,
        Pin::ColorRef,
        Pin::Red,
        Pin::Green,
        Pin::Blue,
        Pin::CSync,
        Pin::AddrOut,
        Pin::DataOut,
        Pin::Ba,
        Pin::Aec,
        Pin::Irq,
        Pin::Ras,
        Pin::Cas,
        Pin::Xpos,
        Pin::CycleNum,
        Pin::BitCycle,
        Pin::RasterX,
        Pin::RasterLine,
        Pin::RefreshCounter,
    ];

    /// Position of this pin in [`Pin::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A cycle-level hardware model that can be stepped and observed.
///
/// All pin values are unsigned and at most 16 bits wide.
pub trait Evaluator {
    /// Drives an input pin. Takes effect at the next [`settle`](Self::settle).
    fn set_input(&mut self, pin: Pin, value: u16);

    /// Reads the current value of a pin as of the last settle.
    fn read_pin(&self, pin: Pin) -> u16;

    /// Advances combinational and sequential state for the current inputs.
    fn settle(&mut self);

    /// End-of-run cleanup.
    fn finalize(&mut self) {}

    /// Whether the model itself has requested the run to stop.
    fn finished(&self) -> bool {
        false
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn set_input(&mut self, pin: Pin, value: u16) {
        (**self).set_input(pin, value);
    }

    fn read_pin(&self, pin: Pin) -> u16 {
        (**self).read_pin(pin)
    }

    fn settle(&mut self) {
        (**self).settle();
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }
}
