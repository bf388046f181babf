//! The standard set of observable chip signals.
//!
//! Single-bit pins are registered with width 1. The four 12-bit buses are
//! split into one signal per bit, each reading its bit out of the 16-bit pin.

use crate::error::SimError;
use crate::evaluator::Pin;
use crate::signal::{SignalId, SignalTable};

/// Label of the pixel-dot clock, which closes every shadow exchange.
pub const DOT: &str = "dot";

/// Width of the address and data bus pins.
const BUS_WIDTH: u8 = 12;

const SINGLE_HEAD: [(&str, &str, Pin, u16); 10] = [
    ("phi", "p", Pin::ClkPhi, 1),
    ("col", "c", Pin::ColorRef, 1),
    ("rst", "r", Pin::Rst, 1),
    ("r0", "r0", Pin::Red, 1),
    ("r1", "r1", Pin::Red, 2),
    ("g0", "g0", Pin::Green, 1),
    ("g1", "g1", Pin::Green, 2),
    ("b0", "b0", Pin::Blue, 1),
    ("b1", "b1", Pin::Blue, 2),
    ("dot", "dot", Pin::ClkDot, 1),
];

const BUSES: [(&str, Pin); 4] = [
    ("ao", Pin::AddrOut),
    ("ai", Pin::AddrIn),
    ("do", Pin::DataOut),
    ("di", Pin::DataIn),
];

const SINGLE_TAIL: [(&str, &str, Pin); 7] = [
    ("ce", "ce", Pin::Ce),
    ("rw", "rw", Pin::Rw),
    ("ba", "ba", Pin::Ba),
    ("aec", "aec", Pin::Aec),
    ("irq", "irq", Pin::Irq),
    ("ras", "ras", Pin::Ras),
    ("cas", "cas", Pin::Cas),
];

/// Builds the full 66-signal table with only `dot` monitored.
pub fn standard_signals() -> Result<(SignalTable, SignalId), SimError> {
    let mut table = SignalTable::new();
    for (label, id_code, pin, mask) in SINGLE_HEAD {
        table.register(label, id_code, pin, mask, 1)?;
    }
    table.register("csync", "s", Pin::CSync, 1, 1)?;
    for (prefix, pin) in BUSES {
        for bit in 0..BUS_WIDTH {
            let name = format!("{prefix}{bit}");
            table.register(&name, &name, pin, 1 << bit, BUS_WIDTH)?;
        }
    }
    for (label, id_code, pin) in SINGLE_TAIL {
        table.register(label, id_code, pin, 1, 1)?;
    }

    let dot = table.find(DOT).ok_or_else(|| SimError::UnknownSignal(DOT.to_string()))?;
    table.set_monitored(dot, true);
    Ok((table, dot))
}
