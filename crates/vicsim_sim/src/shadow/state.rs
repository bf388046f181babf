//! The state snapshot exchanged with the reference process.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Request and acknowledgement bits carried by a [`ShadowState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShadowFlags(u32);

impl ShadowFlags {
    /// No flags.
    pub const NONE: ShadowFlags = ShadowFlags(0);
    /// Start writing captured steps to the trace.
    pub const CAPTURE_START: ShadowFlags = ShadowFlags(1 << 0);
    /// Capture until the end of the current frame, then stop.
    pub const CAPTURE_ONE_FRAME: ShadowFlags = ShadowFlags(1 << 1);
    /// Realign the model to the carried cycle and raster line.
    pub const SYNC_STATE: ShadowFlags = ShadowFlags(1 << 2);
    /// The carried bus fields describe a CPU access.
    pub const BUS_ACCESS: ShadowFlags = ShadowFlags(1 << 3);
    /// Stop after this exchange. Left set in the response as the
    /// acknowledgement.
    pub const CAPTURE_END: ShadowFlags = ShadowFlags(1 << 4);

    /// Creates flags from raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: ShadowFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: ShadowFlags) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    pub fn remove(&mut self, other: ShadowFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for ShadowFlags {
    type Output = ShadowFlags;

    fn bitor(self, rhs: ShadowFlags) -> ShadowFlags {
        ShadowFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for ShadowFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ShadowFlags, &str); 5] = [
            (ShadowFlags::CAPTURE_START, "capture_start"),
            (ShadowFlags::CAPTURE_ONE_FRAME, "capture_one_frame"),
            (ShadowFlags::SYNC_STATE, "sync_state"),
            (ShadowFlags::BUS_ACCESS, "bus_access"),
            (ShadowFlags::CAPTURE_END, "capture_end"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&set.join("|"))
        }
    }
}

/// One message of the shadow protocol.
///
/// The reference process fills in the request fields. The session writes
/// back `phi`, `data` on chip-selected reads, and keeps `CAPTURE_END` set as
/// the termination acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowState {
    /// Request and acknowledgement bits.
    pub flags: ShadowFlags,
    /// Target bus cycle for realignment.
    pub cycle_num: u16,
    /// Target raster line for realignment.
    pub raster_line: u16,
    /// Horizontal counter the reference expects at the target.
    pub xpos: u16,
    /// Address bus.
    pub addr: u16,
    /// Chip enable, active low.
    pub ce: u8,
    /// Read/write direction, 1 = read.
    pub rw: u8,
    /// Data bus.
    pub data: u8,
    /// Two-phase clock level reported back by the session.
    pub phi: u8,
}

impl Default for ShadowState {
    fn default() -> Self {
        Self {
            flags: ShadowFlags::NONE,
            cycle_num: 0,
            raster_line: 0,
            xpos: 0,
            addr: 0,
            ce: 1,
            rw: 1,
            data: 0,
            phi: 0,
        }
    }
}

impl ShadowState {
    /// A message carrying only `flags`, with an idle bus.
    pub fn with_flags(flags: ShadowFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// A realignment request.
    pub fn sync_to(cycle_num: u16, raster_line: u16, xpos: u16) -> Self {
        Self {
            flags: ShadowFlags::SYNC_STATE,
            cycle_num,
            raster_line,
            xpos,
            ..Self::default()
        }
    }

    /// A chip-selected write.
    pub fn is_write(&self) -> bool {
        self.ce == 0 && self.rw == 0
    }

    /// A chip-selected read.
    pub fn is_read(&self) -> bool {
        self.ce == 0 && self.rw == 1
    }

    /// Returns the bus fields to their deselected values.
    pub fn idle_bus(&mut self) {
        self.ce = 1;
        self.rw = 1;
        self.addr = 0;
        self.data = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_ops() {
        let mut f = ShadowFlags::CAPTURE_START | ShadowFlags::SYNC_STATE;
        assert!(f.contains(ShadowFlags::SYNC_STATE));
        assert!(!f.contains(ShadowFlags::CAPTURE_END));
        f.remove(ShadowFlags::SYNC_STATE);
        assert_eq!(f, ShadowFlags::CAPTURE_START);
        f.insert(ShadowFlags::CAPTURE_END);
        assert_eq!(f.bits(), 0b1_0001);
        assert_eq!(f.to_string(), "capture_start|capture_end");
        assert_eq!(ShadowFlags::NONE.to_string(), "-");
    }

    #[test]
    fn default_bus_is_idle() {
        let s = ShadowState::default();
        assert!(!s.is_read());
        assert!(!s.is_write());
        let mut s = ShadowState {
            ce: 0,
            rw: 0,
            addr: 0x20,
            data: 7,
            ..ShadowState::default()
        };
        assert!(s.is_write());
        s.idle_bus();
        assert_eq!(s, ShadowState::default());
    }

    #[test]
    fn serde_roundtrip() {
        let s = ShadowState::sync_to(12, 100, 0x5c);
        let json = serde_json::to_string(&s).unwrap();
        let back: ShadowState = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
