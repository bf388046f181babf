//! Video chip variants and their timing profiles.
//!
//! A [`ChipModel`] names one of the supported silicon revisions. Its
//! [`ChipProfile`] carries everything the driver needs to know about that
//! revision without looking inside the hardware model: clock frequencies,
//! raster geometry, and the layout of the horizontal position counter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;

/// Pixel-dot clock periods per bus cycle.
pub const DOTS_PER_CYCLE: u16 = 8;

/// Raster position at which the horizontal counter wraps back to zero.
const XPOS_ROLLOVER_DOT: u16 = 100;

/// Television standard the chip generates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoStandard {
    /// 525-line, 60 Hz.
    Ntsc,
    /// 625-line, 50 Hz.
    Pal,
}

/// A supported chip revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipModel {
    /// NTSC revision with 65 cycles per line.
    #[serde(rename = "6567r8")]
    Mos6567R8,
    /// Early NTSC revision with 64 cycles per line.
    #[serde(rename = "6567r56a")]
    Mos6567R56A,
    /// PAL revision with 63 cycles per line.
    #[serde(rename = "6569")]
    Mos6569,
}

impl ChipModel {
    /// All supported variants, in code order.
    pub const ALL: [ChipModel; 3] = [
        ChipModel::Mos6567R8,
        ChipModel::Mos6567R56A,
        ChipModel::Mos6569,
    ];

    /// The numeric code driven onto the model's chip-select input.
    pub fn code(self) -> u8 {
        match self {
            ChipModel::Mos6567R8 => 0,
            ChipModel::Mos6567R56A => 1,
            ChipModel::Mos6569 => 2,
        }
    }

    /// Looks up a variant from its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Returns the timing profile for this variant.
    pub fn profile(self) -> ChipProfile {
        match self {
            ChipModel::Mos6567R8 => ChipProfile {
                model: self,
                standard: VideoStandard::Ntsc,
                dot_clock: Frequency::new(8_181_816.0),
                color_clock: Frequency::from_mhz(14.318181),
                cycles_per_line: 65,
                lines_per_frame: 263,
                xpos_reset: 0x19c,
                xpos_repeat: Some(HorizontalRepeat {
                    value: 0x184,
                    dots: 8,
                }),
                default_capture_us: 16_700,
                frame_end: FramePoint::ORIGIN,
            },
            ChipModel::Mos6567R56A => ChipProfile {
                model: self,
                standard: VideoStandard::Ntsc,
                dot_clock: Frequency::new(8_181_816.0),
                color_clock: Frequency::from_mhz(14.318181),
                cycles_per_line: 64,
                lines_per_frame: 262,
                xpos_reset: 0x19c,
                xpos_repeat: None,
                default_capture_us: 16_700,
                frame_end: FramePoint::ORIGIN,
            },
            ChipModel::Mos6569 => ChipProfile {
                model: self,
                standard: VideoStandard::Pal,
                dot_clock: Frequency::new(7_881_984.0),
                color_clock: Frequency::new(17_734_475.0),
                cycles_per_line: 63,
                lines_per_frame: 312,
                xpos_reset: 0x194,
                xpos_repeat: None,
                default_capture_us: 20_000,
                frame_end: FramePoint::ORIGIN,
            },
        }
    }
}

impl fmt::Display for ChipModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChipModel::Mos6567R8 => "6567R8",
            ChipModel::Mos6567R56A => "6567R56A",
            ChipModel::Mos6569 => "6569",
        };
        f.write_str(name)
    }
}

/// Error returned when a chip name or code is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chip '{input}' (expected 6567r8, 6567r56a, 6569 or 0..=2)")]
pub struct ParseChipError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for ChipModel {
    type Err = ParseChipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        let norm = norm.strip_prefix("mos").unwrap_or(&norm);
        match norm {
            "0" | "6567r8" => Ok(ChipModel::Mos6567R8),
            "1" | "6567r56a" => Ok(ChipModel::Mos6567R56A),
            "2" | "6569" => Ok(ChipModel::Mos6569),
            _ => Err(ParseChipError {
                input: s.to_string(),
            }),
        }
    }
}

/// A run of dots during which the horizontal counter holds its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HorizontalRepeat {
    /// Counter value that is repeated.
    pub value: u16,
    /// Number of extra dots the value is held for.
    pub dots: u16,
}

/// A raster coordinate: horizontal raster position and raster line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FramePoint {
    /// Dot index within the line (`cycle * 8 + bit cycle`).
    pub raster_x: u16,
    /// Raster line.
    pub raster_line: u16,
}

impl FramePoint {
    /// The first dot of the first line.
    pub const ORIGIN: FramePoint = FramePoint {
        raster_x: 0,
        raster_line: 0,
    };
}

/// Per-variant clock and raster parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ChipProfile {
    /// The variant this profile describes.
    pub model: ChipModel,
    /// Television standard.
    pub standard: VideoStandard,
    /// Pixel-dot clock frequency.
    pub dot_clock: Frequency,
    /// Colour reference clock (four times the colour subcarrier).
    pub color_clock: Frequency,
    /// Bus cycles per raster line.
    pub cycles_per_line: u16,
    /// Raster lines per frame.
    pub lines_per_frame: u16,
    /// Horizontal counter value at cycle 0, bit cycle 0.
    pub xpos_reset: u16,
    /// Optional held value late in the line (6567R8 only).
    pub xpos_repeat: Option<HorizontalRepeat>,
    /// Default capture-by-time duration in microseconds (about one frame).
    pub default_capture_us: u64,
    /// Coordinate at which a one-frame capture ends.
    pub frame_end: FramePoint,
}

impl ChipProfile {
    /// Pixel dots per raster line.
    pub fn dots_per_line(&self) -> u16 {
        self.cycles_per_line * DOTS_PER_CYCLE
    }

    /// Toggle interval of the 4x pixel-dot clock enable, in picoseconds.
    pub fn dot4x_half_period_ps(&self) -> u64 {
        self.dot_clock.times(4).half_period_ps()
    }

    /// Toggle interval of the colour reference clock enable, in picoseconds.
    pub fn color_half_period_ps(&self) -> u64 {
        self.color_clock.half_period_ps()
    }

    /// Horizontal counter value at the given dot of a line.
    ///
    /// The counter starts at `xpos_reset` on the first dot, wraps to zero at
    /// cycle 12 bit cycle 4, and on the 6567R8 holds `0x184` for eight extra
    /// dots so the line closes back onto the reset value.
    pub fn xpos_at(&self, raster_x: u16) -> u16 {
        if raster_x < XPOS_ROLLOVER_DOT {
            return self.xpos_reset + raster_x;
        }
        let base = raster_x - XPOS_ROLLOVER_DOT;
        match self.xpos_repeat {
            Some(rep) if base > rep.value => {
                if base <= rep.value + rep.dots {
                    rep.value
                } else {
                    base - rep.dots
                }
            }
            _ => base,
        }
    }

    /// The raster coordinate one pixel dot before `point`, wrapping across
    /// line and frame boundaries.
    pub fn previous_dot(&self, point: FramePoint) -> FramePoint {
        if point.raster_x > 0 {
            return FramePoint {
                raster_x: point.raster_x - 1,
                raster_line: point.raster_line,
            };
        }
        let raster_line = if point.raster_line == 0 {
            self.lines_per_frame - 1
        } else {
            point.raster_line - 1
        };
        FramePoint {
            raster_x: self.dots_per_line() - 1,
            raster_line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for model in ChipModel::ALL {
            assert_eq!(ChipModel::from_code(model.code()), Some(model));
        }
        assert_eq!(ChipModel::from_code(7), None);
    }

    #[test]
    fn parse_names_and_codes() {
        assert_eq!("6569".parse::<ChipModel>().unwrap(), ChipModel::Mos6569);
        assert_eq!(
            "MOS6567R8".parse::<ChipModel>().unwrap(),
            ChipModel::Mos6567R8
        );
        assert_eq!("1".parse::<ChipModel>().unwrap(), ChipModel::Mos6567R56A);
        assert!("6560".parse::<ChipModel>().is_err());
    }

    #[test]
    fn parse_error_message() {
        let err = "vic20".parse::<ChipModel>().unwrap_err();
        assert!(err.to_string().starts_with("unknown chip 'vic20'"));
    }

    #[test]
    fn line_geometry() {
        assert_eq!(ChipModel::Mos6569.profile().dots_per_line(), 504);
        assert_eq!(ChipModel::Mos6567R56A.profile().dots_per_line(), 512);
        assert_eq!(ChipModel::Mos6567R8.profile().dots_per_line(), 520);
    }

    #[test]
    fn pal_xpos_layout() {
        let p = ChipModel::Mos6569.profile();
        assert_eq!(p.xpos_at(0), 0x194);
        assert_eq!(p.xpos_at(99), 0x1f7);
        assert_eq!(p.xpos_at(12 * 8 + 4), 0);
        assert_eq!(p.xpos_at(503), 0x193);
    }

    #[test]
    fn r8_xpos_repeat() {
        let p = ChipModel::Mos6567R8.profile();
        assert_eq!(p.xpos_at(61 * 8), 0x184);
        assert_eq!(p.xpos_at(61 * 8 + 4), 0x184);
        assert_eq!(p.xpos_at(62 * 8), 0x184);
        assert_eq!(p.xpos_at(62 * 8 + 1), 0x185);
        assert_eq!(p.xpos_at(519), 0x19b);
    }

    #[test]
    fn r56a_xpos_closes_line() {
        let p = ChipModel::Mos6567R56A.profile();
        assert_eq!(p.xpos_at(511), 0x19b);
        assert_eq!(p.xpos_at(12 * 8 + 4), 0);
    }

    #[test]
    fn previous_dot_wraps() {
        let p = ChipModel::Mos6569.profile();
        let prev = p.previous_dot(FramePoint {
            raster_x: 96,
            raster_line: 100,
        });
        assert_eq!(prev.raster_x, 95);
        assert_eq!(prev.raster_line, 100);

        let prev = p.previous_dot(FramePoint::ORIGIN);
        assert_eq!(prev.raster_x, 503);
        assert_eq!(prev.raster_line, 311);
    }

    #[test]
    fn default_capture_durations() {
        assert_eq!(ChipModel::Mos6569.profile().default_capture_us, 20_000);
        assert_eq!(ChipModel::Mos6567R8.profile().default_capture_us, 16_700);
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&ChipModel::Mos6567R56A).unwrap();
        assert_eq!(json, "\"6567r56a\"");
        let back: ChipModel = serde_json::from_str("\"6569\"").unwrap();
        assert_eq!(back, ChipModel::Mos6569);
    }
}
