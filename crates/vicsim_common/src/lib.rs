//! Shared foundational types for the vicsim co-simulation driver.
//!
//! This crate describes the video chip variants the driver knows about: their
//! clock frequencies, raster geometry and horizontal counter layout. Nothing
//! here touches the hardware model itself.

#![warn(missing_docs)]

pub mod chip;
pub mod frequency;

pub use chip::{
    ChipModel, ChipProfile, FramePoint, HorizontalRepeat, ParseChipError, VideoStandard,
    DOTS_PER_CYCLE,
};
pub use frequency::{Frequency, ParseFrequencyError};
