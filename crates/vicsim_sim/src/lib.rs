//! Co-simulation driver for a cycle-level video chip model.
//!
//! This crate steps an opaque hardware model through picosecond time, tracks
//! which of its named signals changed, writes those changes as a VCD trace,
//! and can run the model in lock-step with an external reference process
//! (shadow mode), forwarding bus transactions and realigning the raster
//! position on request.
//!
//! # Usage
//!
//! ```ignore
//! use vicsim_sim::{simulate, SimConfig, TimingModel};
//! use vicsim_common::ChipModel;
//!
//! let config = SimConfig::new(ChipModel::Mos6569.profile());
//! let model = TimingModel::new(config.profile.clone());
//! let summary = simulate(model, &config, None, None)?;
//! println!("run ended at {}", summary.final_time);
//! ```
//!
//! # Modules
//!
//! - `time`: picosecond simulation time
//! - `evaluator`: the hardware model contract and its pins
//! - `timing_model`: a counter-only evaluator
//! - `clock`: clock domains and edge scheduling
//! - `signal`, `tracker`, `catalog`: observed signals and change detection
//! - `waveform`: VCD trace output
//! - `capture`, `checks`, `hook`: capture windows, watchpoints, step hooks
//! - `shadow`: the synchronisation protocol with a reference process
//! - `stepper`, `kernel`: the simulation loop

#![warn(missing_docs)]

pub mod capture;
pub mod catalog;
pub mod checks;
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod hook;
pub mod kernel;
pub mod shadow;
pub mod signal;
pub mod stepper;
pub mod time;
pub mod timing_model;
pub mod tracker;
pub mod waveform;

pub use capture::CaptureWindow;
pub use checks::{StateLine, Watchpoints};
pub use clock::{ClockDomain, SampleClock};
pub use error::SimError;
pub use evaluator::{Evaluator, Pin};
pub use hook::{FnHook, HookOutcome, StepHook};
pub use kernel::{EndReason, RunSummary, SimConfig, SimKernel};
pub use shadow::{
    Exchange, MemoryLink, ShadowError, ShadowFlags, ShadowLink, ShadowSession, ShadowState,
    StreamLink, TcpLink,
};
pub use signal::{Signal, SignalId, SignalTable};
pub use time::SimTime;
pub use timing_model::TimingModel;
pub use tracker::ChangeTracker;
pub use waveform::{TraceSink, VcdTimescale, VcdTraceSink};

/// High-level entry point: runs `eval` to completion.
///
/// Attaches the trace sink and shadow link when given. Without a shadow link
/// the run covers the capture-by-time window (or `time_limit`); with one it
/// runs until the reference stops or a one-frame capture completes.
pub fn simulate<'a, E: Evaluator>(
    eval: E,
    config: &SimConfig,
    trace: Option<&'a mut dyn TraceSink>,
    shadow: Option<&'a mut dyn ShadowLink>,
) -> Result<RunSummary, SimError> {
    let mut kernel = SimKernel::new(eval, config.clone())?;
    if let Some(sink) = trace {
        kernel.set_trace(sink);
    }
    if let Some(link) = shadow {
        kernel.set_shadow(link);
    }
    kernel.run()
}
