//! The top-level simulation loop.
//!
//! Every iteration is one clock edge:
//!
//! 1. in shadow mode, receive a message if none is leased, then forward its
//!    bus fields
//! 2. settle the model and sample the monitored signals
//! 3. consult the step hook
//! 4. if capturing, trace the changes and run the watchpoints
//! 5. in shadow mode, respond
//! 6. store the snapshot, check the stop conditions, advance the clock

use vicsim_common::ChipProfile;

use crate::capture::CaptureWindow;
use crate::catalog::standard_signals;
use crate::checks::Watchpoints;
use crate::clock::SampleClock;
use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};
use crate::hook::{HookOutcome, StepHook};
use crate::shadow::{Exchange, ShadowLink, ShadowSession};
use crate::stepper::Stepper;
use crate::time::{SimTime, PS_PER_US};
use crate::waveform::TraceSink;

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The capture-by-time window closed.
    WindowElapsed,
    /// The step hook ended the run.
    HookEnded,
    /// The reference requested termination and was acknowledged.
    ShadowStopped,
    /// The shadow link delivered no further messages.
    LinkClosed,
    /// A one-frame capture reached the end of the frame.
    FrameCaptured,
    /// The configured time limit was reached.
    LimitReached,
    /// The model requested the run to stop.
    ModelFinished,
}

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Time of the last processed edge.
    pub final_time: SimTime,
    /// Settle steps performed by the main loop (realignment excluded).
    pub steps: u64,
    /// Shadow messages answered.
    pub exchanges: u64,
    /// Change blocks written to the trace after the initial dump.
    pub trace_records: u64,
    /// Why the run ended.
    pub end_reason: EndReason,
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Chip variant timing.
    pub profile: ChipProfile,
    /// Also drive the colour reference clock domain.
    pub color_clock: bool,
    /// Start of the capture-by-time window. The trace header is stamped at
    /// the first captured step, which is the first edge at or after this time
    /// unless shadow flags open capture first.
    pub capture_start: SimTime,
    /// Length of the capture-by-time window in picoseconds. `None` uses the
    /// profile's default (about one frame).
    pub capture_duration_ps: Option<u64>,
    /// Signal labels or wildcard patterns to monitor in addition to `dot`.
    pub monitor: Vec<String>,
    /// Evaluate the pixel-dot watchpoints on captured steps.
    pub watchpoints: bool,
    /// Stop at this time instead of at the end of the capture window.
    pub time_limit: Option<SimTime>,
}

impl SimConfig {
    /// Defaults for a chip: one frame from time zero, `dot` only,
    /// watchpoints on.
    pub fn new(profile: ChipProfile) -> Self {
        Self {
            profile,
            color_clock: false,
            capture_start: SimTime::zero(),
            capture_duration_ps: None,
            monitor: Vec::new(),
            watchpoints: true,
            time_limit: None,
        }
    }

    /// The effective capture duration.
    pub fn capture_duration_ps(&self) -> u64 {
        self.capture_duration_ps
            .unwrap_or(self.profile.default_capture_us * PS_PER_US)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new(vicsim_common::ChipModel::Mos6569.profile())
    }
}

/// The simulation kernel.
///
/// Owns the evaluator; borrows the optional trace sink, shadow link and step
/// hook for the duration of the run.
pub struct SimKernel<'a, E: Evaluator> {
    stepper: Stepper<E>,
    config: SimConfig,
    window: CaptureWindow,
    watchpoints: Option<Watchpoints>,
    trace: Option<&'a mut dyn TraceSink>,
    session: Option<ShadowSession<'a>>,
    hook: Option<&'a mut dyn StepHook>,
    header_written: bool,
    steps: u64,
    trace_records: u64,
}

impl<'a, E: Evaluator> SimKernel<'a, E> {
    /// Builds the standard signal table, applies the monitor selection and
    /// sets up the clock domains for the configured chip.
    pub fn new(eval: E, config: SimConfig) -> Result<Self, SimError> {
        let (mut table, dot) = standard_signals()?;
        table.select(&config.monitor)?;
        let clock = SampleClock::for_profile(&config.profile, config.color_clock)?;
        let stepper = Stepper::new(eval, config.profile.clone(), clock, table, dot)?;
        let watchpoints = config
            .watchpoints
            .then(|| Watchpoints::new(config.profile.clone()));
        Ok(Self {
            stepper,
            window: CaptureWindow::by_time(config.capture_start, config.capture_duration_ps()),
            watchpoints,
            config,
            trace: None,
            session: None,
            hook: None,
            header_written: false,
            steps: 0,
            trace_records: 0,
        })
    }

    /// Attaches a trace sink.
    pub fn set_trace(&mut self, sink: &'a mut dyn TraceSink) {
        self.trace = Some(sink);
    }

    /// Runs in shadow mode over `link`. Disables capture-by-time.
    pub fn set_shadow(&mut self, link: &'a mut dyn ShadowLink) {
        self.session = Some(ShadowSession::new(link));
        self.window = CaptureWindow::disabled();
    }

    /// Installs a step hook. Disables capture-by-time.
    pub fn set_hook(&mut self, hook: &'a mut dyn StepHook) {
        self.hook = Some(hook);
        self.window = CaptureWindow::disabled();
    }

    /// The stepper, for inspecting the model after a run.
    pub fn stepper(&self) -> &Stepper<E> {
        &self.stepper
    }

    /// Consumes the kernel, returning the evaluator.
    pub fn into_evaluator(self) -> E {
        self.stepper.into_evaluator()
    }

    /// Runs to completion.
    ///
    /// Whatever the outcome, a leased shadow message is released once, the
    /// link is closed, the trace is finalized and the model is finalized.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        let result = self.run_loop();
        let cleanup = self.shutdown();
        match (result, cleanup) {
            (Ok(summary), Ok(())) => {
                log::info!(
                    "run ended ({:?}) at {} after {} steps, {} exchanges, {} trace records",
                    summary.end_reason,
                    summary.final_time,
                    summary.steps,
                    summary.exchanges,
                    summary.trace_records
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                log::warn!("cleanup after failed run also failed: {cleanup}");
                Err(e)
            }
        }
    }

    fn summary(&self, end_reason: EndReason) -> RunSummary {
        RunSummary {
            final_time: self.stepper.now(),
            steps: self.steps,
            exchanges: self.session.as_ref().map_or(0, ShadowSession::exchanges),
            trace_records: self.trace_records,
            end_reason,
        }
    }

    fn start(&mut self) -> Result<Option<EndReason>, SimError> {
        let profile = &self.config.profile;
        log::info!(
            "chip {} ({:?}), dot4x half period {} ps",
            profile.model,
            profile.standard,
            profile.dot4x_half_period_ps()
        );
        let code = u16::from(profile.model.code());

        self.stepper.set_input(Pin::Rw, 1);
        self.stepper.set_input(Pin::Ce, 1);
        self.stepper.set_input(Pin::Rst, 0);
        self.stepper.set_input(Pin::AddrIn, 0);
        self.stepper.set_input(Pin::DataIn, 0);
        self.stepper.set_input(Pin::Chip, code);
        self.stepper.drive_clocks();

        if let Some(hook) = self.hook.as_deref_mut() {
            match hook.on_start(self.stepper.evaluator_mut()) {
                HookOutcome::Continue => {}
                HookOutcome::End => return Ok(Some(EndReason::HookEnded)),
                HookOutcome::Fail(reason) => {
                    return Err(SimError::HookFailed {
                        time: self.stepper.now(),
                        reason,
                    })
                }
            }
        }

        self.stepper.settle();
        self.stepper.store_previous();

        if let Some(session) = self.session.as_mut() {
            session.open()?;
        }
        Ok(None)
    }

    fn run_loop(&mut self) -> Result<RunSummary, SimError> {
        if let Some(reason) = self.start()? {
            return Ok(self.summary(reason));
        }

        let reason = loop {
            if let Some(session) = self.session.as_mut() {
                if !session.holds_lease() && !session.receive(&mut self.stepper)? {
                    break EndReason::LinkClosed;
                }
                session.apply_bus(&mut self.stepper);
            }

            self.stepper.settle();
            self.steps += 1;
            self.stepper.log_state();
            let now = self.stepper.now();

            if let Some(hook) = self.hook.as_deref_mut() {
                match hook.after_settle(self.stepper.evaluator(), now) {
                    HookOutcome::Continue => {}
                    HookOutcome::End => break EndReason::HookEnded,
                    HookOutcome::Fail(reason) => {
                        return Err(SimError::HookFailed { time: now, reason })
                    }
                }
            }

            if let Some(session) = self.session.as_ref() {
                self.window.set_flag(session.capture_flag());
                self.window.set_frame(session.capture_frame());
            }
            if self.window.is_active(now) {
                self.trace_step(now)?;
                if self.stepper.dot_rising() {
                    if let Some(watch) = &self.watchpoints {
                        watch.check(self.stepper.evaluator(), now)?;
                    }
                }
            }

            if let Some(session) = self.session.as_mut() {
                match session.respond(&self.stepper)? {
                    Exchange::Pending | Exchange::Released => {}
                    Exchange::Stopped => break EndReason::ShadowStopped,
                    Exchange::FrameCaptured => break EndReason::FrameCaptured,
                }
            }

            self.stepper.store_previous();

            if self.stepper.evaluator().finished() {
                break EndReason::ModelFinished;
            }
            match self.config.time_limit {
                Some(limit) if now >= limit => break EndReason::LimitReached,
                None if self.window.time_window_elapsed(now) => break EndReason::WindowElapsed,
                _ => {}
            }

            self.stepper.advance()?;
        };
        Ok(self.summary(reason))
    }

    /// Writes the current step to the trace. The first captured step dumps
    /// the header with the values sampled at that time.
    fn trace_step(&mut self, now: SimTime) -> Result<(), SimError> {
        let Some(trace) = self.trace.as_deref_mut() else {
            return Ok(());
        };
        if !self.header_written {
            self.header_written = true;
            return trace.write_header(now, self.stepper.table(), self.stepper.tracker());
        }
        if self.stepper.tracker().any_changed()
            && trace.write_step(now, self.stepper.table(), self.stepper.tracker())?
        {
            self.trace_records += 1;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), SimError> {
        let shadow = match self.session.as_mut() {
            Some(session) => session.finish(),
            None => Ok(()),
        };
        let trace = match self.trace.as_deref_mut() {
            Some(trace) if !self.header_written => {
                // nothing was captured; leave a well-formed trace
                self.header_written = true;
                let now = self.stepper.now();
                let header = trace.write_header(now, self.stepper.table(), self.stepper.tracker());
                header.and(trace.finalize())
            }
            Some(trace) => trace.finalize(),
            None => Ok(()),
        };
        self.stepper.evaluator_mut().finalize();
        shadow.and(trace)
    }
}
