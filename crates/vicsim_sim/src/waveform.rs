//! Waveform trace output.
//!
//! The [`TraceSink`] trait abstracts trace output. [`VcdTraceSink`] writes the
//! Value Change Dump text format read by GTKWave, Surfer and other viewers:
//! a declaration block, an initial dump of every declared signal, then one
//! `#<time>` block per step in which something changed.

use std::io::Write;

use crate::error::SimError;
use crate::signal::{SignalId, SignalTable};
use crate::time::{SimTime, PS_PER_NS};
use crate::tracker::ChangeTracker;

/// Trait for recording sampled signals.
pub trait TraceSink {
    /// Declares the monitored signals and dumps their current values at
    /// `start`. Called exactly once, before any step.
    fn write_header(
        &mut self,
        start: SimTime,
        table: &SignalTable,
        tracker: &ChangeTracker,
    ) -> Result<(), SimError>;

    /// Records the declared signals that changed at `time`. Returns whether a
    /// timestamped block was written.
    fn write_step(
        &mut self,
        time: SimTime,
        table: &SignalTable,
        tracker: &ChangeTracker,
    ) -> Result<bool, SimError>;

    /// Flushes and closes the trace.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// Unit of trace timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VcdTimescale {
    /// Picoseconds.
    #[default]
    Ps,
    /// Nanoseconds (timestamps truncated).
    Ns,
}

impl VcdTimescale {
    fn unit(self) -> &'static str {
        match self {
            VcdTimescale::Ps => "1ps",
            VcdTimescale::Ns => "1ns",
        }
    }

    fn scale(self, time: SimTime) -> u64 {
        match self {
            VcdTimescale::Ps => time.ps,
            VcdTimescale::Ns => time.ps / PS_PER_NS,
        }
    }
}

/// VCD writer.
///
/// The declared signal set is frozen when the header is written; signals
/// monitored later are never emitted. Within a step, values are written in
/// table registration order so identical runs give identical bytes.
pub struct VcdTraceSink<W: Write> {
    writer: W,
    timescale: VcdTimescale,
    comment: String,
    declared: Vec<SignalId>,
    header_written: bool,
    finalized: bool,
    last_time: Option<SimTime>,
}

impl<W: Write> VcdTraceSink<W> {
    /// Creates a sink writing to `writer`. `comment` names the design in
    /// the header.
    pub fn new(writer: W, timescale: VcdTimescale, comment: impl Into<String>) -> Self {
        Self {
            writer,
            timescale,
            comment: comment.into(),
            declared: Vec::new(),
            header_written: false,
            finalized: false,
            last_time: None,
        }
    }

    /// Signals declared in the header.
    pub fn declared(&self) -> &[SignalId] {
        &self.declared
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn bit(value: bool) -> char {
        if value {
            '1'
        } else {
            '0'
        }
    }
}

impl<W: Write> TraceSink for VcdTraceSink<W> {
    fn write_header(
        &mut self,
        start: SimTime,
        table: &SignalTable,
        tracker: &ChangeTracker,
    ) -> Result<(), SimError> {
        if self.header_written {
            return Err(SimError::Trace("header already written".into()));
        }
        self.declared = table.monitored().map(|(id, _)| id).collect();

        let w = &mut self.writer;
        writeln!(w, "$date")?;
        writeln!(w, "   January 1, 1979.")?;
        writeln!(w, "$end")?;
        writeln!(w, "$version")?;
        writeln!(w, "   {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(w, "$end")?;
        writeln!(w, "$comment")?;
        writeln!(w, "   VCD {}", self.comment)?;
        writeln!(w, "$end")?;
        writeln!(w, "$timescale {} $end", self.timescale.unit())?;
        writeln!(w, "$scope module logic $end")?;
        for &id in &self.declared {
            let signal = table.get(id);
            writeln!(w, "$var wire 1 {} {} $end", signal.id_code, signal.label)?;
        }
        writeln!(w, "$upscope $end")?;
        writeln!(w, "$enddefinitions $end")?;
        writeln!(w, "$dumpvars")?;
        for &id in &self.declared {
            writeln!(w, "x{}", table.get(id).id_code)?;
        }
        writeln!(w, "$end")?;

        writeln!(w, "#{}", self.timescale.scale(start))?;
        for &id in &self.declared {
            let value = Self::bit(tracker.value(id));
            writeln!(w, "{value}{}", table.get(id).id_code)?;
        }
        w.flush()?;

        self.header_written = true;
        self.last_time = Some(start);
        Ok(())
    }

    fn write_step(
        &mut self,
        time: SimTime,
        table: &SignalTable,
        tracker: &ChangeTracker,
    ) -> Result<bool, SimError> {
        if !self.header_written {
            return Err(SimError::Trace("step written before header".into()));
        }
        if self.finalized {
            return Err(SimError::Trace("step written after finalize".into()));
        }
        if let Some(last) = self.last_time {
            if time < last {
                return Err(SimError::Trace(format!(
                    "time went backwards: {time} after {last}"
                )));
            }
        }

        let mut stamped = false;
        for &id in &self.declared {
            if !tracker.has_changed(id) {
                continue;
            }
            if !stamped {
                writeln!(self.writer, "#{}", self.timescale.scale(time))?;
                stamped = true;
            }
            let value = Self::bit(tracker.value(id));
            writeln!(self.writer, "{value}{}", table.get(id).id_code)?;
        }
        self.last_time = Some(time);
        Ok(stamped)
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if !self.finalized {
            self.finalized = true;
            self.writer.flush()?;
        }
        Ok(())
    }
}
