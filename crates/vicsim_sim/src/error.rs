//! Simulation error types.
//!
//! Errors fall into two groups. Setup errors (bad clock domains, bad signal
//! registrations, a signal filter that selects nothing) are reported before
//! the loop starts. Everything raised once the loop is running means the
//! local model and the external reference have diverged; the run is aborted.

use std::io;

use crate::shadow::ShadowError;
use crate::time::SimTime;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A clock domain was declared with an unusable period.
    #[error("invalid clock domain '{name}': {reason}")]
    InvalidClockDomain {
        /// Domain name.
        name: String,
        /// Why the domain was rejected.
        reason: String,
    },

    /// The picosecond counter would overflow.
    #[error("simulation time overflow after {time}")]
    ClockOverflow {
        /// Last representable time reached.
        time: SimTime,
    },

    /// A signal registration was rejected.
    #[error("invalid signal '{label}': {reason}")]
    InvalidSignal {
        /// Display label of the rejected signal.
        label: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A signal filter entry matched no registered signal.
    #[error("signal filter '{0}' matches no signal")]
    UnknownSignal(String),

    /// The trace writer was driven out of order.
    #[error("trace error: {0}")]
    Trace(String),

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),

    /// A watchpoint or protocol precondition failed.
    #[error("consistency check failed at {time}: {condition}")]
    ConsistencyCheck {
        /// Simulated time of the failing step.
        time: SimTime,
        /// The condition that did not hold.
        condition: String,
    },

    /// Realignment did not reach the requested coordinate within one frame.
    #[error("realignment to cycle {cycle}, raster line {raster_line} not reached by {time}")]
    RealignTimeout {
        /// Simulated time when realignment gave up.
        time: SimTime,
        /// Requested bus cycle.
        cycle: u16,
        /// Requested raster line.
        raster_line: u16,
    },

    /// The injected step hook reported a failure.
    #[error("step hook failed at {time}: {reason}")]
    HookFailed {
        /// Simulated time of the failing step.
        time: SimTime,
        /// Reason given by the hook.
        reason: String,
    },

    /// The shadow link failed.
    #[error(transparent)]
    Shadow(#[from] ShadowError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_check_display() {
        let e = SimError::ConsistencyCheck {
            time: SimTime::from_ns(5),
            condition: "aec == 0".into(),
        };
        assert_eq!(e.to_string(), "consistency check failed at 5 ns: aec == 0");
    }

    #[test]
    fn realign_timeout_display() {
        let e = SimError::RealignTimeout {
            time: SimTime::from_us(3),
            cycle: 12,
            raster_line: 100,
        };
        assert_eq!(
            e.to_string(),
            "realignment to cycle 12, raster line 100 not reached by 3 us"
        );
    }

    #[test]
    fn unknown_signal_display() {
        let e = SimError::UnknownSignal("foo*".into());
        assert_eq!(e.to_string(), "signal filter 'foo*' matches no signal");
    }

    #[test]
    fn hook_failed_display() {
        let e = SimError::HookFailed {
            time: SimTime::from_ps(10),
            reason: "golden mismatch".into(),
        };
        assert_eq!(e.to_string(), "step hook failed at 10 ps: golden mismatch");
    }

    #[test]
    fn waveform_io_display() {
        let e = SimError::WaveformIo(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.to_string().contains("waveform I/O error"));
    }

    #[test]
    fn shadow_error_is_transparent() {
        let e = SimError::from(ShadowError::NotOpen);
        assert_eq!(e.to_string(), ShadowError::NotOpen.to_string());
    }
}
