//! Deciding whether the current step is written to the trace.

use crate::time::SimTime;

/// The capture predicate: by elapsed time, by explicit flag, or for one
/// frame. Any one active condition is sufficient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureWindow {
    by_time: Option<(SimTime, SimTime)>,
    flag: bool,
    frame: bool,
}

impl CaptureWindow {
    /// A window that never captures until a flag is raised.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A time window covering `[start, start + duration]`, both ends inclusive.
    pub fn by_time(start: SimTime, duration_ps: u64) -> Self {
        let end = SimTime::from_ps(start.ps.saturating_add(duration_ps));
        Self {
            by_time: Some((start, end)),
            ..Self::default()
        }
    }

    /// Sets the capture-by-flag condition.
    pub fn set_flag(&mut self, on: bool) {
        self.flag = on;
    }

    /// Sets the capture-one-frame condition.
    pub fn set_frame(&mut self, on: bool) {
        self.frame = on;
    }

    /// Whether a step at `now` is captured.
    pub fn is_active(&self, now: SimTime) -> bool {
        let in_time = self
            .by_time
            .is_some_and(|(start, end)| now >= start && now <= end);
        in_time || self.flag || self.frame
    }

    /// Whether `now` has reached the end of the time window.
    pub fn time_window_elapsed(&self, now: SimTime) -> bool {
        self.by_time.is_some_and(|(_, end)| now >= end)
    }
}
