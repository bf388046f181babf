//! Injected per-step strategy, used by golden-master test drivers.

use crate::evaluator::Evaluator;
use crate::time::SimTime;

/// What a hook wants the loop to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    /// Keep running.
    Continue,
    /// Stop the run successfully.
    End,
    /// Abort the run with a reason.
    Fail(String),
}

/// A strategy object consulted once before the run and after every settle.
///
/// Installing a hook disables capture-by-time; the hook decides when the run
/// ends.
pub trait StepHook {
    /// Called once after the initial inputs are driven, before the first
    /// settle. May drive additional inputs.
    fn on_start(&mut self, _eval: &mut dyn Evaluator) -> HookOutcome {
        HookOutcome::Continue
    }

    /// Called after each settle with the model's fresh state.
    fn after_settle(&mut self, eval: &dyn Evaluator, now: SimTime) -> HookOutcome;
}

/// Adapts a closure into an [`after_settle`](StepHook::after_settle)-only
/// hook.
pub struct FnHook<F>(pub F);

impl<F> StepHook for FnHook<F>
where
    F: FnMut(&dyn Evaluator, SimTime) -> HookOutcome,
{
    fn after_settle(&mut self, eval: &dyn Evaluator, now: SimTime) -> HookOutcome {
        (self.0)(eval, now)
    }
}
