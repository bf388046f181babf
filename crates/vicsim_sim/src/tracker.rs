//! Per-step change detection over the signal table.

use crate::evaluator::Evaluator;
use crate::signal::{SignalId, SignalTable};

/// Current and previous samples of every signal.
///
/// Only monitored signals are sampled; every predicate is `false` for an
/// unmonitored signal. Call [`sample`](Self::sample) after each settle and
/// [`store_previous`](Self::store_previous) once all consumers of that step
/// have looked at it.
#[derive(Clone, Debug)]
pub struct ChangeTracker {
    monitored: Vec<bool>,
    current: Vec<bool>,
    previous: Vec<bool>,
}

impl ChangeTracker {
    /// Creates a tracker sized for `table` with every sample low.
    pub fn new(table: &SignalTable) -> Self {
        let n = table.len();
        Self {
            monitored: table.iter().map(|(_, s)| s.monitored).collect(),
            current: vec![false; n],
            previous: vec![false; n],
        }
    }

    /// Reads every monitored signal from the model.
    pub fn sample<E: Evaluator + ?Sized>(&mut self, table: &SignalTable, eval: &E) {
        self.monitored.resize(table.len(), false);
        self.current.resize(table.len(), false);
        self.previous.resize(table.len(), false);
        for (id, signal) in table.iter() {
            let i = id.as_raw() as usize;
            self.monitored[i] = signal.monitored;
            self.current[i] = signal.monitored && table.sample(eval, id);
        }
    }

    /// Snapshots the current samples as the baseline for the next step.
    pub fn store_previous(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }

    fn slot(&self, id: SignalId) -> usize {
        id.as_raw() as usize
    }

    /// Current sampled value.
    pub fn value(&self, id: SignalId) -> bool {
        self.current[self.slot(id)]
    }

    /// Monitored and different from the previous snapshot.
    pub fn has_changed(&self, id: SignalId) -> bool {
        let i = self.slot(id);
        self.monitored[i] && self.current[i] != self.previous[i]
    }

    /// Monitored and currently high.
    pub fn is_asserted(&self, id: SignalId) -> bool {
        let i = self.slot(id);
        self.monitored[i] && self.current[i]
    }

    /// Changed from low to high this step.
    pub fn rising(&self, id: SignalId) -> bool {
        self.has_changed(id) && self.current[self.slot(id)]
    }

    /// Changed from high to low this step.
    pub fn falling(&self, id: SignalId) -> bool {
        self.has_changed(id) && !self.current[self.slot(id)]
    }

    /// Whether any monitored signal changed this step.
    pub fn any_changed(&self) -> bool {
        (0..self.current.len()).any(|i| self.monitored[i] && self.current[i] != self.previous[i])
    }

    /// Signals that changed this step, in registration order.
    pub fn changed(&self) -> impl Iterator<Item = SignalId> + '_ {
        (0..self.current.len())
            .filter(|&i| self.monitored[i] && self.current[i] != self.previous[i])
            .map(|i| SignalId::from_raw(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Pin;
    use crate::timing_model::TimingModel;
    use vicsim_common::ChipModel;

    fn setup() -> (SignalTable, SignalId, SignalId, TimingModel) {
        let mut table = SignalTable::new();
        let ce = table.register("ce", "ce", Pin::Ce, 1, 1).unwrap();
        let rw = table.register("rw", "rw", Pin::Rw, 1, 1).unwrap();
        table.set_monitored(ce, true);
        let eval = TimingModel::new(ChipModel::Mos6569.profile());
        (table, ce, rw, eval)
    }

    #[test]
    fn detects_rising_and_falling() {
        let (table, ce, _, mut eval) = setup();
        let mut tracker = ChangeTracker::new(&table);
        tracker.sample(&table, &eval);
        assert!(!tracker.any_changed());

        eval.set_input(Pin::Ce, 1);
        eval.settle();
        tracker.sample(&table, &eval);
        assert!(tracker.has_changed(ce));
        assert!(tracker.rising(ce));
        assert!(!tracker.falling(ce));
        assert!(tracker.is_asserted(ce));
        tracker.store_previous();

        eval.set_input(Pin::Ce, 0);
        eval.settle();
        tracker.sample(&table, &eval);
        assert!(tracker.falling(ce));
        assert_eq!(tracker.changed().collect::<Vec<_>>(), vec![ce]);
    }

    #[test]
    fn unmonitored_never_reports() {
        let (table, _, rw, mut eval) = setup();
        let mut tracker = ChangeTracker::new(&table);
        eval.set_input(Pin::Rw, 1);
        eval.settle();
        tracker.sample(&table, &eval);
        assert!(!tracker.has_changed(rw));
        assert!(!tracker.is_asserted(rw));
        assert!(!tracker.rising(rw));
        assert!(!tracker.any_changed());
    }

    #[test]
    fn resample_after_store_shows_no_change() {
        let (mut table, _, rw, mut eval) = setup();
        table.set_monitored(rw, true);
        let mut tracker = ChangeTracker::new(&table);
        eval.set_input(Pin::Ce, 1);
        eval.set_input(Pin::Rw, 1);
        eval.settle();
        tracker.sample(&table, &eval);
        assert!(tracker.any_changed());
        tracker.store_previous();
        tracker.sample(&table, &eval);
        for (id, _) in table.iter() {
            assert!(!tracker.has_changed(id));
        }
    }
}
