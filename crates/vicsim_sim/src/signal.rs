//! The registry of observable signals.
//!
//! A [`Signal`] names one bit of a model pin: the pin is its storage word and
//! a mask selects the bit. Samples always read the model's current pin value,
//! so the table never holds a stale copy. The table is fixed after setup
//! apart from each signal's monitored flag.

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::evaluator::{Evaluator, Pin};

/// Opaque handle to a registered signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Width of the storage word backing a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageWord {
    /// Low byte of the pin value (signal width 1..=8).
    Byte,
    /// Full 16-bit pin value (signal width 9..=15).
    Half,
}

impl StorageWord {
    fn for_width(width: u8) -> Option<Self> {
        match width {
            1..=8 => Some(StorageWord::Byte),
            9..=15 => Some(StorageWord::Half),
            _ => None,
        }
    }

    fn read(self, value: u16) -> u16 {
        match self {
            StorageWord::Byte => value & 0x00ff,
            StorageWord::Half => value,
        }
    }
}

/// A registered signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    /// Display label, also used for selection.
    pub label: String,
    /// Short token identifying the signal in trace output.
    pub id_code: String,
    /// Width of the pin the bit is taken from.
    pub width: u8,
    /// Pin holding the storage word.
    pub pin: Pin,
    /// Bit selected within the storage word.
    pub mask: u16,
    /// Whether the signal is sampled and traced.
    pub monitored: bool,
    word: StorageWord,
}

/// Immutable-after-setup registry of signals, in registration order.
#[derive(Clone, Debug, Default)]
pub struct SignalTable {
    signals: Vec<Signal>,
}

impl SignalTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an unmonitored signal.
    ///
    /// Labels and id codes must be unique and non-empty. The mask must be
    /// non-zero and fit the storage word chosen by `width`.
    pub fn register(
        &mut self,
        label: &str,
        id_code: &str,
        pin: Pin,
        mask: u16,
        width: u8,
    ) -> Result<SignalId, SimError> {
        let invalid = |reason: String| SimError::InvalidSignal {
            label: label.to_string(),
            reason,
        };
        if label.is_empty() || id_code.is_empty() {
            return Err(invalid("label and id code must be non-empty".into()));
        }
        if id_code.chars().any(|c| !c.is_ascii_graphic()) {
            return Err(invalid(format!("id code '{id_code}' is not printable ASCII")));
        }
        let word = StorageWord::for_width(width)
            .ok_or_else(|| invalid(format!("width {width} outside 1..=15")))?;
        if mask == 0 || word.read(mask) != mask {
            return Err(invalid(format!(
                "mask {mask:#06x} does not fit a {width}-bit storage word"
            )));
        }
        if self.signals.iter().any(|s| s.label == label) {
            return Err(invalid("duplicate label".into()));
        }
        if self.signals.iter().any(|s| s.id_code == id_code) {
            return Err(invalid(format!("duplicate id code '{id_code}'")));
        }

        let id = SignalId::from_raw(self.signals.len() as u32);
        self.signals.push(Signal {
            label: label.to_string(),
            id_code: id_code.to_string(),
            width,
            pin,
            mask,
            monitored: false,
            word,
        });
        Ok(id)
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Looks up a signal.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this table.
    pub fn get(&self, id: SignalId) -> &Signal {
        &self.signals[id.index()]
    }

    /// Finds a signal by exact label.
    pub fn find(&self, label: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .position(|s| s.label == label)
            .map(|i| SignalId::from_raw(i as u32))
    }

    /// All signals with their ids, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals
            .iter()
            .enumerate()
            .map(|(i, s)| (SignalId::from_raw(i as u32), s))
    }

    /// Monitored signals, in registration order.
    pub fn monitored(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.iter().filter(|(_, s)| s.monitored)
    }

    /// Sets the monitored flag of one signal.
    pub fn set_monitored(&mut self, id: SignalId, monitored: bool) {
        self.signals[id.index()].monitored = monitored;
    }

    /// Reads a signal's current bit from the model.
    pub fn sample<E: Evaluator + ?Sized>(&self, eval: &E, id: SignalId) -> bool {
        let signal = self.get(id);
        signal.word.read(eval.read_pin(signal.pin)) & signal.mask != 0
    }

    /// Marks the signals matched by `patterns` as monitored.
    ///
    /// Each pattern is an exact label or a wildcard (`*` any run, `?` one
    /// character) matched against the whole label. Signals already monitored
    /// stay monitored. A pattern that matches nothing is an error.
    pub fn select<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<usize, SimError> {
        let mut selected = 0;
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let mut matched = false;
            for signal in &mut self.signals {
                if wildcard_match(pattern, &signal.label) {
                    matched = true;
                    if !signal.monitored {
                        signal.monitored = true;
                        selected += 1;
                    }
                }
            }
            if !matched {
                return Err(SimError::UnknownSignal(pattern.to_string()));
            }
        }
        Ok(selected)
    }
}

/// Anchored glob match supporting `*` and `?`.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, ti));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing_model::TimingModel;
    use vicsim_common::ChipModel;

    fn table() -> SignalTable {
        let mut t = SignalTable::new();
        t.register("phi", "p", Pin::ClkPhi, 1, 1).unwrap();
        t.register("dot", "dot", Pin::ClkDot, 1, 1).unwrap();
        t.register("ai0", "ai0", Pin::AddrIn, 1 << 0, 12).unwrap();
        t.register("ai1", "ai1", Pin::AddrIn, 1 << 1, 12).unwrap();
        t.register("ai10", "ai10", Pin::AddrIn, 1 << 10, 12).unwrap();
        t
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let t = table();
        assert_eq!(t.len(), 5);
        assert_eq!(t.find("dot"), Some(SignalId::from_raw(1)));
        assert_eq!(t.get(SignalId::from_raw(4)).label, "ai10");
        assert_eq!(t.get(SignalId::from_raw(4)).word, StorageWord::Half);
        assert_eq!(t.get(SignalId::from_raw(0)).word, StorageWord::Byte);
        assert!(t.monitored().next().is_none());
    }

    #[test]
    fn rejects_bad_registrations() {
        let mut t = table();
        let dup_label = t.register("phi", "q", Pin::ClkPhi, 1, 1);
        assert!(matches!(dup_label, Err(SimError::InvalidSignal { .. })));
        let dup_id = t.register("phi2", "p", Pin::ClkPhi, 1, 1);
        assert!(matches!(dup_id, Err(SimError::InvalidSignal { .. })));
        let wide = t.register("wide", "w", Pin::AddrIn, 1, 16);
        assert!(matches!(wide, Err(SimError::InvalidSignal { .. })));
        let narrow_mask = t.register("hi", "h", Pin::AddrIn, 1 << 9, 8);
        assert!(matches!(narrow_mask, Err(SimError::InvalidSignal { .. })));
        let zero_mask = t.register("z", "z", Pin::AddrIn, 0, 1);
        assert!(matches!(zero_mask, Err(SimError::InvalidSignal { .. })));
    }

    #[test]
    fn sample_reads_masked_bit() {
        let t = table();
        let mut eval = TimingModel::new(ChipModel::Mos6569.profile());
        eval.set_input(Pin::AddrIn, 0b100_0000_0010);
        eval.settle();
        assert!(!t.sample(&eval, t.find("ai0").unwrap()));
        assert!(t.sample(&eval, t.find("ai1").unwrap()));
        assert!(t.sample(&eval, t.find("ai10").unwrap()));
    }

    #[test]
    fn byte_word_ignores_high_bits() {
        let mut t = SignalTable::new();
        let id = t.register("low", "l", Pin::AddrIn, 1, 1).unwrap();
        let mut eval = TimingModel::new(ChipModel::Mos6569.profile());
        eval.set_input(Pin::AddrIn, 0x100);
        assert!(!t.sample(&eval, id));
        eval.set_input(Pin::AddrIn, 0x101);
        assert!(t.sample(&eval, id));
    }

    #[test]
    fn select_exact_and_wildcard() {
        let mut t = table();
        assert_eq!(t.select(&["phi", "ai?"]).unwrap(), 3);
        let labels: Vec<_> = t.monitored().map(|(_, s)| s.label.as_str()).collect();
        assert_eq!(labels, vec!["phi", "ai0", "ai1"]);

        assert_eq!(t.select(&["ai*"]).unwrap(), 1);
        assert!(t.get(t.find("ai10").unwrap()).monitored);
    }

    #[test]
    fn select_unknown_errors() {
        let mut t = table();
        let err = t.select(&["dot", "csync"]).unwrap_err();
        assert!(matches!(err, SimError::UnknownSignal(ref p) if p == "csync"));
    }

    #[test]
    fn wildcard_is_anchored() {
        assert!(wildcard_match("dot", "dot"));
        assert!(!wildcard_match("do", "dot"));
        assert!(!wildcard_match("ot", "dot"));
        assert!(wildcard_match("d*", "do11"));
        assert!(wildcard_match("*1", "do11"));
        assert!(wildcard_match("a?1?", "ao10"));
        assert!(!wildcard_match("a?1", "ao10"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b*c", "axxbyy"));
    }
}
