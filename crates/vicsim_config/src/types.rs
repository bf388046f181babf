//! Configuration types deserialized from `vicsim.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

use vicsim_common::{ChipModel, Frequency};

/// The top-level run configuration parsed from `vicsim.toml`.
///
/// Every section is optional; a missing file behaves like an empty one.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Chip variant selection.
    pub chip: ChipConfig,
    /// Capture-by-time window.
    pub capture: CaptureConfig,
    /// Waveform trace output.
    pub trace: TraceConfig,
    /// Shadow synchronisation with an external reference process.
    pub shadow: ShadowConfig,
    /// Consistency checks performed on captured steps.
    pub checks: CheckConfig,
}

/// Chip variant selection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    /// Which revision the hardware model is configured as.
    pub model: ChipModel,
    /// Also drive the colour reference clock domain.
    pub color_clock: bool,
    /// Pixel-dot clock override, e.g. `"7.881984MHz"` or a number in Hz.
    #[serde(deserialize_with = "deserialize_frequency")]
    pub dot_frequency: Option<Frequency>,
    /// Colour reference clock override.
    #[serde(deserialize_with = "deserialize_frequency")]
    pub color_frequency: Option<Frequency>,
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            model: ChipModel::Mos6569,
            color_clock: false,
            dot_frequency: None,
            color_frequency: None,
        }
    }
}

/// Deserializes a frequency given as a string with an optional unit suffix
/// or as a bare number of Hertz.
fn deserialize_frequency<'de, D>(deserializer: D) -> Result<Option<Frequency>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FrequencyValue;

    impl<'de> Visitor<'de> for FrequencyValue {
        type Value = Option<Frequency>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a frequency such as \"7.881984MHz\" or a number of Hz")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse().map(Some).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            self.visit_f64(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            self.visit_f64(v as f64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if v > 0.0 && v.is_finite() {
                Ok(Some(Frequency::new(v)))
            } else {
                Err(E::custom(format!("invalid frequency: {v}")))
            }
        }
    }

    deserializer.deserialize_any(FrequencyValue)
}

/// Capture-by-time window, in microseconds of simulated time.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Window start.
    pub start_us: u64,
    /// Window length. Defaults to one frame of the selected chip.
    pub duration_us: Option<u64>,
}

/// Waveform trace output settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Whether to write a trace at all.
    pub enabled: bool,
    /// Output path for the trace. Required when `enabled` is set.
    pub output: Option<PathBuf>,
    /// Signal labels or wildcard patterns to monitor.
    ///
    /// Accepts either `"dot,phi"` or `["dot", "phi"]`.
    #[serde(deserialize_with = "deserialize_signal_list")]
    pub signals: Vec<String>,
    /// Unit of the timestamps written to the trace.
    pub timescale: Timescale,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output: None,
            signals: vec!["dot".to_string()],
            timescale: Timescale::default(),
        }
    }
}

/// Deserializes a signal selection that can be a comma-separated string or a
/// list of strings.
fn deserialize_signal_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SignalList;

    impl<'de> Visitor<'de> for SignalList {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a comma-separated string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(split_signal_list(v))
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val.trim().to_string());
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(SignalList)
}

/// Splits a comma-separated signal selection, dropping empty entries.
pub fn split_signal_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Timestamp unit of the waveform trace.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Timescale {
    /// One picosecond per trace time unit (default).
    #[default]
    Ps,
    /// One nanosecond per trace time unit.
    Ns,
}

/// Shadow synchronisation settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Run in lock-step with an external reference process.
    pub enabled: bool,
    /// Socket address to accept the reference process on.
    pub listen: String,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:6502".to_string(),
        }
    }
}

/// Consistency checks.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Evaluate the pixel-dot watchpoints on every captured step.
    pub watchpoints: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { watchpoints: true }
    }
}
