//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SimulatorConfig;
use std::path::Path;

/// Picoseconds per microsecond, the resolution of simulated time.
const PS_PER_US: u64 = 1_000_000;

/// Loads and validates a `vicsim.toml` configuration file.
pub fn load_config(path: &Path) -> Result<SimulatorConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `vicsim.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<SimulatorConfig, ConfigError> {
    let config: SimulatorConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that the configuration is internally consistent.
///
/// Called again by the binary after command-line overrides are applied.
pub fn validate_config(config: &SimulatorConfig) -> Result<(), ConfigError> {
    if config.capture.duration_us == Some(0) {
        return Err(ConfigError::ValidationError(
            "capture.duration_us must be greater than zero".to_string(),
        ));
    }
    let duration_us = config
        .capture
        .duration_us
        .unwrap_or_else(|| config.chip.model.profile().default_capture_us);
    let window_end = config
        .capture
        .start_us
        .checked_add(duration_us)
        .and_then(|us| us.checked_mul(PS_PER_US));
    if window_end.is_none() {
        return Err(ConfigError::ValidationError(format!(
            "capture window of {duration_us} us starting at {} us exceeds the simulated time range",
            config.capture.start_us
        )));
    }
    for (field, frequency) in [
        ("chip.dot_frequency", config.chip.dot_frequency),
        ("chip.color_frequency", config.chip.color_frequency),
    ] {
        if let Some(f) = frequency {
            // the dot clock is stepped at four times its rate
            if f.times(4).half_period_ps() == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{field} of {f} is too fast for picosecond resolution"
                )));
            }
        }
    }
    if config.trace.enabled {
        if config.trace.output.is_none() {
            return Err(ConfigError::MissingField("trace.output".to_string()));
        }
        if config.trace.signals.is_empty() {
            return Err(ConfigError::ValidationError(
                "trace.signals selects no signals".to_string(),
            ));
        }
    }
    if config.shadow.enabled && config.shadow.listen.trim().is_empty() {
        return Err(ConfigError::MissingField("shadow.listen".to_string()));
    }
    Ok(())
}
