//! `vicsim run`: loads the configuration, applies command-line overrides and
//! drives the counter-only timing model.
//!
//! The trace goes to a buffered file; in shadow mode the reference process
//! is accepted over TCP before the first step.

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use vicsim_common::{ChipModel, DOTS_PER_CYCLE};
use vicsim_config::{split_signal_list, ConfigError, SimulatorConfig, Timescale};
use vicsim_sim::time::PS_PER_US;
use vicsim_sim::{
    simulate, RunSummary, ShadowLink, SimConfig, SimTime, TcpLink, TimingModel, TraceSink,
    VcdTimescale, VcdTraceSink,
};

use crate::{RunArgs, TimescaleArg};

const DEFAULT_CONFIG: &str = "vicsim.toml";

/// Runs the `vicsim run` command.
pub fn run(args: &RunArgs, config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(args, config_path)?;
    let summary = execute(&config)?;
    println!(
        "{:?} at {} ({} steps, {} exchanges, {} trace records)",
        summary.end_reason,
        summary.final_time,
        summary.steps,
        summary.exchanges,
        summary.trace_records
    );
    Ok(())
}

/// Loads the configuration file, if any, then layers the flags on top.
fn resolve_config(
    args: &RunArgs,
    config_path: Option<&Path>,
) -> Result<SimulatorConfig, Box<dyn Error>> {
    let mut config = match config_path {
        Some(path) => {
            log::info!("loading configuration from {}", path.display());
            vicsim_config::load_config(path)?
        }
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            log::info!("loading configuration from {DEFAULT_CONFIG}");
            vicsim_config::load_config(Path::new(DEFAULT_CONFIG))?
        }
        None => SimulatorConfig::default(),
    };
    apply_overrides(&mut config, args);
    vicsim_config::validate_config(&config)?;
    Ok(config)
}

fn apply_overrides(config: &mut SimulatorConfig, args: &RunArgs) {
    if let Some(chip) = args.chip {
        config.chip.model = chip;
    }
    if args.color_clock {
        config.chip.color_clock = true;
    }
    if let Some(frequency) = args.dot_clock {
        config.chip.dot_frequency = Some(frequency);
    }
    if let Some(start) = args.start_us {
        config.capture.start_us = start;
    }
    if let Some(duration) = args.duration_us {
        config.capture.duration_us = Some(duration);
    }
    if let Some(output) = &args.output {
        config.trace.enabled = true;
        config.trace.output = Some(output.clone());
    }
    if let Some(include) = &args.include {
        config.trace.signals = split_signal_list(include);
    }
    if let Some(timescale) = args.timescale {
        config.trace.timescale = match timescale {
            TimescaleArg::Ps => Timescale::Ps,
            TimescaleArg::Ns => Timescale::Ns,
        };
    }
    if args.shadow {
        config.shadow.enabled = true;
    }
    if let Some(listen) = &args.listen {
        config.shadow.listen = listen.clone();
    }
    if args.no_checks {
        config.checks.watchpoints = false;
    }
}

/// Translates the file-level configuration into the driver's run settings.
fn sim_config(config: &SimulatorConfig) -> Result<SimConfig, ConfigError> {
    let out_of_range = |field: &str| {
        ConfigError::ValidationError(format!("{field} exceeds the simulated time range"))
    };
    let capture_start = SimTime::checked_from_us(config.capture.start_us)
        .ok_or_else(|| out_of_range("capture.start_us"))?;
    let capture_duration_ps = match config.capture.duration_us {
        Some(us) => Some(
            us.checked_mul(PS_PER_US)
                .ok_or_else(|| out_of_range("capture.duration_us"))?,
        ),
        None => None,
    };

    let mut profile = config.chip.model.profile();
    if let Some(frequency) = config.chip.dot_frequency {
        log::info!("dot clock overridden to {frequency}");
        profile.dot_clock = frequency;
    }
    if let Some(frequency) = config.chip.color_frequency {
        log::info!("colour clock overridden to {frequency}");
        profile.color_clock = frequency;
    }

    Ok(SimConfig {
        color_clock: config.chip.color_clock,
        capture_start,
        capture_duration_ps,
        monitor: config.trace.signals.clone(),
        watchpoints: config.checks.watchpoints,
        ..SimConfig::new(profile)
    })
}

fn execute(config: &SimulatorConfig) -> Result<RunSummary, Box<dyn Error>> {
    let sim = sim_config(config)?;

    let mut sink = match (&config.trace.output, config.trace.enabled) {
        (Some(path), true) => {
            let timescale = match config.trace.timescale {
                Timescale::Ps => VcdTimescale::Ps,
                Timescale::Ns => VcdTimescale::Ns,
            };
            log::info!("writing trace to {}", path.display());
            let file = BufWriter::new(File::create(path)?);
            Some(VcdTraceSink::new(
                file,
                timescale,
                config.chip.model.to_string(),
            ))
        }
        _ => None,
    };
    let mut link = if config.shadow.enabled {
        Some(TcpLink::bind(&config.shadow.listen)?)
    } else {
        None
    };

    let model = TimingModel::new(sim.profile.clone());
    let summary = simulate(
        model,
        &sim,
        sink.as_mut().map(|s| s as &mut dyn TraceSink),
        link.as_mut().map(|l| l as &mut dyn ShadowLink),
    )?;
    Ok(summary)
}

/// Prints the supported chip variants.
pub fn list_chips() {
    println!("code  chip      standard  cycles  lines  dot clock");
    for model in ChipModel::ALL {
        let profile = model.profile();
        println!(
            "{:<5} {:<9} {:<9} {:<7} {:<6} {:.6} MHz",
            model.code(),
            model.to_string(),
            format!("{:?}", profile.standard),
            profile.cycles_per_line,
            profile.lines_per_frame,
            profile.dot_clock.mhz()
        );
        log::debug!(
            "{model}: {} dots per line, dot4x half period {} ps",
            profile.cycles_per_line * DOTS_PER_CYCLE,
            profile.dot4x_half_period_ps()
        );
    }
}
