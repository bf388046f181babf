//! vicsim CLI: drives the video chip model from the command line.
//!
//! `vicsim run` simulates one chip variant, optionally writing a VCD trace or
//! running in lock-step with a reference process. `vicsim chips` lists the
//! supported variants.

#![warn(missing_docs)]

mod run;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use vicsim_common::{ChipModel, Frequency};

/// vicsim: a co-simulation driver for a cycle-level video chip model.
#[derive(Parser, Debug)]
#[command(name = "vicsim", version, about = "Video chip co-simulation driver")]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Decrease verbosity (-q warnings, -qq errors only).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Path to a `vicsim.toml` run configuration. Defaults to `./vicsim.toml`
    /// when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate the model.
    Run(RunArgs),
    /// List the supported chip variants.
    Chips,
}

/// Arguments for `vicsim run`. Each flag overrides the configuration file.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Chip variant: 6567r8, 6567r56a, 6569 or the codes 0, 1, 2.
    #[arg(short, long)]
    pub chip: Option<ChipModel>,

    /// Start of the capture window in microseconds.
    #[arg(short = 's', long)]
    pub start_us: Option<u64>,

    /// Length of the capture window in microseconds.
    #[arg(short = 't', long)]
    pub duration_us: Option<u64>,

    /// Write a VCD trace to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Comma-separated signal labels or wildcard patterns to trace.
    #[arg(short, long)]
    pub include: Option<String>,

    /// Trace timestamp unit.
    #[arg(long, value_enum)]
    pub timescale: Option<TimescaleArg>,

    /// Run in lock-step with a reference process.
    #[arg(long)]
    pub shadow: bool,

    /// Address to accept the reference process on.
    #[arg(long)]
    pub listen: Option<String>,

    /// Skip the pixel-dot watchpoints.
    #[arg(long)]
    pub no_checks: bool,

    /// Also drive the colour reference clock.
    #[arg(long)]
    pub color_clock: bool,

    /// Override the pixel-dot clock, e.g. `7.881984MHz`.
    #[arg(long)]
    pub dot_clock: Option<Frequency>,
}

/// Trace timestamp unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TimescaleArg {
    /// Picoseconds.
    Ps,
    /// Nanoseconds.
    Ns,
}

fn log_level(verbose: u8, quiet: u8) -> LevelFilter {
    match (verbose, quiet) {
        (0, 0) => LevelFilter::Info,
        (1, _) => LevelFilter::Debug,
        (v, _) if v >= 2 => LevelFilter::Trace,
        (_, 1) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    }
}

fn main() {
    let cli = Cli::parse();

    clilog::init_stderr_color_debug();
    log::set_max_level(log_level(cli.verbose, cli.quiet));

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, cli.config.as_deref()),
        Command::Chips => {
            run::list_chips();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["vicsim", "run"]);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        match cli.command {
            Command::Run(ref args) => {
                assert!(args.chip.is_none());
                assert!(args.start_us.is_none());
                assert!(args.duration_us.is_none());
                assert!(args.output.is_none());
                assert!(!args.shadow);
                assert!(!args.no_checks);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_with_args() {
        let cli = Cli::parse_from([
            "vicsim",
            "run",
            "--chip",
            "6567r8",
            "-s",
            "100",
            "-t",
            "500",
            "-o",
            "out.vcd",
            "-i",
            "phi,ce,ai*",
            "--timescale",
            "ns",
        ]);
        match cli.command {
            Command::Run(ref args) => {
                assert_eq!(args.chip, Some(ChipModel::Mos6567R8));
                assert_eq!(args.start_us, Some(100));
                assert_eq!(args.duration_us, Some(500));
                assert_eq!(args.output.as_deref(), Some(std::path::Path::new("out.vcd")));
                assert_eq!(args.include.as_deref(), Some("phi,ce,ai*"));
                assert_eq!(args.timescale, Some(TimescaleArg::Ns));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_numeric_chip_code() {
        let cli = Cli::parse_from(["vicsim", "run", "-c", "1"]);
        match cli.command {
            Command::Run(ref args) => assert_eq!(args.chip, Some(ChipModel::Mos6567R56A)),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_dot_clock_with_unit() {
        let cli = Cli::parse_from(["vicsim", "run", "--dot-clock", "8.181816MHz"]);
        match cli.command {
            Command::Run(ref args) => {
                let f = args.dot_clock.unwrap();
                assert!((f.hz() - 8_181_816.0).abs() < 1e-3);
            }
            _ => panic!("expected Run command"),
        }
        assert!(Cli::try_parse_from(["vicsim", "run", "--dot-clock", "fast"]).is_err());
    }

    #[test]
    fn unknown_chip_is_rejected() {
        assert!(Cli::try_parse_from(["vicsim", "run", "--chip", "6581"]).is_err());
    }

    #[test]
    fn parse_shadow_flags() {
        let cli = Cli::parse_from(["vicsim", "run", "--shadow", "--listen", "0.0.0.0:7000"]);
        match cli.command {
            Command::Run(ref args) => {
                assert!(args.shadow);
                assert_eq!(args.listen.as_deref(), Some("0.0.0.0:7000"));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["vicsim", "-vv", "--config", "/tmp/vicsim.toml", "chips"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/vicsim.toml")));
        assert!(matches!(cli.command, Command::Chips));
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0, 0), LevelFilter::Info);
        assert_eq!(log_level(1, 0), LevelFilter::Debug);
        assert_eq!(log_level(3, 0), LevelFilter::Trace);
        assert_eq!(log_level(0, 1), LevelFilter::Warn);
        assert_eq!(log_level(0, 2), LevelFilter::Error);
        assert_eq!(log_level(1, 2), LevelFilter::Debug);
    }
}
