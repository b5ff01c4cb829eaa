//! Strobe CLI: the command-line interface for the Strobe handshake bench.
//!
//! Provides `strobe run` for running a sender/receiver loopback bench and
//! `strobe check` for validating a `strobe.toml` configuration.

#![warn(missing_docs)]

mod bench;
mod check;
mod payload;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Strobe: a clocked valid/ready handshake bench.
#[derive(Parser, Debug)]
#[command(name = "strobe", version, about = "Strobe handshake bench")]
pub struct Cli {
    /// Only report failures.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log engine and kernel activity at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `strobe.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// `strobe` subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a payload through a loopback bench and check what comes out.
    Run(RunArgs),
    /// Load and validate the configuration, then print the resolved settings.
    Check(CheckArgs),
}

/// Arguments for the `strobe run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Flits separated by `;`, lane values by `,` (e.g. "0,1;1,0;0x3,2").
    /// Defaults to nine two-lane flits.
    #[arg(long)]
    pub payload: Option<String>,

    /// Number of data lanes to bind. Defaults to the payload arity; 0 binds none.
    #[arg(long)]
    pub lanes: Option<usize>,

    /// Drive a spare signal with random values for N cycles (0 = forever).
    #[arg(long)]
    pub fuzz_cycles: Option<u64>,

    /// Output path for a VCD waveform.
    #[arg(long)]
    pub waveform: Option<String>,

    /// Override the random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `strobe check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Print the resolved configuration as JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
}

/// Flags shared by every subcommand.
pub struct GlobalArgs {
    /// `--quiet` was given.
    pub quiet: bool,
    /// `--verbose` was given.
    pub verbose: bool,
    /// `--config` path, if given.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Run(ref args) => bench::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Default log level for the given flags; `RUST_LOG` takes precedence.
fn default_filter(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(global)));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
