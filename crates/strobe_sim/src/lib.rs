//! Simulated-time cooperative kernel for the Strobe handshake bench.
//!
//! This crate runs many concurrent test activities (clock generators,
//! drivers, monitors, watchdogs) as plain Rust futures on a single thread,
//! against a shared set of signals. Time only moves when every task is
//! suspended on a [`Trigger`]: a signal edge, the read-only point of the
//! current step, or a timer.
//!
//! # Usage
//!
//! ```ignore
//! use strobe_sim::{build_simulator, Clock, SimConfig, TimeUnit};
//!
//! let mut sim = build_simulator(&SimConfig::default())?;
//! let clk = sim.signal("clk", 1)?;
//! Clock::new(clk.clone(), 2, TimeUnit::Ns)?.start(false);
//! sim.run(async move {
//!     clk.rising_edge().await;
//!     Ok(())
//! })?;
//! ```
//!
//! # Modules
//!
//! - `error`: Simulation error types
//! - `time`: Femtosecond-precision time with delta cycles
//! - `signal`: Signal handles with deferred writes
//! - `trigger`: Suspension points
//! - `kernel`: Task scheduler and settle loop
//! - `clock`: Free-running clock generator
//! - `waveform`: Waveform recording (VCD format)

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod kernel;
pub mod signal;
pub mod time;
pub mod trigger;
pub mod waveform;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tracing::debug;

pub use clock::Clock;
pub use error::{Engine, SimError};
pub use kernel::{JoinHandle, SimHandle, SimSummary, Simulator, TaskFailure, TaskId};
pub use signal::{Signal, SignalId, MAX_WIDTH};
pub use time::{parse_duration, SimTime, TimeUnit};
pub use trigger::{Edge, Trigger, TriggerKind};
pub use waveform::{VcdRecorder, WaveformRecorder};

/// Default bound on settle passes within one time step.
pub const DEFAULT_MAX_DELTAS: u32 = 10_000;

/// Configuration for a simulator.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Seed for the random source shared by all tasks.
    pub seed: u64,
    /// Optional simulation time limit in femtoseconds.
    /// If `None`, a run continues until its test task finishes or starves.
    pub time_limit: Option<u64>,
    /// Maximum settle passes within one time step before the run is aborted.
    pub max_deltas: u32,
    /// End the run at the first failure of any task.
    pub fail_fast: bool,
    /// Optional path for VCD output.
    pub waveform_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            time_limit: None,
            max_deltas: DEFAULT_MAX_DELTAS,
            fail_fast: true,
            waveform_path: None,
        }
    }
}

/// Creates a simulator and attaches a VCD recorder when a waveform path is set.
pub fn build_simulator(config: &SimConfig) -> Result<Simulator, SimError> {
    if config.max_deltas == 0 {
        return Err(SimError::config("max_deltas must be at least 1"));
    }
    let mut sim = Simulator::new(config.clone());
    if let Some(path) = &config.waveform_path {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        sim.set_recorder(Box::new(VcdRecorder::new(writer)));
        debug!(path = %path.display(), "recording waveform");
    }
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_config_default() {
        let config = SimConfig::default();
        assert_eq!(config.seed, 0);
        assert!(config.time_limit.is_none());
        assert_eq!(config.max_deltas, DEFAULT_MAX_DELTAS);
        assert!(config.fail_fast);
        assert!(config.waveform_path.is_none());
    }

    #[test]
    fn zero_max_deltas_rejected() {
        let config = SimConfig {
            max_deltas: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            build_simulator(&config),
            Err(SimError::Config { .. })
        ));
    }

    #[test]
    fn missing_waveform_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig {
            waveform_path: Some(dir.path().join("no/such/dir/wave.vcd")),
            ..SimConfig::default()
        };
        assert!(matches!(
            build_simulator(&config),
            Err(SimError::WaveformIo(_))
        ));
    }

    #[test]
    fn simulate_writes_vcd_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.vcd");
        let config = SimConfig {
            waveform_path: Some(path.clone()),
            ..SimConfig::default()
        };
        let mut sim = build_simulator(&config).unwrap();
        let clk = sim.signal("clk", 1).unwrap();
        Clock::new(clk.clone(), 2, TimeUnit::Ns).unwrap().start(false);
        sim.run(async move {
            for _ in 0..2 {
                clk.rising_edge().await;
            }
            Ok::<_, SimError>(())
        })
        .unwrap();
        drop(sim);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("$var wire 1 ! clk $end"));
        assert!(text.contains("#1000000\n1!"));
        assert!(text.contains("#3000000\n1!"));
    }

    #[test]
    fn signal_id_serializes_as_index() {
        let json = serde_json::to_string(&SignalId::from_raw(3)).unwrap();
        assert_eq!(json, "3");
        let back: SignalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SignalId::from_raw(3));
    }
}
