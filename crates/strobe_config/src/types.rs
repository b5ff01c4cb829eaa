//! Configuration types deserialized from `strobe.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strobe_handshake::{ReceiveOptions, SendOptions, DEFAULT_TIMEOUT_CYCLES};
use strobe_sim::{parse_duration, SimConfig, TimeUnit, DEFAULT_MAX_DELTAS};

use crate::error::ConfigError;

/// The top-level bench configuration parsed from `strobe.toml`.
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Kernel settings (seed, limits, waveform output).
    #[serde(default)]
    pub sim: SimSection,
    /// Clock generator settings.
    #[serde(default)]
    pub clock: ClockSection,
    /// Reset pulse settings.
    #[serde(default)]
    pub reset: ResetSection,
    /// Run-wide watchdog. No watchdog is started when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<WatchdogSection>,
    /// Handshake engine settings.
    #[serde(default)]
    pub handshake: HandshakeSection,
}

/// Kernel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSection {
    /// Seed for random stimulus.
    pub seed: u64,
    /// Optional simulated-time limit as a duration string (e.g. `"1ms"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    /// Maximum settle passes within one time step.
    pub max_deltas: u32,
    /// End the run at the first task failure.
    pub fail_fast: bool,
    /// Optional VCD output path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform: Option<PathBuf>,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            seed: 1,
            time_limit: None,
            max_deltas: DEFAULT_MAX_DELTAS,
            fail_fast: true,
            waveform: None,
        }
    }
}

/// Clock generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSection {
    /// Period in `unit`s.
    pub period: u64,
    /// Unit of `period`.
    pub unit: TimeUnit,
    /// Start the first half period high.
    pub start_high: bool,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self {
            period: 2,
            unit: TimeUnit::Ns,
            start_high: false,
        }
    }
}

impl ClockSection {
    /// Period in femtoseconds.
    pub fn period_fs(&self) -> u64 {
        self.unit.to_fs(self.period)
    }
}

/// Reset pulse settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetSection {
    /// How long reset is held active.
    pub delay: u64,
    /// Unit of `delay`.
    pub unit: TimeUnit,
    /// Reset is asserted by driving 0.
    pub active_low: bool,
}

impl Default for ResetSection {
    fn default() -> Self {
        Self {
            delay: 10,
            unit: TimeUnit::Ns,
            active_low: true,
        }
    }
}

/// Watchdog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogSection {
    /// Simulated time before the run is failed.
    pub delay: u64,
    /// Unit of `delay`.
    #[serde(default)]
    pub unit: TimeUnit,
}

/// Handshake engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSection {
    /// Stalled cycles tolerated per flit. Zero disables the guard.
    pub timeout_cycles: u64,
    /// Sender asserts `valid` only when `ready` was high at the falling edge.
    pub valid_only_when_ready: bool,
    /// Width in bits of each data lane.
    pub data_width: u32,
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            timeout_cycles: DEFAULT_TIMEOUT_CYCLES,
            valid_only_when_ready: false,
            data_width: 1,
        }
    }
}

impl BenchConfig {
    /// Builds the kernel configuration, resolving the time limit string.
    pub fn sim_config(&self) -> Result<SimConfig, ConfigError> {
        let time_limit = self
            .sim
            .time_limit
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| ConfigError::invalid("sim.time_limit", e.to_string()))?;
        Ok(SimConfig {
            seed: self.sim.seed,
            time_limit,
            max_deltas: self.sim.max_deltas,
            fail_fast: self.sim.fail_fast,
            waveform_path: self.sim.waveform.clone(),
        })
    }

    /// Options for the send engine.
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            valid_only_when_ready: self.handshake.valid_only_when_ready,
            timeout_cycles: self.handshake.timeout_cycles,
        }
    }

    /// Options for the receive engine.
    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            timeout_cycles: self.handshake.timeout_cycles,
        }
    }
}
