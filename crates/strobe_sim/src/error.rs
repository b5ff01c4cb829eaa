//! Error types for the simulation kernel and the engines built on it.
//!
//! All failures a task can raise are variants of [`SimError`]. The enum is
//! `Clone` so the kernel can keep a record of a failed task while the same
//! error is handed to whoever joins that task.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::time::SimTime;

/// Which handshake engine raised a timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Engine {
    /// The source-side driver.
    Send,
    /// The sink-side monitor/driver.
    Receive,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Send => f.write_str("send"),
            Engine::Receive => f.write_str("receive"),
        }
    }
}

/// Everything a task or a run can fail with.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SimError {
    /// A handshake engine made no progress within its cycle budget.
    #[error("{engine} timed out on flit {flit} after {cycles} stalled cycles at {at}")]
    Timeout {
        /// The engine that gave up.
        engine: Engine,
        /// Index of the flit being transferred when the budget ran out.
        flit: usize,
        /// Stalled cycles counted on that flit.
        cycles: u64,
        /// Simulation time of the failure.
        at: SimTime,
    },

    /// The run-wide watchdog fired before the test completed.
    #[error("simulation timeout: watchdog expired at {at}")]
    WatchdogExpired {
        /// Simulation time at which the watchdog fired.
        at: SimTime,
    },

    /// Invalid binding, payload or parameter, detected before any signal is touched.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of what is wrong.
        reason: String,
    },

    /// Nothing left to schedule while the test was still waiting.
    #[error("simulation starved at {at}: no pending events and the test has not finished")]
    Starved {
        /// Simulation time at which the event queue ran dry.
        at: SimTime,
    },

    /// Simulated time passed `SimConfig::time_limit`.
    #[error("time limit exceeded: {limit_fs} fs")]
    TimeLimitExceeded {
        /// The configured limit.
        limit_fs: u64,
    },

    /// Too many settle passes at a single time step, indicating a combinational loop.
    #[error("delta cycle limit exceeded at {fs} fs (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// Step that would not settle.
        fs: u64,
        /// Configured bound.
        max_deltas: u32,
    },

    /// Creating or writing the VCD file failed.
    #[error("waveform I/O error: {0}")]
    WaveformIo(Arc<io::Error>),
}

impl SimError {
    /// Shorthand for a [`SimError::Config`] with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        SimError::Config {
            reason: reason.into(),
        }
    }

    /// Returns true for handshake timeouts and watchdog expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SimError::Timeout { .. } | SimError::WatchdogExpired { .. }
        )
    }
}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        SimError::WaveformIo(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let e = SimError::Timeout {
            engine: Engine::Send,
            flit: 3,
            cycles: 129,
            at: SimTime::from_ns(42),
        };
        assert_eq!(
            e.to_string(),
            "send timed out on flit 3 after 129 stalled cycles at 42 ns"
        );
        assert!(e.is_timeout());
    }

    #[test]
    fn watchdog_display() {
        let e = SimError::WatchdogExpired {
            at: SimTime::from_ns(1000),
        };
        assert_eq!(e.to_string(), "simulation timeout: watchdog expired at 1000 ns");
        assert!(e.is_timeout());
    }

    #[test]
    fn config_display() {
        let e = SimError::config("payload is empty");
        assert_eq!(e.to_string(), "configuration error: payload is empty");
        assert!(!e.is_timeout());
    }

    #[test]
    fn starved_display() {
        let e = SimError::Starved {
            at: SimTime::from_ns(3),
        };
        assert!(e.to_string().starts_with("simulation starved at 3 ns"));
    }

    #[test]
    fn delta_cycle_limit_display() {
        let e = SimError::DeltaCycleLimit {
            fs: 100,
            max_deltas: 10000,
        };
        assert_eq!(
            e.to_string(),
            "delta cycle limit exceeded at 100 fs (max 10000 deltas)"
        );
    }

    #[test]
    fn waveform_io_from_io_error() {
        let e: SimError = io::Error::new(io::ErrorKind::NotFound, "file not found").into();
        assert!(e.to_string().contains("waveform I/O error"));
        let cloned = e.clone();
        assert!(matches!(cloned, SimError::WaveformIo(_)));
    }

    #[test]
    fn engine_display() {
        assert_eq!(Engine::Send.to_string(), "send");
        assert_eq!(Engine::Receive.to_string(), "receive");
    }
}
