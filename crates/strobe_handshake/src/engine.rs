//! State shared by the send and receive engines.

use std::fmt;

use strobe_sim::{Engine, SimError, SimTime};

/// Where an engine is in its handshake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Constructed, not yet called.
    #[default]
    Idle,
    /// Waiting for the other side: readiness for a sender in
    /// valid-only-when-ready mode, presence for a receiver.
    AwaitingPresence,
    /// Waiting for the rising edge that decides acceptance: a sender with
    /// presence asserted, or a receiver inside a transaction.
    AwaitingEdge,
    /// Every flit went through.
    Done,
    /// The call returned an error.
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::AwaitingPresence => "awaiting-presence",
            EngineState::AwaitingEdge => "awaiting-edge",
            EngineState::Done => "done",
            EngineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts stalled cycles between two transferred flits.
///
/// The guard trips once `limit` stalls have accumulated on one flit. A zero
/// budget disables it.
#[derive(Debug)]
pub(crate) struct TimeoutGuard {
    engine: Engine,
    limit: Option<u64>,
    stalled: u64,
}

impl TimeoutGuard {
    /// A sender tolerates `budget` stalled cycles and fails on the next one.
    pub(crate) fn for_send(budget: u64) -> Self {
        Self {
            engine: Engine::Send,
            limit: (budget != 0).then(|| budget.saturating_add(1)),
            stalled: 0,
        }
    }

    /// A receiver fails as soon as `budget` stalled cycles are reached.
    pub(crate) fn for_receive(budget: u64) -> Self {
        Self {
            engine: Engine::Receive,
            limit: (budget != 0).then_some(budget),
            stalled: 0,
        }
    }

    /// Called when a flit transfers.
    pub(crate) fn progress(&mut self) {
        self.stalled = 0;
    }

    /// Counts one stalled cycle on `flit`.
    pub(crate) fn stall(&mut self, flit: usize, at: SimTime) -> Result<(), SimError> {
        self.stalled += 1;
        match self.limit {
            Some(limit) if self.stalled >= limit => Err(SimError::Timeout {
                engine: self.engine,
                flit,
                cycles: self.stalled,
                at,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn stalled(&self) -> u64 {
        self.stalled
    }
}
