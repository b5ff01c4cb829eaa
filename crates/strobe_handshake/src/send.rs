//! Source-side handshake engine.
//!
//! The sender drives one flit at a time onto the bus and holds it there
//! until a rising edge finds both presence and readiness asserted. `data`
//! and `last` are written once per flit and stay stable while it stalls.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use strobe_sim::{SimError, Signal};

use crate::binding::Bus;
use crate::engine::{EngineState, TimeoutGuard};
use crate::flit::{Flit, Payload};
use crate::DEFAULT_TIMEOUT_CYCLES;

/// Tuning for one send call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    /// Assert `valid` only on cycles where `ready` was already high at the
    /// preceding falling edge.
    pub valid_only_when_ready: bool,
    /// Stalled cycles tolerated on one flit. Zero waits forever.
    pub timeout_cycles: u64,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            valid_only_when_ready: false,
            timeout_cycles: DEFAULT_TIMEOUT_CYCLES,
        }
    }
}

/// Drives payloads onto a [`Bus`] in step with a clock.
#[derive(Debug)]
pub struct Sender {
    clock: Signal,
    bus: Bus,
    options: SendOptions,
    state: Cell<EngineState>,
}

impl Sender {
    /// Creates an idle sender.
    pub fn new(clock: Signal, bus: Bus, options: SendOptions) -> Self {
        Self {
            clock,
            bus,
            options,
            state: Cell::new(EngineState::Idle),
        }
    }

    /// Returns the current engine state.
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Returns the options this sender was built with.
    pub fn options(&self) -> &SendOptions {
        &self.options
    }

    /// Sends every flit of `payload`, in order, as one transaction.
    ///
    /// Fails with a configuration error before touching any signal if the
    /// payload is empty or does not match the bound data lanes, and with
    /// [`SimError::Timeout`] if a flit stalls past the budget. `valid` is
    /// deasserted on return either way.
    pub async fn send(&self, payload: impl Into<Payload>) -> Result<(), SimError> {
        let payload = payload.into();
        if let Err(err) = self.validate(&payload) {
            self.state.set(EngineState::Failed);
            return Err(err);
        }

        let result = self.drive(&payload).await;
        let released = self.bus.valid.set_flag(false);
        match result.and(released) {
            Ok(()) => {
                self.state.set(EngineState::Done);
                debug!(
                    clock = self.clock.name(),
                    flits = payload.len(),
                    at = %self.clock.sim().now(),
                    "send complete"
                );
                Ok(())
            }
            Err(err) => {
                self.state.set(EngineState::Failed);
                Err(err)
            }
        }
    }

    fn validate(&self, payload: &Payload) -> Result<(), SimError> {
        if payload.is_empty() {
            return Err(SimError::config("payload must contain at least one flit"));
        }
        if self.bus.data.is_empty() {
            return Ok(());
        }
        for (index, flit) in payload.iter().enumerate() {
            if flit.arity() != self.bus.data.len() {
                return Err(SimError::config(format!(
                    "flit {index} has {} values but {} data signals are bound",
                    flit.arity(),
                    self.bus.data.len()
                )));
            }
            for (value, lane) in flit.values().iter().zip(&self.bus.data) {
                if !lane.fits(*value) {
                    return Err(SimError::config(format!(
                        "flit {index}: value {value:#x} does not fit {}-bit signal '{}'",
                        lane.bit_width(),
                        lane.name()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn drive(&self, payload: &Payload) -> Result<(), SimError> {
        let final_index = payload.len() - 1;
        let mut guard = TimeoutGuard::for_send(self.options.timeout_cycles);
        for (index, flit) in payload.iter().enumerate() {
            self.present(flit, index == final_index)?;
            loop {
                let presence = self.assert_presence().await?;
                self.state.set(EngineState::AwaitingEdge);
                self.clock.rising_edge().await;
                if presence && self.bus.ready.is_high() {
                    break;
                }
                if let Err(err) = guard.stall(index, self.clock.sim().now()) {
                    warn!(
                        clock = self.clock.name(),
                        flit = index,
                        stalled = guard.stalled(),
                        "send timed out"
                    );
                    return Err(err);
                }
            }
            guard.progress();
            trace!(flit = index, at = %self.clock.sim().now(), "flit accepted");
        }
        Ok(())
    }

    /// Puts a flit's data and framing on the bus.
    fn present(&self, flit: &Flit, is_final: bool) -> Result<(), SimError> {
        for (value, lane) in flit.values().iter().zip(&self.bus.data) {
            lane.set_value(*value)?;
        }
        self.bus.last.set_flag(is_final)
    }

    /// Drives `valid` for the coming edge and returns whether presence is asserted.
    async fn assert_presence(&self) -> Result<bool, SimError> {
        if !self.bus.valid.is_bound() {
            return Ok(true);
        }
        if !self.options.valid_only_when_ready {
            self.bus.valid.set_flag(true)?;
            return Ok(true);
        }
        self.state.set(EngineState::AwaitingPresence);
        self.clock.falling_edge().await;
        let ready = self.bus.ready.is_high();
        self.bus.valid.set_flag(ready)?;
        Ok(ready)
    }
}

/// Sends `payload` on `bus`. Owns its arguments so it can be spawned as a task.
pub async fn send(
    payload: impl Into<Payload>,
    clock: Signal,
    bus: Bus,
    options: SendOptions,
) -> Result<(), SimError> {
    Sender::new(clock, bus, options).send(payload).await
}
