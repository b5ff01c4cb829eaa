//! Sink-side handshake engine.
//!
//! The receiver holds `ready` high for the whole call and samples the bus
//! at every rising edge. Values read at the edge are the ones settled before
//! it, i.e. what the read-only point of the closing cycle saw, so a flit is
//! captured exactly on the cycle the sender counts as accepted.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use strobe_sim::{SimError, Signal};

use crate::binding::Bus;
use crate::engine::{EngineState, TimeoutGuard};
use crate::flit::Flit;
use crate::DEFAULT_TIMEOUT_CYCLES;

/// Tuning for one receive call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveOptions {
    /// Consecutive idle cycles that abort the call. Zero waits forever.
    pub timeout_cycles: u64,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            timeout_cycles: DEFAULT_TIMEOUT_CYCLES,
        }
    }
}

/// Captures transactions from a [`Bus`] in step with a clock.
#[derive(Debug)]
pub struct Receiver {
    clock: Signal,
    bus: Bus,
    options: ReceiveOptions,
    state: Cell<EngineState>,
}

impl Receiver {
    /// Creates an idle receiver.
    pub fn new(clock: Signal, bus: Bus, options: ReceiveOptions) -> Self {
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

    /// Receives one transaction and returns its flits in order.
    ///
    /// Without a `last` signal the first captured flit ends the call. With
    /// no data lanes each captured flit is [`Flit::empty`]. `ready` is
    /// deasserted on return, success or not.
    pub async fn receive(&self) -> Result<Vec<Flit>, SimError> {
        self.bus.ready.set_flag(true)?;
        let result = self.capture().await;
        let released = self.bus.ready.set_flag(false);
        match result.and_then(|flits| released.map(|()| flits)) {
            Ok(flits) => {
                self.state.set(EngineState::Done);
                debug!(
                    clock = self.clock.name(),
                    flits = flits.len(),
                    at = %self.clock.sim().now(),
                    "receive complete"
                );
                Ok(flits)
            }
            Err(err) => {
                self.state.set(EngineState::Failed);
                Err(err)
            }
        }
    }

    async fn capture(&self) -> Result<Vec<Flit>, SimError> {
        let mut flits = Vec::new();
        let mut guard = TimeoutGuard::for_receive(self.options.timeout_cycles);
        // Inside a transaction the next flit is expected on the coming edge.
        let mut streaming = false;
        loop {
            self.state.set(if streaming {
                EngineState::AwaitingEdge
            } else {
                EngineState::AwaitingPresence
            });
            self.clock.rising_edge().await;
            streaming = self.bus.valid.is_high();
            if !streaming {
                if let Err(err) = guard.stall(flits.len(), self.clock.sim().now()) {
                    warn!(
                        clock = self.clock.name(),
                        flit = flits.len(),
                        stalled = guard.stalled(),
                        "receive timed out"
                    );
                    return Err(err);
                }
                continue;
            }

            guard.progress();
            let flit = Flit::new(self.bus.sample_data());
            let terminal = self.bus.last.is_high();
            trace!(
                flit = flits.len(),
                values = ?flit.values(),
                terminal,
                at = %self.clock.sim().now(),
                "flit captured"
            );
            flits.push(flit);
            if terminal {
                return Ok(flits);
            }
        }
    }
}

/// Receives one transaction from `bus`. Owns its arguments so it can be spawned.
pub async fn receive(
    clock: Signal,
    bus: Bus,
    options: ReceiveOptions,
) -> Result<Vec<Flit>, SimError> {
    Receiver::new(clock, bus, options).receive().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use strobe_sim::{Clock, Engine, SimConfig, Simulator, TimeUnit};

    fn clocked() -> (Simulator, Signal) {
        let sim = Simulator::new(SimConfig::default());
        let clk = sim.signal("clk", 1).unwrap();
        Clock::new(clk.clone(), 2, TimeUnit::Ns).unwrap().start(false);
        (sim, clk)
    }

    #[test]
    fn unframed_receive_returns_one_flit() {
        let (mut sim, clk) = clocked();
        let data = sim.signal("data", 8).unwrap();
        let bus = Bus::new().with_data([data.clone()]);
        let flits = sim
            .run(async move {
                data.set_value(0x42)?;
                receive(clk, bus, ReceiveOptions::default()).await
            })
            .unwrap();
        assert_eq!(flits, vec![Flit::from(0x42u128)]);
    }

    #[test]
    fn no_data_lanes_yield_placeholders() {
        let (mut sim, clk) = clocked();
        let last = sim.signal("last", 1).unwrap();
        let bus = Bus::new().with_last(last.clone());
        let driver_clk = clk.clone();
        sim.spawn("framer", async move {
            // last rises before the third edge.
            driver_clk.rising_edge().await;
            driver_clk.rising_edge().await;
            last.set_value(1)?;
            Ok::<_, SimError>(())
        });
        let flits = sim
            .run(async move { receive(clk, bus, ReceiveOptions::default()).await })
            .unwrap();
        assert_eq!(flits, vec![Flit::empty(); 3]);
    }

    #[test]
    fn ready_held_during_call_and_released_after() {
        let (mut sim, clk) = clocked();
        let valid = sim.signal("valid", 1).unwrap();
        let ready = sim.signal("ready", 1).unwrap();
        let bus = Bus::new()
            .with_valid(valid.clone())
            .with_ready(ready.clone());
        let h = sim.handle();
        let (mid, after) = sim
            .run(async move {
                let rx = h.spawn("rx", receive(clk.clone(), bus, ReceiveOptions::default()));
                clk.rising_edge().await;
                let mid = ready.get_value();
                valid.set_value(1)?;
                rx.await?;
                h.read_only_point().await;
                Ok::<_, SimError>((mid, ready.get_value()))
            })
            .unwrap();
        assert_eq!((mid, after), (1, 0));
    }

    #[test]
    fn state_tracks_idle_and_streaming_cycles() {
        let (mut sim, clk) = clocked();
        let valid = sim.signal("valid", 1).unwrap();
        let last = sim.signal("last", 1).unwrap();
        let bus = Bus::new().with_valid(valid.clone()).with_last(last.clone());
        let receiver = Rc::new(Receiver::new(clk.clone(), bus, ReceiveOptions::default()));
        assert_eq!(receiver.state(), EngineState::Idle);

        let h = sim.handle();
        let rx = Rc::clone(&receiver);
        let watched = Rc::clone(&receiver);
        let (idle, streaming, flits) = sim
            .run(async move {
                let join = h.spawn("rx", async move { rx.receive().await });
                // Edge at 1 ns saw no presence.
                clk.falling_edge().await;
                let idle = watched.state();
                valid.set_value(1)?;
                // Edge at 3 ns captured a non-final flit.
                clk.falling_edge().await;
                let streaming = watched.state();
                last.set_value(1)?;
                let flits = join.await?;
                Ok::<_, SimError>((idle, streaming, flits.len()))
            })
            .unwrap();
        assert_eq!(idle, EngineState::AwaitingPresence);
        assert_eq!(streaming, EngineState::AwaitingEdge);
        assert_eq!(flits, 2);
        assert_eq!(receiver.state(), EngineState::Done);
    }

    #[test]
    fn idle_bus_times_out_at_budget() {
        let (mut sim, clk) = clocked();
        let valid = sim.signal("valid", 1).unwrap();
        let ready = sim.signal("ready", 1).unwrap();
        let bus = Bus::new().with_valid(valid).with_ready(ready.clone());
        let options = ReceiveOptions { timeout_cycles: 3 };
        let err = sim
            .run(async move { receive(clk, bus, options).await })
            .unwrap_err();
        match err {
            SimError::Timeout {
                engine, cycles, at, ..
            } => {
                assert_eq!(engine, Engine::Receive);
                assert_eq!(cycles, 3);
                assert_eq!(at.to_ns(), 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ready.get_value(), 0);
    }
}
