//! Clocked valid/ready handshake engines.
//!
//! A [`Sender`] drives flits onto a [`Bus`] and a [`Receiver`] captures them,
//! both synchronized to the rising edge of a shared clock signal. Every bus
//! signal is optional: an unbound `valid` means always present, an unbound
//! `ready` means always accepted and an unbound `last` makes every flit a
//! complete transaction. Each engine carries its own stall budget and fails
//! with [`SimError::Timeout`](strobe_sim::SimError::Timeout) when a flit makes
//! no progress within it.
//!
//! Alongside the engines the crate provides the pieces a bench orchestrator
//! starts around them: [`drive_random`] for interface fuzzing, [`watchdog`]
//! as a run-wide time budget and [`reset`] for the reset pulse.
//!
//! ```ignore
//! use strobe_handshake::{receive, send, Bus, ReceiveOptions, SendOptions};
//!
//! let bus = Bus::new()
//!     .with_data([a, b])
//!     .with_valid(valid)
//!     .with_ready(ready)
//!     .with_last(last);
//! sim.spawn("send", send(payload, clk.clone(), bus.clone(), SendOptions::default()));
//! let flits = sim.run(receive(clk, bus, ReceiveOptions::default()))?;
//! ```

#![warn(missing_docs)]

pub mod binding;
pub mod engine;
pub mod flit;
pub mod recv;
pub mod reset;
pub mod send;
pub mod stimulus;
pub mod watchdog;

pub use binding::{Bus, Port};
pub use engine::EngineState;
pub use flit::{Flit, Payload};
pub use recv::{receive, ReceiveOptions, Receiver};
pub use reset::reset;
pub use send::{send, SendOptions, Sender};
pub use stimulus::drive_random;
pub use watchdog::{start_watchdog, watchdog};

/// Stalled cycles tolerated by default before an engine gives up.
pub const DEFAULT_TIMEOUT_CYCLES: u64 = 128;
