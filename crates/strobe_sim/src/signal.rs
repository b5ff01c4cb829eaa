//! Signal bindings: handles to the wires and buses a bench reads and drives.
//!
//! Each [`Signal`] has a flat [`SignalId`], a fixed bit width and a settled
//! value. Writes never take effect immediately: [`Signal::set_value`] parks
//! the value on the signal and the kernel applies it at the next settle
//! phase, so every task reading in the same step sees the same value.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::kernel::{SimHandle, Shared};
use crate::trigger::{Edge, Trigger, TriggerKind};

/// Widest signal the kernel can hold; values are stored as `u128`.
pub const MAX_WIDTH: u32 = 128;

/// Opaque ID for a simulation signal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Storage behind a [`Signal`] handle.
#[derive(Debug)]
pub(crate) struct SignalCell {
    pub(crate) id: SignalId,
    pub(crate) name: String,
    pub(crate) width: u32,
    /// Settled value visible to readers.
    pub(crate) value: Cell<u128>,
    /// Value waiting for the next settle phase.
    pub(crate) pending: Cell<Option<u128>>,
}

impl SignalCell {
    pub(crate) fn new(id: SignalId, name: String, width: u32) -> Self {
        Self {
            id,
            name,
            width,
            value: Cell::new(0),
            pending: Cell::new(None),
        }
    }
}

/// Returns the largest value representable in `width` bits.
pub fn mask(width: u32) -> u128 {
    if width >= MAX_WIDTH {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// A handle to one wire or bus.
///
/// Cloning is cheap and every clone refers to the same wire. Handles are
/// created by [`SimHandle::signal`](crate::SimHandle::signal) and are only
/// meaningful inside the simulator that created them.
#[derive(Clone)]
pub struct Signal {
    pub(crate) cell: Rc<SignalCell>,
    pub(crate) shared: Rc<Shared>,
}

impl Signal {
    /// Returns this signal's ID.
    pub fn id(&self) -> SignalId {
        self.cell.id
    }

    /// Returns the signal's name.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Returns the bit width fixed at creation.
    pub fn bit_width(&self) -> u32 {
        self.cell.width
    }

    /// Returns the last settled value.
    pub fn get_value(&self) -> u128 {
        self.cell.value.get()
    }

    /// Returns true if the settled value has bit 0 set.
    pub fn is_high(&self) -> bool {
        self.get_value() & 1 == 1
    }

    /// Returns true if `value` is representable in this signal's width.
    pub fn fits(&self, value: u128) -> bool {
        value <= mask(self.cell.width)
    }

    /// Schedules `value` to be applied at the next settle phase.
    ///
    /// The last write made before the settle wins. Values wider than the
    /// signal are rejected without touching the wire.
    pub fn set_value(&self, value: u128) -> Result<(), SimError> {
        if !self.fits(value) {
            return Err(SimError::config(format!(
                "value {value:#x} does not fit {}-bit signal '{}'",
                self.cell.width, self.cell.name
            )));
        }
        let first_write = self.cell.pending.replace(Some(value)).is_none();
        if first_write {
            self.shared.mark_dirty(Rc::clone(&self.cell));
        }
        Ok(())
    }

    /// Suspension point: resumes at the next 0 -> 1 transition of bit 0.
    pub fn rising_edge(&self) -> Trigger {
        self.edge(Edge::Rising)
    }

    /// Suspension point: resumes at the next 1 -> 0 transition of bit 0.
    pub fn falling_edge(&self) -> Trigger {
        self.edge(Edge::Falling)
    }

    /// Suspension point: resumes at the next settled change of any bit.
    pub fn value_change(&self) -> Trigger {
        self.edge(Edge::Any)
    }

    /// Suspension point: resumes at the read-only point of the current step.
    pub fn read_only_point(&self) -> Trigger {
        Trigger::new(Rc::clone(&self.shared), TriggerKind::ReadOnly)
    }

    /// Returns a handle to the simulator that owns this signal.
    pub fn sim(&self) -> SimHandle {
        SimHandle::from_shared(Rc::clone(&self.shared))
    }

    fn edge(&self, edge: Edge) -> Trigger {
        Trigger::new(
            Rc::clone(&self.shared),
            TriggerKind::Edge(self.cell.id, edge),
        )
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for Signal {}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.cell.name)
            .field("width", &self.cell.width)
            .field("value", &self.cell.value.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Simulator;
    use crate::SimConfig;

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn mask_widths() {
        assert_eq!(mask(1), 1);
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(128), u128::MAX);
    }

    #[test]
    fn write_is_deferred_until_settle() {
        let sim = Simulator::new(SimConfig::default());
        let sig = sim.signal("a", 4).unwrap();
        sig.set_value(9).unwrap();
        assert_eq!(sig.get_value(), 0);
        assert_eq!(sig.cell.pending.get(), Some(9));
    }

    #[test]
    fn last_write_wins() {
        let sim = Simulator::new(SimConfig::default());
        let sig = sim.signal("a", 4).unwrap();
        sig.set_value(1).unwrap();
        sig.set_value(2).unwrap();
        assert_eq!(sig.cell.pending.get(), Some(2));
    }

    #[test]
    fn out_of_range_write_rejected() {
        let sim = Simulator::new(SimConfig::default());
        let sig = sim.signal("bit", 1).unwrap();
        let err = sig.set_value(2).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
        assert_eq!(sig.cell.pending.get(), None);
    }

    #[test]
    fn clones_are_equal() {
        let sim = Simulator::new(SimConfig::default());
        let a = sim.signal("a", 1).unwrap();
        let b = sim.signal("b", 1).unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn debug_shows_name_and_width() {
        let sim = Simulator::new(SimConfig::default());
        let sig = sim.signal("data", 8).unwrap();
        let text = format!("{sig:?}");
        assert!(text.contains("data"));
        assert!(text.contains('8'));
    }
}
