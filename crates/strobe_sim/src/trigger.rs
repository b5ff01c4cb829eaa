//! Suspension points.
//!
//! A task only yields to the kernel by awaiting a [`Trigger`]. The set of
//! trigger kinds is fixed: signal edges, the read-only point of the current
//! step, and timers.

use std::cell::Cell;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::kernel::Shared;
use crate::signal::SignalId;

/// Which transition of a signal wakes an edge trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Bit 0 goes from 0 to 1.
    Rising,
    /// Bit 0 goes from 1 to 0.
    Falling,
    /// Any bit changes.
    Any,
}

impl Edge {
    /// Returns true if a settled change from `old` to `new` matches this edge.
    pub fn matches(self, old: u128, new: u128) -> bool {
        match self {
            Edge::Rising => old & 1 == 0 && new & 1 == 1,
            Edge::Falling => old & 1 == 1 && new & 1 == 0,
            Edge::Any => old != new,
        }
    }
}

/// What a [`Trigger`] waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    /// A settled transition of a signal.
    Edge(SignalId, Edge),
    /// The read-only point at the end of the current time step.
    ReadOnly,
    /// A delay in femtoseconds from the moment of first poll.
    Timer(u64),
}

/// A registered waiter: fired by setting its slot and waking its task.
pub(crate) struct Waiter {
    pub(crate) slot: Rc<Cell<bool>>,
    pub(crate) waker: Waker,
}

impl Waiter {
    pub(crate) fn fire(self) {
        self.slot.set(true);
        self.waker.wake();
    }
}

/// A pending timer, ordered by due time and then registration order.
pub(crate) struct TimerEntry {
    pub(crate) due_fs: u64,
    pub(crate) seq: u64,
    pub(crate) waiter: Waiter,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_fs == other.due_fs && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_fs
            .cmp(&other.due_fs)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A future that completes when its [`TriggerKind`] fires.
///
/// The trigger registers itself with the kernel on first poll, so creating
/// one without awaiting it has no effect.
#[must_use = "triggers do nothing unless awaited"]
pub struct Trigger {
    shared: Rc<Shared>,
    kind: TriggerKind,
    slot: Option<Rc<Cell<bool>>>,
}

impl Trigger {
    pub(crate) fn new(shared: Rc<Shared>, kind: TriggerKind) -> Self {
        Self {
            shared,
            kind,
            slot: None,
        }
    }

    /// Returns what this trigger waits for.
    pub fn kind(&self) -> TriggerKind {
        self.kind
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(slot) = &self.slot {
            return if slot.get() {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }
        if self.kind == TriggerKind::Timer(0) {
            return Poll::Ready(());
        }
        let slot = Rc::new(Cell::new(false));
        let waiter = Waiter {
            slot: Rc::clone(&slot),
            waker: cx.waker().clone(),
        };
        self.shared.register(self.kind, waiter);
        self.slot = Some(slot);
        Poll::Pending
    }
}
