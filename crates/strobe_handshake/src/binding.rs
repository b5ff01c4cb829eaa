//! Optional bindings and the handshake bus.
//!
//! Every control signal of the handshake may be left unbound. [`Port`]
//! captures that as a variant instead of a nullable handle: an absent port
//! ignores writes and always reads as asserted, which is exactly "always
//! valid", "always ready" or "every flit is the last one".

use strobe_sim::{SimError, Signal};

/// A control signal that may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Port {
    /// Driven and sampled through a signal.
    Bound(Signal),
    /// Not wired. Reads as asserted, writes are dropped.
    #[default]
    Absent,
}

impl Port {
    /// Returns true if a signal is bound.
    pub fn is_bound(&self) -> bool {
        matches!(self, Port::Bound(_))
    }

    /// Returns the bound signal, if any.
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Port::Bound(sig) => Some(sig),
            Port::Absent => None,
        }
    }

    /// Samples the flag. An absent port is always asserted.
    pub fn is_high(&self) -> bool {
        match self {
            Port::Bound(sig) => sig.is_high(),
            Port::Absent => true,
        }
    }

    /// Drives the flag to 1 or 0. No-op when absent.
    pub fn set_flag(&self, flag: bool) -> Result<(), SimError> {
        match self {
            Port::Bound(sig) => sig.set_value(u128::from(flag)),
            Port::Absent => Ok(()),
        }
    }
}

impl From<Signal> for Port {
    fn from(sig: Signal) -> Self {
        Port::Bound(sig)
    }
}

impl From<Option<Signal>> for Port {
    fn from(sig: Option<Signal>) -> Self {
        sig.map_or(Port::Absent, Port::Bound)
    }
}

/// The signals one side of a valid/ready interface is attached to.
///
/// `data` holds zero or more lanes matched positionally against flit
/// values. The three flags default to [`Port::Absent`].
#[derive(Clone, Debug, Default)]
pub struct Bus {
    /// Data lanes, in flit order.
    pub data: Vec<Signal>,
    /// Marks the final flit of a transaction.
    pub last: Port,
    /// Producer presence.
    pub valid: Port,
    /// Consumer readiness.
    pub ready: Port,
}

impl Bus {
    /// A bus with nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the data lanes.
    pub fn with_data(mut self, lanes: impl IntoIterator<Item = Signal>) -> Self {
        self.data = lanes.into_iter().collect();
        self
    }

    /// Binds the `last` flag.
    pub fn with_last(mut self, sig: Signal) -> Self {
        self.last = Port::Bound(sig);
        self
    }

    /// Binds the `valid` flag.
    pub fn with_valid(mut self, sig: Signal) -> Self {
        self.valid = Port::Bound(sig);
        self
    }

    /// Binds the `ready` flag.
    pub fn with_ready(mut self, sig: Signal) -> Self {
        self.ready = Port::Bound(sig);
        self
    }

    /// Samples every data lane.
    pub fn sample_data(&self) -> Vec<u128> {
        self.data.iter().map(Signal::get_value).collect()
    }
}
