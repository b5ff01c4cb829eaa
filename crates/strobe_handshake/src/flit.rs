//! Flits and payloads.
//!
//! A [`Flit`] is an ordered list of values, one per bound data signal. A
//! scalar is a one-value flit and a flit with no values stands for a
//! transfer that carried no captured data. A [`Payload`] is the ordered list
//! of flits handed to the send engine; its length is the number of
//! transfers, whether or not data signals are bound.

use serde::Serialize;

/// One transfer unit across the handshake.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Flit(Vec<u128>);

impl Flit {
    /// Creates a flit from positional values.
    pub fn new(values: Vec<u128>) -> Self {
        Self(values)
    }

    /// A flit with no values: one transfer with no data.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns the positional values.
    pub fn values(&self) -> &[u128] {
        &self.0
    }

    /// Returns the number of values.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a placeholder flit.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the flit and returns its values.
    pub fn into_values(self) -> Vec<u128> {
        self.0
    }
}

impl From<u128> for Flit {
    fn from(value: u128) -> Self {
        Self(vec![value])
    }
}

impl From<(u128, u128)> for Flit {
    fn from((a, b): (u128, u128)) -> Self {
        Self(vec![a, b])
    }
}

impl From<(u128, u128, u128)> for Flit {
    fn from((a, b, c): (u128, u128, u128)) -> Self {
        Self(vec![a, b, c])
    }
}

impl From<Vec<u128>> for Flit {
    fn from(values: Vec<u128>) -> Self {
        Self(values)
    }
}

impl<const N: usize> From<[u128; N]> for Flit {
    fn from(values: [u128; N]) -> Self {
        Self(values.to_vec())
    }
}

/// The ordered flits of one send call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload(Vec<Flit>);

impl Payload {
    /// Number of flits, i.e. the number of transfers to perform.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the flits in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Flit> {
        self.0.iter()
    }

    /// Returns the flits as a slice.
    pub fn flits(&self) -> &[Flit] {
        &self.0
    }
}

impl From<Flit> for Payload {
    fn from(flit: Flit) -> Self {
        Self(vec![flit])
    }
}

impl From<u128> for Payload {
    fn from(value: u128) -> Self {
        Self(vec![Flit::from(value)])
    }
}

impl<T: Into<Flit>> From<Vec<T>> for Payload {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Into<Flit>, const N: usize> From<[T; N]> for Payload {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Into<Flit>> FromIterator<T> for Payload {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = &'a Flit;
    type IntoIter = std::slice::Iter<'a, Flit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
