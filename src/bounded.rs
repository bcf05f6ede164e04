//! Fixed-capacity byte values.
//!
//! [`Bounded`] stores up to `N` bytes inline. Capacity is checked whenever
//! bytes are added, so a value can never silently exceed its bound.
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("capacity exceeded: need {needed} bytes, capacity is {capacity}")]
pub struct CapacityError {
    pub needed: usize,
    pub capacity: usize,
}

#[derive(Clone, Copy)]
pub struct Bounded<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Bounded<N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CapacityError> {
        let mut b = Self::new();
        b.try_extend(bytes)?;
        Ok(b)
    }

    /// Append `bytes`, or leave the value untouched and fail if they do not fit.
    pub fn try_extend(&mut self, bytes: &[u8]) -> Result<(), CapacityError> {
        let needed = self.len + bytes.len();
        if needed > N {
            return Err(CapacityError {
                needed,
                capacity: N,
            });
        }
        self.buf[self.len..needed].copy_from_slice(bytes);
        self.len = needed;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for Bounded<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PartialEq for Bounded<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for Bounded<N> {}

impl<const N: usize> PartialOrd for Bounded<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const N: usize> Ord for Bounded<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl<const N: usize> fmt::Debug for Bounded<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bounded<{}>({:?})", N, String::from_utf8_lossy(self.as_bytes()))
    }
}
