//! Cursor arithmetic shared by both queue flavors.
//!
//! A cursor is stored as a "stamp": the low bits hold the slot index
//! (always `< slots`), the bits above hold a lap count that is bumped every
//! time the index wraps back to zero. Capacity math only ever looks at the
//! index. The lap exists so that two stamps compare equal only if they name
//! the same position, not merely the same slot, which keeps the MPSC
//! reservation/publication CAS free of ABA.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    /// Number of storage slots, `capacity + 1`
    slots: usize,

    /// `slots` rounded up to a power of two. Adding this to a stamp moves
    /// it to the same index one lap later.
    one_lap: usize,
}

impl Geometry {
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        let slots = capacity.checked_add(1).ok_or(Error::CapacityOverflow)?;
        let one_lap = slots
            .checked_next_power_of_two()
            .ok_or(Error::CapacityOverflow)?;

        // Stamps are ordered with a signed wrapping difference, leave plenty
        // of lap bits so that never becomes ambiguous.
        if one_lap > (isize::MAX as usize) >> 2 {
            return Err(Error::CapacityOverflow);
        }

        Ok(Self { slots, one_lap })
    }

    #[inline(always)]
    pub(crate) fn slots(&self) -> usize {
        self.slots
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots - 1
    }

    /// Slot index named by `stamp`
    #[inline(always)]
    pub(crate) fn index(&self, stamp: usize) -> usize {
        stamp & (self.one_lap - 1)
    }

    /// Move `stamp` forward by `by` positions. `by` must not exceed `slots`.
    #[inline(always)]
    pub(crate) fn advance(&self, stamp: usize, by: usize) -> usize {
        debug_assert!(by <= self.slots);
        let idx = self.index(stamp) + by;
        if idx < self.slots {
            stamp.wrapping_add(by)
        } else {
            // Wrapped past the end of storage, start the next lap
            let lap = stamp & !(self.one_lap - 1);
            lap.wrapping_add(self.one_lap) + (idx - self.slots)
        }
    }

    /// Number of positions from `from` forward to `to`, modulo `slots`
    #[inline(always)]
    pub(crate) fn distance(&self, from: usize, to: usize) -> usize {
        let (f, t) = (self.index(from), self.index(to));
        if t >= f {
            t - f
        } else {
            t + self.slots - f
        }
    }

    /// Free slots when the producer frontier is at `write` and the consumer
    /// is at `read`: `(read - write - 1) mod slots`
    #[inline(always)]
    pub(crate) fn free(&self, read: usize, write: usize) -> usize {
        self.capacity() - self.distance(read, write)
    }

    /// Is `a` strictly later than `b`?
    #[inline(always)]
    pub(crate) fn is_ahead(&self, a: usize, b: usize) -> bool {
        (a.wrapping_sub(b) as isize) > 0
    }
}
