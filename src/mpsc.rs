//! Multi Producer Single Consumer ring buffer.
//!
//! The read side is exactly the SPSC [`Consumer`]. Only the write path
//! changes, since any number of [`MpscProducer`] handles may push at once.
//!
//! A push goes through three steps:
//!
//! 1. Reserve: claim slots by moving the `reserve` frontier forward with a
//!    CAS. This fixes the order the consumer will see the elements in.
//! 2. Write: copy the payload into the claimed slots. Producers do this in
//!    parallel and may finish in any order.
//! 3. Complete: count the finished slots in `completed` with a CAS. If
//!    `completed` has caught up with `reserve`, no reserved slot is still
//!    being written and the producer that noticed publishes everything up to
//!    that point by moving `write`. Otherwise a later finisher will.
//!
//! With the `thumbv6` feature the whole push instead runs inside a single
//! critical section.

use crate::{
    atomic,
    ring::{Consumer, RingBuffer},
    Result,
};
use core::{
    cmp::min,
    fmt,
    ptr,
    result::Result as CoreResult,
    slice,
    sync::atomic::{
        AtomicUsize,
        Ordering::{AcqRel, Acquire, Release},
    },
};

/// A backing structure for a MPSC queue. Split it into an [`MpscProducer`],
/// which can be cloned freely, and a single [`Consumer`].
pub struct MpscRingBuffer<T> {
    ring: RingBuffer<T>,

    /// Where the next producer will claim a slot. Leads or equals the
    /// ring's `write` cursor; the gap is reserved slots not yet published.
    reserve: AtomicUsize,

    /// How many reserved slots have had their payload written, counted as a
    /// cursor from the same origin as `reserve`.
    completed: AtomicUsize,

    /// Live `MpscProducer` handles
    producers: AtomicUsize,
}

impl<T: Copy + Default> MpscRingBuffer<T> {
    /// Create a buffer able to hold `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is too large to be represented, see
    /// [`MpscRingBuffer::try_new`].
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(rb) => rb,
            Err(e) => panic!("ringq: unable to create buffer: {}", e),
        }
    }

    /// Create a buffer able to hold `capacity` elements, returning
    /// [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if the
    /// capacity can not be represented.
    pub fn try_new(capacity: usize) -> Result<Self> {
        Ok(Self {
            ring: RingBuffer::try_new(capacity)?,
            reserve: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            producers: AtomicUsize::new(0),
        })
    }
}

impl<T: Copy> MpscRingBuffer<T> {
    /// Attempt to split the buffer into a producer handle and the consumer.
    /// If buffer has already been split, an error will be returned.
    ///
    /// ```rust
    /// use ringq::MpscRingBuffer;
    ///
    /// let buffer: MpscRingBuffer<u8> = MpscRingBuffer::new(6);
    /// let (prod, mut cons) = buffer.try_split().unwrap();
    /// let prod2 = prod.clone();
    ///
    /// assert!(prod.push(1));
    /// assert!(prod2.push(2));
    /// assert_eq!(cons.pop(), 1);
    /// assert_eq!(cons.pop(), 2);
    ///
    /// // Not possible to split twice
    /// assert!(buffer.try_split().is_err());
    /// ```
    pub fn try_split(&self) -> Result<(MpscProducer<'_, T>, Consumer<'_, T>)> {
        self.ring.claim()?;
        atomic::store(&self.producers, 1, Release);

        #[cfg(feature = "defmt_0_3")]
        defmt::trace!("ringq: split mpsc buffer, capacity {=usize}", self.capacity());

        Ok((MpscProducer { mpsc: self }, Consumer { rb: &self.ring }))
    }

    /// Attempt to release the producer and consumer, emptying the buffer so
    /// it may be split again.
    ///
    /// `prod` must be the last live producer handle of THIS buffer, and `cons`
    /// its consumer, otherwise both are handed back in the error.
    pub fn try_release<'a>(
        &'a self,
        prod: MpscProducer<'a, T>,
        cons: Consumer<'a, T>,
    ) -> CoreResult<(), (MpscProducer<'a, T>, Consumer<'a, T>)> {
        if !(ptr::eq(prod.mpsc, self) && ptr::eq(cons.rb, &self.ring)) {
            return Err((prod, cons));
        }

        // Other clones may still be pushing
        if atomic::load(&self.producers, Acquire) != 1 {
            return Err((prod, cons));
        }

        drop(prod);
        drop(cons);

        self.ring.reset();
        atomic::store(&self.reserve, 0, Release);
        atomic::store(&self.completed, 0, Release);
        self.ring.unclaim();

        #[cfg(feature = "defmt_0_3")]
        defmt::trace!("ringq: released mpsc buffer");

        Ok(())
    }

    /// The number of elements this buffer can hold, as given at construction
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Number of published elements that can currently be read. Only a
    /// snapshot unless called from the consumer.
    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// Number of elements that can currently be pushed. Slots reserved by a
    /// producer that is still writing them count as taken.
    pub fn available_for_write(&self) -> usize {
        let read = atomic::load(&self.ring.read, Acquire);
        let reserve = atomic::load(&self.reserve, Acquire);
        self.ring.geom.free(read, reserve)
    }

    fn push_inner(&self, values: &[T]) -> usize {
        let (start, n) = match self.reserve(values.len()) {
            Some(claim) => claim,
            None => return 0,
        };

        // These slots belong to us alone until we complete them
        unsafe { self.ring.copy_in(start, &values[..n]) };

        self.finish(n);
        n
    }

    /// Claim up to `want` consecutive slots. Returns the first claimed slot
    /// and how many were claimed, or `None` if the buffer is full.
    fn reserve(&self, want: usize) -> Option<(usize, usize)> {
        let geom = &self.ring.geom;
        let mut start = atomic::load(&self.reserve, Acquire);
        loop {
            let read = atomic::load(&self.ring.read, Acquire);
            let n = min(want, geom.free(read, start));
            if n == 0 {
                return None;
            }

            let next = geom.advance(start, n);
            match atomic::compare_exchange_weak(&self.reserve, start, next, AcqRel, Acquire) {
                Ok(_) => return Some((start, n)),
                Err(current) => start = current,
            }
        }
    }

    /// Count `n` written slots, and publish if nothing reserved is still
    /// being written.
    fn finish(&self, n: usize) {
        let geom = &self.ring.geom;
        let mut seen = atomic::load(&self.completed, Acquire);
        let done = loop {
            let next = geom.advance(seen, n);
            match atomic::compare_exchange_weak(&self.completed, seen, next, AcqRel, Acquire) {
                Ok(_) => break next,
                Err(current) => seen = current,
            }
        };

        // No-op exchange, only succeeds if every reservation made so far has
        // been completed. This must not fail spuriously.
        if atomic::compare_exchange(&self.reserve, done, done, AcqRel, Acquire).is_ok() {
            self.publish(done);
        }
    }

    /// Move `write` forward to `target`. A publisher that was preempted may
    /// arrive after a later one, so `write` is never moved backwards.
    fn publish(&self, target: usize) {
        let geom = &self.ring.geom;
        let mut current = atomic::load(&self.ring.write, Acquire);
        while geom.is_ahead(target, current) {
            match atomic::compare_exchange_weak(&self.ring.write, current, target, AcqRel, Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl<T> fmt::Debug for MpscRingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscRingBuffer")
            .field("ring", &self.ring)
            .field("reserve", &self.reserve)
            .field("completed", &self.completed)
            .field("producers", &self.producers)
            .finish()
    }
}

/// A producer handle for an [`MpscRingBuffer`]. Clone it to push from more
/// than one thread (or interrupt) at a time.
pub struct MpscProducer<'a, T> {
    mpsc: &'a MpscRingBuffer<T>,
}

impl<'a, T: Copy> MpscProducer<'a, T> {
    /// Push one element. Returns `false`, and changes nothing, if the
    /// buffer is full.
    ///
    /// A `true` return means the element was accepted. It becomes visible to
    /// the consumer once every element reserved before it has been written,
    /// which may be slightly after this call returns.
    pub fn push(&self, value: T) -> bool {
        self.push_n(slice::from_ref(&value)) == 1
    }

    /// Push as many leading elements of `values` as fit, as one contiguous
    /// block. Returns how many were accepted.
    pub fn push_n(&self, values: &[T]) -> usize {
        #[cfg(feature = "thumbv6")]
        let pushed = cortex_m::interrupt::free(|_| self.mpsc.push_inner(values));

        #[cfg(not(feature = "thumbv6"))]
        let pushed = self.mpsc.push_inner(values);

        pushed
    }

    /// Number of elements that can currently be pushed. Other producers may
    /// take some of that room at any time.
    pub fn available_for_write(&self) -> usize {
        self.mpsc.available_for_write()
    }

    /// The number of elements the buffer can hold
    pub fn capacity(&self) -> usize {
        self.mpsc.capacity()
    }
}

impl<'a, T> Clone for MpscProducer<'a, T> {
    fn clone(&self) -> Self {
        atomic::fetch_add(&self.mpsc.producers, 1, AcqRel);
        Self { mpsc: self.mpsc }
    }
}

impl<'a, T> Drop for MpscProducer<'a, T> {
    fn drop(&mut self) {
        atomic::fetch_sub(&self.mpsc.producers, 1, AcqRel);
    }
}
