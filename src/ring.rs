//! Single Producer Single Consumer ring buffer.
//!
//! The producer owns the `write` cursor and the consumer owns the `read`
//! cursor. Each side only ever reads the other side's cursor, to check for
//! free space or for available data, so neither side ever waits on a lock.

use crate::{
    atomic,
    cursor::Geometry,
    Error, Result,
};
use alloc::{boxed::Box, vec::Vec};
use core::{
    cell::UnsafeCell,
    cmp::min,
    fmt,
    ptr,
    result::Result as CoreResult,
    sync::atomic::{
        AtomicBool, AtomicUsize,
        Ordering::{AcqRel, Acquire, Release},
    },
};

/// A backing structure for a SPSC queue. Split it into a [`Producer`] and
/// [`Consumer`] pair to move data through it.
pub struct RingBuffer<T> {
    /// `capacity + 1` slots. One is always unused, so that a full buffer
    /// can be told apart from an empty one.
    buf: Box<[UnsafeCell<T>]>,

    pub(crate) geom: Geometry,

    /// Where the next element will be written. Everything before it
    /// (and after `read`) is visible to the consumer.
    pub(crate) write: AtomicUsize,

    /// Where the next element will be read from
    pub(crate) read: AtomicUsize,

    /// Have we already split?
    already_split: AtomicBool,
}

unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer able to hold `capacity` elements.
    ///
    /// Storage for `capacity + 1` elements is allocated up front, and never
    /// grows or shrinks.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is too large to be represented, see [`RingBuffer::try_new`].
    ///
    /// ```rust
    /// use ringq::RingBuffer;
    ///
    /// let buffer: RingBuffer<u8> = RingBuffer::new(6);
    /// assert_eq!(buffer.capacity(), 6);
    /// assert_eq!(buffer.available_for_write(), 6);
    /// ```
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(rb) => rb,
            Err(e) => panic!("ringq: unable to create buffer: {}", e),
        }
    }

    /// Create a buffer able to hold `capacity` elements, returning
    /// [`Error::CapacityOverflow`] if the capacity can not be represented.
    pub fn try_new(capacity: usize) -> Result<Self> {
        let geom = Geometry::new(capacity)?;
        let buf = (0..geom.slots())
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buf,
            geom,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            already_split: AtomicBool::new(false),
        })
    }
}

impl<T: Copy> RingBuffer<T> {
    /// Attempt to split the `RingBuffer` into `Producer` and `Consumer` halves to
    /// gain access to the buffer. If buffer has already been split, an error will
    /// be returned.
    ///
    /// ```rust
    /// use ringq::RingBuffer;
    ///
    /// // Create and split a new buffer
    /// let buffer: RingBuffer<u8> = RingBuffer::new(6);
    /// let (prod, cons) = buffer.try_split().unwrap();
    ///
    /// // Not possible to split twice
    /// assert!(buffer.try_split().is_err());
    /// ```
    pub fn try_split(&self) -> Result<(Producer<'_, T>, Consumer<'_, T>)> {
        self.claim()?;

        #[cfg(feature = "defmt_0_3")]
        defmt::trace!("ringq: split spsc buffer, capacity {=usize}", self.capacity());

        Ok((Producer { rb: self }, Consumer { rb: self }))
    }

    /// Attempt to release the Producer and Consumer
    ///
    /// This empties the buffer so it may be split again later.
    ///
    /// The `Producer` and `Consumer` must be from THIS `RingBuffer`, or they
    /// are handed back in the error.
    ///
    /// ```rust
    /// use ringq::RingBuffer;
    ///
    /// let buffer: RingBuffer<u8> = RingBuffer::new(6);
    /// let (mut prod, cons) = buffer.try_split().unwrap();
    /// assert!(prod.push(7));
    ///
    /// // Release the producer and consumer
    /// assert!(buffer.try_release(prod, cons).is_ok());
    ///
    /// // Split again, anything left over was discarded
    /// let (_prod, cons) = buffer.try_split().unwrap();
    /// assert_eq!(cons.available(), 0);
    /// ```
    pub fn try_release<'a>(
        &'a self,
        prod: Producer<'a, T>,
        cons: Consumer<'a, T>,
    ) -> CoreResult<(), (Producer<'a, T>, Consumer<'a, T>)> {
        // Are these our producers and consumers?
        if !(ptr::eq(prod.rb, self) && ptr::eq(cons.rb, self)) {
            return Err((prod, cons));
        }

        // Drop the producer and consumer halves
        drop(prod);
        drop(cons);

        self.reset();
        self.unclaim();

        #[cfg(feature = "defmt_0_3")]
        defmt::trace!("ringq: released spsc buffer");

        Ok(())
    }

    /// The number of elements this buffer can hold, as given at construction
    pub fn capacity(&self) -> usize {
        self.geom.capacity()
    }

    /// Number of elements that can currently be read.
    ///
    /// Called from anywhere but the consumer this is only a snapshot, and may
    /// be stale by the time it is returned.
    pub fn available(&self) -> usize {
        let read = atomic::load(&self.read, Acquire);
        let write = atomic::load(&self.write, Acquire);
        self.geom.distance(read, write)
    }

    /// Number of elements that can currently be written.
    ///
    /// Called from anywhere but the producer this is only a snapshot, and may
    /// be stale by the time it is returned.
    pub fn available_for_write(&self) -> usize {
        let read = atomic::load(&self.read, Acquire);
        let write = atomic::load(&self.write, Acquire);
        self.geom.free(read, write)
    }

    pub(crate) fn claim(&self) -> Result<()> {
        if atomic::swap(&self.already_split, true, AcqRel) {
            return Err(Error::AlreadySplit);
        }
        Ok(())
    }

    pub(crate) fn unclaim(&self) {
        // Mark the buffer as ready to be split
        atomic::swap(&self.already_split, false, AcqRel);
    }

    pub(crate) fn reset(&self) {
        atomic::store(&self.write, 0, Release);
        atomic::store(&self.read, 0, Release);
    }

    /// # Safety
    ///
    /// Same as [`RingBuffer::copy_in`], for the single slot named by `stamp`.
    #[inline(always)]
    pub(crate) unsafe fn write_slot(&self, stamp: usize, value: T) {
        self.buf[self.geom.index(stamp)].get().write(value);
    }

    /// # Safety
    ///
    /// Same as [`RingBuffer::copy_out`], for the single slot named by `stamp`.
    #[inline(always)]
    pub(crate) unsafe fn read_slot(&self, stamp: usize) -> T {
        self.buf[self.geom.index(stamp)].get().read()
    }

    /// Copy `values` into consecutive slots, starting at the slot named by
    /// `start` and wrapping around the end of storage.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive write access to every slot touched:
    /// they are past the published `write` cursor, and the consumer has
    /// released them.
    pub(crate) unsafe fn copy_in(&self, start: usize, values: &[T]) {
        debug_assert!(values.len() <= self.geom.capacity());
        let start = self.geom.index(start);
        let (wrapped, first) = self.buf.split_at(start);
        for (cell, val) in first.iter().chain(wrapped).zip(values) {
            cell.get().write(*val);
        }
    }

    /// Copy consecutive slots, starting at the slot named by `start` and
    /// wrapping around the end of storage, into `out`.
    ///
    /// # Safety
    ///
    /// Every slot touched must have been published by the producer side, and
    /// not yet released by the consumer.
    pub(crate) unsafe fn copy_out(&self, start: usize, out: &mut [T]) {
        debug_assert!(out.len() <= self.geom.capacity());
        let start = self.geom.index(start);
        let (wrapped, first) = self.buf.split_at(start);
        for (cell, val) in first.iter().chain(wrapped).zip(out.iter_mut()) {
            *val = cell.get().read();
        }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.geom.capacity())
            .field("write", &self.write)
            .field("read", &self.read)
            .field("already_split", &self.already_split)
            .finish()
    }
}

/// `Producer` is the interface for pushing data into a [`RingBuffer`].
///
/// There is only ever one `Producer` per buffer, so it owns the `write`
/// cursor outright; nothing it does needs a compare and swap.
pub struct Producer<'a, T> {
    pub(crate) rb: &'a RingBuffer<T>,
}

impl<'a, T: Copy> Producer<'a, T> {
    /// Push one element. Returns `false`, and changes nothing, if the
    /// buffer is full.
    ///
    /// ```rust
    /// use ringq::RingBuffer;
    ///
    /// let buffer: RingBuffer<u8> = RingBuffer::new(2);
    /// let (mut prod, _cons) = buffer.try_split().unwrap();
    ///
    /// assert!(prod.push(1));
    /// assert!(prod.push(2));
    /// assert!(!prod.push(3));
    /// ```
    pub fn push(&mut self, value: T) -> bool {
        let rb = self.rb;
        let write = atomic::load(&rb.write, Acquire);
        let read = atomic::load(&rb.read, Acquire);
        let next = rb.geom.advance(write, 1);

        if rb.geom.index(next) == rb.geom.index(read) {
            return false;
        }

        // The payload lands before the cursor moves, the consumer can never
        // observe `next` while the slot still holds stale data.
        unsafe { rb.write_slot(write, value) };
        atomic::store(&rb.write, next, Release);
        true
    }

    /// Push as many leading elements of `values` as fit, and make them all
    /// visible to the consumer at once. Returns how many were accepted.
    pub fn push_n(&mut self, values: &[T]) -> usize {
        let rb = self.rb;
        let write = atomic::load(&rb.write, Acquire);
        let read = atomic::load(&rb.read, Acquire);
        let n = min(values.len(), rb.geom.free(read, write));

        if n == 0 {
            return 0;
        }

        unsafe { rb.copy_in(write, &values[..n]) };
        atomic::store(&rb.write, rb.geom.advance(write, n), Release);
        n
    }

    /// Number of elements that can be pushed right now. Only grows while
    /// this handle is not pushing.
    pub fn available_for_write(&self) -> usize {
        self.rb.available_for_write()
    }

    /// The number of elements the buffer can hold
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}

/// `Consumer` is the interface for reading data out of a [`RingBuffer`] or an
/// [`MpscRingBuffer`](crate::MpscRingBuffer).
///
/// The read side is identical for both flavors, since there is only ever
/// one consumer no matter how many producers feed it.
pub struct Consumer<'a, T> {
    pub(crate) rb: &'a RingBuffer<T>,
}

impl<'a, T: Copy> Consumer<'a, T> {
    /// Pop the oldest element, or `None` if the buffer is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let rb = self.rb;
        let read = atomic::load(&rb.read, Acquire);
        let write = atomic::load(&rb.write, Acquire);

        if rb.geom.index(read) == rb.geom.index(write) {
            return None;
        }

        let val = unsafe { rb.read_slot(read) };
        atomic::store(&rb.read, rb.geom.advance(read, 1), Release);
        Some(val)
    }

    /// Copy out as many elements as fit in `out`, oldest first, and release
    /// them all in one step. Returns how many were copied, which is zero for
    /// an empty buffer.
    ///
    /// The result is the same as calling [`Consumer::pop`] up to
    /// `out.len()` times.
    ///
    /// ```rust
    /// use ringq::RingBuffer;
    ///
    /// let buffer: RingBuffer<u8> = RingBuffer::new(4);
    /// let (mut prod, mut cons) = buffer.try_split().unwrap();
    /// assert_eq!(prod.push_n(&[1, 2, 3]), 3);
    ///
    /// let mut out = [0u8; 8];
    /// assert_eq!(cons.pop_n(&mut out), 3);
    /// assert_eq!(&out[..3], &[1, 2, 3]);
    /// ```
    pub fn pop_n(&mut self, out: &mut [T]) -> usize {
        let rb = self.rb;
        let read = atomic::load(&rb.read, Acquire);
        let write = atomic::load(&rb.write, Acquire);
        let n = min(out.len(), rb.geom.distance(read, write));

        if n == 0 {
            return 0;
        }

        unsafe { rb.copy_out(read, &mut out[..n]) };
        atomic::store(&rb.read, rb.geom.advance(read, n), Release);
        n
    }

    /// Discard everything currently readable in one step.
    pub fn flush(&mut self) {
        let write = atomic::load(&self.rb.write, Acquire);
        atomic::store(&self.rb.read, write, Release);
    }

    /// Number of elements waiting to be read
    pub fn available(&self) -> usize {
        self.rb.available()
    }

    /// The number of elements the buffer can hold
    pub fn capacity(&self) -> usize {
        self.rb.capacity()
    }
}

impl<'a, T: Copy + Default> Consumer<'a, T> {
    /// Pop the oldest element, or `T::default()` if the buffer is empty.
    ///
    /// A stored default value looks exactly like an empty buffer, use
    /// [`Consumer::try_pop`] when the difference matters.
    pub fn pop(&mut self) -> T {
        self.try_pop().unwrap_or_default()
    }

    /// Look at the oldest element without removing it, or `T::default()`
    /// if the buffer is empty.
    pub fn peek(&self) -> T {
        let rb = self.rb;
        let read = atomic::load(&rb.read, Acquire);
        let write = atomic::load(&rb.write, Acquire);

        if rb.geom.index(read) == rb.geom.index(write) {
            return T::default();
        }

        unsafe { rb.read_slot(read) }
    }
}
