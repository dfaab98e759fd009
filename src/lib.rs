//! # ringq
//!
//! `ringq` is a fixed capacity, lock-free, `no_std` (with `alloc`) ring buffer queue for moving
//! `Copy` values between threads, or from an interrupt handler to main code, without either side
//! ever waiting on the other. It was written for serial style byte and record streams, where the
//! receive path must never stall behind the code draining it.
//!
//! Two flavors are provided:
//!
//! * [`RingBuffer`], a Single Producer Single Consumer queue.
//! * [`MpscRingBuffer`], a Multi Producer Single Consumer queue. Producers claim slots with a
//!   compare and swap, write them in parallel, and the last writer to finish publishes the whole
//!   contiguous block at once.
//!
//! Both use `capacity + 1` slots of storage and two cursors. One slot is always left unused so
//! that "full" and "empty" can be told apart without a shared counter.
//!
//! ## SPSC usage
//!
//! ```rust
//! use ringq::RingBuffer;
//!
//! // Room for four elements
//! let rb: RingBuffer<u8> = RingBuffer::new(4);
//! let (mut prod, mut cons) = rb.try_split().unwrap();
//!
//! assert!(prod.push(1));
//! assert!(prod.push(2));
//! assert_eq!(cons.available(), 2);
//!
//! assert_eq!(cons.pop(), 1);
//! assert_eq!(cons.peek(), 2);
//! assert_eq!(cons.pop(), 2);
//!
//! // Empty queues hand back the default value
//! assert_eq!(cons.pop(), 0);
//! ```
//!
//! ## MPSC usage
//!
//! ```rust
//! use ringq::MpscRingBuffer;
//! use std::thread;
//!
//! let rb: MpscRingBuffer<u32> = MpscRingBuffer::new(64);
//! let (prod, mut cons) = rb.try_split().unwrap();
//!
//! thread::scope(|s| {
//!     for t in 0..4 {
//!         let prod = prod.clone();
//!         s.spawn(move || {
//!             for i in 0..8 {
//!                 assert!(prod.push(t * 100 + i));
//!             }
//!         });
//!     }
//! });
//!
//! let mut out = [0u32; 64];
//! assert_eq!(cons.pop_n(&mut out), 32);
//! ```
//!
//! ## Features
//!
//! * `thumbv6`: coordinate with Cortex-M critical sections instead of CAS atomics, for
//!   Cortex-M0/M0+ parts. MPSC pushes run entirely inside one critical section.
//! * `chaos`: insert random delays around every atomic operation. Only useful for stress tests.
//! * `defmt_0_3`: `defmt::Format` for [`Error`] and trace logging of split/release.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]

extern crate alloc;

mod atomic;
mod cursor;
pub mod mpsc;
pub mod ring;

pub use mpsc::{MpscProducer, MpscRingBuffer};
pub use ring::{Consumer, Producer, RingBuffer};

use core::result::Result as CoreResult;

/// Result type used by the `ringq` interfaces
pub type Result<T> = CoreResult<T, Error>;

/// Error type used by the `ringq` interfaces
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt_0_3", derive(defmt::Format))]
pub enum Error {
    /// Unable to split the buffer, as it has already been split
    AlreadySplit,

    /// The requested capacity can not be represented, either because
    /// `capacity + 1` overflows or because no bits are left over to
    /// tag cursors with a lap count
    CapacityOverflow,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AlreadySplit => f.write_str("buffer has already been split"),
            Error::CapacityOverflow => f.write_str("requested capacity is too large"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
