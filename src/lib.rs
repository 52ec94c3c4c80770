#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

//! The _smolrpl_ library is the routing control plane of a low-power wireless mesh node.
//!
//! It has two tightly coupled halves:
//!
//!  * the [IEEE 802.15.4 frame header codec](wire/ieee802154/index.html), which prepends and
//!    retrieves MAC headers using 16-bit addresses on the wire while keeping 64-bit identities
//!    internally;
//!  * the [RPL control engine](iface/rpl/index.html), which periodically announces the node's
//!    rank (DIO), advertises its parents towards the root (DAO) and bootstraps the DODAG
//!    identity from what it hears.
//!
//! # Design
//!
//! Like the rest of the family this crate is built around fixed-size, caller-provided storage.
//! Nothing in the library allocates; packet memory lives in a [`PacketPool`] whose slots are
//! handed out as non-clonable [`PacketBuffer`]s. Ownership of a buffer moves from layer to
//! layer and ends when it is given back to the pool, so a buffer cannot be freed twice.
//!
//! Timers never call into the engine directly. An expired timer turns into a [`Task`] message
//! pushed onto a priority [`TaskQueue`], and [`Stack::poll`] runs those tasks to completion one
//! at a time.
//!
//! # Feature flags
//!
//! ## Feature `std`
//!
//! The `std` feature enables use of `Vec` backed pools and implements `std::error::Error` for
//! [`Error`].
//!
//! ## Feature `log`
//!
//! The `log` feature enables logging of events within the stack through the [log crate].
//! Events are emitted at `trace` and `debug` level.
//!
//! [log crate]: https://crates.io/crates/log
//!
//! ## Feature `defmt`
//!
//! Routes the same events through `defmt` instead. `log` and `defmt` are mutually exclusive.
//!
//! [`PacketPool`]: storage::PacketPool
//! [`PacketBuffer`]: storage::PacketBuffer
//! [`Task`]: iface::Task
//! [`TaskQueue`]: iface::TaskQueue
//! [`Stack::poll`]: iface::Stack::poll

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("You must enable at most one of the following features: log, defmt");

#[cfg(feature = "alloc")]
extern crate alloc;

use core::fmt;

#[macro_use]
mod macros;
mod rand;

pub mod iface;
pub mod phy;
pub mod storage;
pub mod time;
pub mod wire;

pub use self::rand::Rand;

/// The error type for the routing control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A packet could not be parsed or emitted because a field was out of bounds
    /// for the underlying buffer.
    Truncated,
    /// An incoming packet could not be recognized and was dropped.
    /// E.g. a control message with an unknown type.
    Unrecognized,
    /// An incoming packet was recognized but contained invalid data.
    Malformed,
    /// An incoming packet had an incorrect checksum and was dropped.
    Checksum,
    /// An operation could not proceed because a fixed-size store was full.
    /// E.g. no free packet buffer, or a full task queue.
    Exhausted,
    /// An address of the wrong kind was supplied.
    Unaddressable,
    /// A routing control transmission is already in progress.
    Busy,
}

/// The result type for the routing control plane.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated packet"),
            Error::Unrecognized => write!(f, "unrecognized packet"),
            Error::Malformed => write!(f, "malformed packet"),
            Error::Checksum => write!(f, "checksum error"),
            Error::Exhausted => write!(f, "buffer space exhausted"),
            Error::Unaddressable => write!(f, "unaddressable destination"),
            Error::Busy => write!(f, "transmission in progress"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
