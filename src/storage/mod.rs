//! Specialized containers.
//!
//! The `storage` module provides the packet pool shared by every layer and the record of
//! non-fatal diagnostics. Both work on pre-allocated memory, without the `std` and `alloc`
//! crates being available.

mod diagnostics;
mod packet_pool;

pub use self::diagnostics::{Diagnostic, Diagnostics, DIAGNOSTICS_CAPACITY};
pub use self::packet_pool::{Component, PacketBuffer, PacketPool, PACKET_CAPACITY};
