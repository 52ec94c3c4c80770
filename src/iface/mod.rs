/*! Network interface logic.

The `iface` module deals with the *control plane* of a mote: the routing control engine, the
link-layer adapter that frames its messages, the store that knows the node's identity and
neighbors, and the cooperative scheduler that drives all of them.

The engine only talks to its collaborators through the [Topology] and [LinkLayer] traits,
bundled per call in a [Context]. [Stack] wires the in-crate implementations together.
*/

mod mac;
mod neighbor;
pub mod rpl;
mod scheduler;
mod stack;

use heapless::Vec;

use crate::storage::{Diagnostics, PacketBuffer, PacketPool};
use crate::time::Instant;
use crate::wire::{Address, AddressKind, LinkIdentity, RplDioRepr};
use crate::{Error, Result};

pub use self::mac::{Mac, MAC_QUEUE_LEN};
pub use self::neighbor::{Neighbor, NodeConfig, NodeTable, NEIGHBOR_TABLE_SIZE};
pub use self::rpl::{Rank, Rpl, RplConfig};
pub use self::scheduler::{Priority, Task, TaskQueue, TimerHandle, Timers, TASK_QUEUE_LEN};
pub use self::stack::Stack;

/// Extended addresses of neighbors, as returned by [Topology::neighbors_with_lower_rank].
pub type NeighborAddresses = Vec<[u8; 8], NEIGHBOR_TABLE_SIZE>;

/// The identity and neighbor store the routing engine consults.
pub trait Topology {
    /// Return the rank of this node, [Rank::UNDEFINED] if it has none yet.
    fn my_rank(&self) -> Rank;

    /// Query whether this node bridges to another network and must not announce itself.
    fn is_bridge(&self) -> bool;

    fn is_dag_root(&self) -> bool;

    /// Return the local address of the given kind, or [Address::Absent] if there is none.
    fn my_address(&self, kind: AddressKind) -> Address;

    fn is_my_address(&self, address: &Address) -> bool;

    /// Install part of the local identity, e.g. a routing prefix learned from a DIO.
    fn set_my_identity(&mut self, address: Address) -> Result<()>;

    /// Return the extended addresses of all neighbors whose rank is lower than `rank`.
    fn neighbors_with_lower_rank(&self, rank: Rank) -> NeighborAddresses;

    /// Account for a DIO received from `from`.
    fn receive_dio(&mut self, from: &Address, dio: &RplDioRepr, now: Instant);

    fn link_identity(&self) -> LinkIdentity;
}

/// A buffer the link layer refused, handed back to the caller with the reason.
#[derive(Debug)]
pub struct Rejected {
    pub buffer: PacketBuffer,
    pub error: Error,
}

/// The link layer below the routing engine.
pub trait LinkLayer {
    /// Take ownership of `buffer` for transmission.
    ///
    /// On success the buffer comes back later through the send-done path. On failure it is
    /// returned at once and the caller is responsible for freeing it.
    fn send(
        &mut self,
        buffer: PacketBuffer,
        diagnostics: &mut Diagnostics,
    ) -> core::result::Result<(), Rejected>;
}

/// Everything the routing engine needs from the rest of the node for the duration of one call.
pub struct Context<'c, 'p> {
    pub pool: &'c mut PacketPool<'p>,
    pub timers: &'c mut Timers,
    pub topology: &'c mut dyn Topology,
    pub link: &'c mut dyn LinkLayer,
    pub diagnostics: &'c mut Diagnostics,
}
