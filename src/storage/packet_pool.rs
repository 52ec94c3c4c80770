use managed::ManagedSlice;

use crate::wire::Address;
use crate::{Error, Result};

/// Capacity in octets of every packet buffer.
pub const PACKET_CAPACITY: usize = 128;

/// The layer that created or currently holds a packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Component {
    /// Not held by anyone.
    Pool,
    /// The routing control engine.
    Rpl,
    /// The link layer adapter.
    Mac,
    /// Anything above the routing layer.
    Application,
}

/// A fixed-capacity packet buffer with a movable start-of-payload cursor.
///
/// The payload always ends at the end of the storage. Headers are prepended by moving the
/// cursor towards the front with [reserve_header], and removed by moving it back with
/// [toss_header].
///
/// A `PacketBuffer` is neither `Clone` nor `Copy`: holding the value is holding the buffer.
/// It leaves the pool through [PacketPool::allocate] and goes back through [PacketPool::free],
/// which consumes it.
///
/// [reserve_header]: #method.reserve_header
/// [toss_header]: #method.toss_header
#[derive(Debug)]
pub struct PacketBuffer {
    storage: [u8; PACKET_CAPACITY],
    head: usize,
    creator: Component,
    owner: Component,
    /// Link-layer next hop of an outgoing packet.
    pub l2_next_hop: Address,
    /// Link-layer source of an incoming packet.
    pub l2_previous_hop: Address,
    /// Network-layer destination (outgoing) or source (incoming).
    pub l3_dest_or_source: Address,
    /// Transport protocol number, e.g. 58 for ICMPv6.
    pub l4_protocol: u8,
    /// Transport message type, e.g. 155 for RPL control.
    pub l4_type: u8,
}

impl PacketBuffer {
    const fn new(creator: Component) -> PacketBuffer {
        PacketBuffer {
            storage: [0; PACKET_CAPACITY],
            head: PACKET_CAPACITY,
            creator,
            owner: creator,
            l2_next_hop: Address::Absent,
            l2_previous_hop: Address::Absent,
            l3_dest_or_source: Address::Absent,
            l4_protocol: 0,
            l4_type: 0,
        }
    }

    /// Return the component that allocated the buffer.
    pub fn creator(&self) -> Component {
        self.creator
    }

    /// Return the component currently holding the buffer.
    pub fn owner(&self) -> Component {
        self.owner
    }

    /// Record a layer crossing.
    pub fn set_owner(&mut self, owner: Component) {
        self.owner = owner;
    }

    /// Return the length of the payload, headers included.
    pub fn len(&self) -> usize {
        PACKET_CAPACITY - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the number of octets that can still be prepended.
    pub fn headroom(&self) -> usize {
        self.head
    }

    pub fn payload(&self) -> &[u8] {
        &self.storage[self.head..]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.head..]
    }

    /// Move the payload start `length` octets towards the front and return the newly exposed
    /// region.
    ///
    /// Returns `Err(Error::Exhausted)` and leaves the buffer untouched if there is not enough
    /// headroom.
    pub fn reserve_header(&mut self, length: usize) -> Result<&mut [u8]> {
        if length > self.head {
            return Err(Error::Exhausted);
        }
        self.head -= length;
        Ok(&mut self.storage[self.head..self.head + length])
    }

    /// Drop `length` octets from the front of the payload.
    pub fn toss_header(&mut self, length: usize) -> Result<()> {
        if length > self.len() {
            return Err(Error::Truncated);
        }
        self.head += length;
        Ok(())
    }

    /// Replace the payload with a copy of `data`.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > PACKET_CAPACITY {
            return Err(Error::Exhausted);
        }
        self.head = PACKET_CAPACITY - data.len();
        self.storage[self.head..].copy_from_slice(data);
        Ok(())
    }
}

/// A fixed set of packet buffers.
///
/// The pool is backed by a slice of slots, which may be borrowed or, with the `alloc`
/// feature, owned. A slot is `None` while its buffer is out of the pool.
#[derive(Debug)]
pub struct PacketPool<'a> {
    slots: ManagedSlice<'a, Option<PacketBuffer>>,
    in_use: usize,
}

impl<'a> PacketPool<'a> {
    /// An empty slot, usable as an array initializer: `[PacketPool::EMPTY_SLOT; 4]`.
    pub const EMPTY_SLOT: Option<PacketBuffer> = None;

    /// Create a pool with one buffer per slot of the given storage.
    pub fn new<S>(slots: S) -> PacketPool<'a>
    where
        S: Into<ManagedSlice<'a, Option<PacketBuffer>>>,
    {
        let mut slots = slots.into();
        for slot in slots.iter_mut() {
            *slot = Some(PacketBuffer::new(Component::Pool));
        }
        PacketPool { slots, in_use: 0 }
    }

    /// Take a buffer out of the pool on behalf of `creator`.
    ///
    /// The buffer comes back empty, owned by its creator, with all metadata cleared.
    pub fn allocate(&mut self, creator: Component) -> Result<PacketBuffer> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_some())
            .ok_or(Error::Exhausted)?;
        let mut buffer = slot.take().ok_or(Error::Exhausted)?;

        buffer.head = PACKET_CAPACITY;
        buffer.creator = creator;
        buffer.owner = creator;
        buffer.l2_next_hop = Address::Absent;
        buffer.l2_previous_hop = Address::Absent;
        buffer.l3_dest_or_source = Address::Absent;
        buffer.l4_protocol = 0;
        buffer.l4_type = 0;

        self.in_use += 1;
        net_trace!("pool: allocated for {:?}, {} in use", creator, self.in_use);
        Ok(buffer)
    }

    /// Return a buffer to the pool.
    pub fn free(&mut self, mut buffer: PacketBuffer) {
        buffer.owner = Component::Pool;
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(buffer);
                self.in_use -= 1;
            }
            None => net_debug!("pool: freed a buffer that does not belong here"),
        }
    }

    /// Number of buffers currently out of the pool.
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
