use managed::ManagedMap;

use super::{NeighborAddresses, Rank, Topology};
use crate::time::Instant;
use crate::wire::{Address, AddressKind, Ieee802154Pan, LinkIdentity, RplDioRepr};
use crate::{Error, Result};

/// Number of neighbors a [NodeTable] holds at most.
pub const NEIGHBOR_TABLE_SIZE: usize = 16;

/// PAN identifier used when none is configured.
pub const DEFAULT_PAN_ID: Ieee802154Pan = Ieee802154Pan(0xcafe);

/// What is known about a neighbor from its last DIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Neighbor {
    rank: Rank,
    dodag_id: [u8; 16],
    last_heard: Instant,
}

impl Neighbor {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn dodag_id(&self) -> [u8; 16] {
        self.dodag_id
    }

    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }
}

/// Identity and role of a node, used to build a [NodeTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    extended: [u8; 8],
    short: Option<[u8; 2]>,
    pan_id: Ieee802154Pan,
    prefix: Option<[u8; 8]>,
    bridge: bool,
    dag_root: bool,
    rank: Option<Rank>,
}

impl NodeConfig {
    /// Describe a node by its EUI-64.
    pub fn new(extended: [u8; 8]) -> Self {
        NodeConfig {
            extended,
            short: None,
            pan_id: DEFAULT_PAN_ID,
            prefix: None,
            bridge: false,
            dag_root: false,
            rank: None,
        }
    }

    pub fn set_pan_id(mut self, pan_id: Ieee802154Pan) -> Self {
        self.pan_id = pan_id;
        self
    }

    /// Use `short` on the air instead of the two low octets of the extended address.
    pub fn set_short(mut self, short: [u8; 2]) -> Self {
        self.short = Some(short);
        self
    }

    /// Start with a known routing prefix, as the DODAG root does.
    pub fn set_prefix(mut self, prefix: [u8; 8]) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn set_bridge(mut self, bridge: bool) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn set_dag_root(mut self, dag_root: bool) -> Self {
        self.dag_root = dag_root;
        self
    }

    /// Pin the rank instead of deriving it from the neighbors.
    pub fn set_rank(mut self, rank: Rank) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn is_dag_root(&self) -> bool {
        self.dag_root
    }
}

/// The in-crate identity and neighbor store.
///
/// Neighbors are keyed by extended address and kept in a map that may be borrowed or owned.
/// The table holds at most [NEIGHBOR_TABLE_SIZE] neighbors, or fewer if the borrowed storage
/// is smaller. When it is full, the neighbor heard from least recently is evicted.
///
/// # Examples
///
/// ```rust
/// use smolrpl::iface::{NodeConfig, NodeTable};
/// let mut storage = [None; 8];
/// let table = NodeTable::new(
///     NodeConfig::new([0x14, 0x15, 0x92, 0, 0, 0x0b, 0, 0x01]),
///     &mut storage[..],
/// );
/// ```
#[derive(Debug)]
pub struct NodeTable<'a> {
    identity: LinkIdentity,
    prefix: Option<[u8; 8]>,
    bridge: bool,
    dag_root: bool,
    fixed_rank: Option<Rank>,
    neighbors: ManagedMap<'a, [u8; 8], Neighbor>,
}

impl<'a> NodeTable<'a> {
    /// Create a table. The backing storage is cleared upon creation.
    pub fn new<T>(config: NodeConfig, storage: T) -> NodeTable<'a>
    where
        T: Into<ManagedMap<'a, [u8; 8], Neighbor>>,
    {
        let mut neighbors = storage.into();
        neighbors.clear();

        let mut identity = LinkIdentity::new(config.extended, config.pan_id);
        if let Some(short) = config.short {
            identity.short = short;
        }

        NodeTable {
            identity,
            prefix: config.prefix,
            bridge: config.bridge,
            dag_root: config.dag_root,
            fixed_rank: config.rank,
            neighbors,
        }
    }

    /// Return what is known about the neighbor with the given extended address.
    pub fn neighbor(&self, extended: &[u8; 8]) -> Option<&Neighbor> {
        self.neighbors.get(extended)
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Return the IPv6 address of this node: the routing prefix if one is known, link-local
    /// otherwise, followed by the extended address.
    fn ipv6(&self) -> [u8; 16] {
        let mut address = [0u8; 16];
        match self.prefix {
            Some(prefix) => address[..8].copy_from_slice(&prefix),
            None => address[..2].copy_from_slice(&[0xfe, 0x80]),
        }
        address[8..].copy_from_slice(&self.identity.extended);
        address
    }

    fn best_neighbor_rank(&self) -> Option<Rank> {
        self.neighbors
            .iter()
            .map(|(_, neighbor)| neighbor.rank)
            .filter(Rank::is_defined)
            .min()
    }

    fn fill(&mut self, extended: [u8; 8], neighbor: Neighbor) {
        if self.neighbors.get(&extended).is_none() && self.neighbors.len() >= NEIGHBOR_TABLE_SIZE
        {
            self.evict_stalest(&extended);
        }

        match self.neighbors.insert(extended, neighbor) {
            Ok(Some(old)) => {
                if old.rank != neighbor.rank {
                    net_trace!(
                        "neighbor: {} now {} (was {})",
                        Address::Extended(extended),
                        neighbor.rank,
                        old.rank
                    );
                }
            }
            Ok(None) => {
                net_trace!(
                    "neighbor: added {} {}",
                    Address::Extended(extended),
                    neighbor.rank
                );
            }
            Err((extended, neighbor)) => {
                if !self.evict_stalest(&extended) {
                    net_debug!("neighbor: no room for {}", Address::Extended(extended));
                    return;
                }
                if self.neighbors.insert(extended, neighbor).is_ok() {
                    net_trace!(
                        "neighbor: added {} {}",
                        Address::Extended(extended),
                        neighbor.rank
                    );
                }
            }
        }
    }

    /// Remove the neighbor heard from least recently to make room for `newcomer`.
    fn evict_stalest(&mut self, newcomer: &[u8; 8]) -> bool {
        let stalest = self
            .neighbors
            .iter()
            .min_by_key(|(_, neighbor)| neighbor.last_heard)
            .map(|(address, _)| *address);

        match stalest {
            Some(stalest) => {
                self.neighbors.remove(&stalest);
                net_trace!(
                    "neighbor: evicted {} for {}",
                    Address::Extended(stalest),
                    Address::Extended(*newcomer)
                );
                true
            }
            None => false,
        }
    }
}

impl<'a> Topology for NodeTable<'a> {
    fn my_rank(&self) -> Rank {
        if self.dag_root {
            return Rank::ROOT;
        }
        if let Some(rank) = self.fixed_rank {
            return rank;
        }
        self.best_neighbor_rank()
            .map_or(Rank::UNDEFINED, |rank| rank.child())
    }

    fn is_bridge(&self) -> bool {
        self.bridge
    }

    fn is_dag_root(&self) -> bool {
        self.dag_root
    }

    fn my_address(&self, kind: AddressKind) -> Address {
        match kind {
            AddressKind::Short => Address::Short(self.identity.short),
            AddressKind::Extended => Address::Extended(self.identity.extended),
            AddressKind::PanId => Address::PanId(self.identity.pan_id.0.to_be_bytes()),
            AddressKind::Prefix => self.prefix.map_or(Address::Absent, Address::Prefix),
            AddressKind::Ipv6 => Address::Ipv6(self.ipv6()),
            AddressKind::Absent => Address::Absent,
        }
    }

    fn is_my_address(&self, address: &Address) -> bool {
        match address {
            Address::Short(_) | Address::Extended(_) => self.identity.is_my_address(address),
            Address::Ipv6(ipv6) => *ipv6 == self.ipv6(),
            Address::Prefix(prefix) => self.prefix == Some(*prefix),
            Address::PanId(pan) => *pan == self.identity.pan_id.0.to_be_bytes(),
            Address::Absent => false,
        }
    }

    fn set_my_identity(&mut self, address: Address) -> Result<()> {
        match address {
            Address::Short(short) => self.identity.short = short,
            Address::Extended(extended) => self.identity.extended = extended,
            Address::PanId(pan) => self.identity.pan_id = Ieee802154Pan(u16::from_be_bytes(pan)),
            Address::Prefix(prefix) => self.prefix = Some(prefix),
            Address::Ipv6(_) | Address::Absent => return Err(Error::Unaddressable),
        }
        net_debug!("identity: set {}", address);
        Ok(())
    }

    fn neighbors_with_lower_rank(&self, rank: Rank) -> NeighborAddresses {
        let mut addresses = NeighborAddresses::new();
        for (address, neighbor) in self.neighbors.iter() {
            if neighbor.rank.is_defined() && neighbor.rank < rank && addresses.push(*address).is_err()
            {
                break;
            }
        }
        addresses
    }

    fn receive_dio(&mut self, from: &Address, dio: &RplDioRepr, now: Instant) {
        let Address::Extended(extended) = *from else {
            net_debug!("neighbor: DIO from {} ignored", from);
            return;
        };

        self.fill(
            extended,
            Neighbor {
                rank: Rank::new(dio.rank),
                dodag_id: dio.dodag_id,
                last_heard: now,
            },
        );
    }

    fn link_identity(&self) -> LinkIdentity {
        self.identity
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::rpl::DioFlags;
    use crate::wire::RplDioOptions;

    const ME: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x02];
    const A: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x0a];
    const B: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x0b];
    const C: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x0c];

    fn dio(rank: u16) -> RplDioRepr {
        RplDioRepr {
            reserved: 0,
            flags: 0,
            dtsn: 0x33,
            version_number: 0x11,
            rpl_instance_id: 0x22,
            mop_prf: DioFlags::all(),
            dodag_id: [0x42; 16],
            rank,
            options: RplDioOptions::NoPrefix,
        }
    }

    #[test]
    fn rank_follows_best_neighbor() {
        let mut storage = [None; 4];
        let mut table = NodeTable::new(NodeConfig::new(ME), &mut storage[..]);
        assert_eq!(table.my_rank(), Rank::UNDEFINED);

        table.receive_dio(&Address::Extended(A), &dio(0x0300), Instant::from_millis(1));
        assert_eq!(table.my_rank(), Rank::new(0x0400));

        table.receive_dio(&Address::Extended(B), &dio(0x0100), Instant::from_millis(2));
        assert_eq!(table.my_rank(), Rank::new(0x0200));

        // undefined neighbors do not count
        table.receive_dio(&Address::Extended(C), &dio(0xffff), Instant::from_millis(3));
        assert_eq!(table.my_rank(), Rank::new(0x0200));
        assert_eq!(table.neighbor_count(), 3);
        assert_eq!(table.neighbor(&B).map(Neighbor::rank), Some(Rank::ROOT));
    }

    #[test]
    fn root_and_fixed_rank() {
        let mut storage = [None; 2];
        let table = NodeTable::new(NodeConfig::new(ME).set_dag_root(true), &mut storage[..]);
        assert_eq!(table.my_rank(), Rank::ROOT);
        assert!(table.is_dag_root());

        let mut storage = [None; 2];
        let table = NodeTable::new(
            NodeConfig::new(ME).set_rank(Rank::new(0x0010)),
            &mut storage[..],
        );
        assert_eq!(table.my_rank(), Rank::new(0x0010));
    }

    #[test]
    fn lower_rank_neighbors() {
        let mut storage = [None; 4];
        let mut table = NodeTable::new(NodeConfig::new(ME), &mut storage[..]);
        table.receive_dio(&Address::Extended(A), &dio(0x0005), Instant::ZERO);
        table.receive_dio(&Address::Extended(B), &dio(0x0020), Instant::ZERO);
        table.receive_dio(&Address::Extended(C), &dio(0xffff), Instant::ZERO);

        let lower = table.neighbors_with_lower_rank(Rank::new(0x0010));
        assert_eq!(&lower[..], &[A]);
        assert!(table.neighbors_with_lower_rank(Rank::UNDEFINED).len() == 2);
    }

    #[test]
    fn full_table_evicts_stalest() {
        let mut storage = [None; 2];
        let mut table = NodeTable::new(NodeConfig::new(ME), &mut storage[..]);
        table.receive_dio(&Address::Extended(A), &dio(0x0100), Instant::from_millis(10));
        table.receive_dio(&Address::Extended(B), &dio(0x0100), Instant::from_millis(5));
        table.receive_dio(&Address::Extended(C), &dio(0x0200), Instant::from_millis(20));

        assert_eq!(table.neighbor_count(), 2);
        assert!(table.neighbor(&B).is_none());
        assert!(table.neighbor(&A).is_some());
        assert_eq!(
            table.neighbor(&C).map(Neighbor::last_heard),
            Some(Instant::from_millis(20))
        );
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn owned_table_is_capped() {
        let mut table = NodeTable::new(NodeConfig::new(ME), std::collections::BTreeMap::new());
        for id in 0..NEIGHBOR_TABLE_SIZE as u8 + 4 {
            let neighbor = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x01, id];
            table.receive_dio(
                &Address::Extended(neighbor),
                &dio(0x0100),
                Instant::from_millis(id as u64),
            );
        }

        assert_eq!(table.neighbor_count(), NEIGHBOR_TABLE_SIZE);
        // the four heard first are gone
        for id in 0..4u8 {
            assert!(table
                .neighbor(&[0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x01, id])
                .is_none());
        }
        assert_eq!(
            table.neighbors_with_lower_rank(Rank::UNDEFINED).len(),
            NEIGHBOR_TABLE_SIZE
        );

        // refreshing a known neighbor evicts nobody
        let known = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x01, 0x04];
        table.receive_dio(&Address::Extended(known), &dio(0x0200), Instant::from_millis(100));
        assert_eq!(table.neighbor_count(), NEIGHBOR_TABLE_SIZE);
        assert!(table.neighbor(&[0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x01, 0x05]).is_some());
    }

    #[test]
    fn dio_from_non_extended_is_ignored() {
        let mut storage = [None; 2];
        let mut table = NodeTable::new(NodeConfig::new(ME), &mut storage[..]);
        table.receive_dio(&Address::Short([0, 1]), &dio(0x0100), Instant::ZERO);
        assert_eq!(table.neighbor_count(), 0);
    }

    #[test]
    fn identity() {
        let mut storage = [None; 1];
        let mut table = NodeTable::new(NodeConfig::new(ME), &mut storage[..]);

        assert_eq!(table.my_address(AddressKind::Short), Address::Short([0x00, 0x02]));
        assert_eq!(table.my_address(AddressKind::PanId), Address::PanId([0xca, 0xfe]));
        assert_eq!(table.my_address(AddressKind::Prefix), Address::Absent);
        assert_eq!(
            table.my_address(AddressKind::Ipv6),
            Address::Ipv6([
                0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x02
            ])
        );

        table
            .set_my_identity(Address::Prefix([0xbb, 0xbb, 0, 0, 0, 0, 0, 0]))
            .unwrap();
        assert_eq!(
            table.my_address(AddressKind::Ipv6),
            Address::Ipv6([
                0xbb, 0xbb, 0, 0, 0, 0, 0, 0, 0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x02
            ])
        );
        assert!(table.is_my_address(&table.my_address(AddressKind::Ipv6)));
        assert!(table.is_my_address(&Address::Extended(ME)));
        assert!(table.is_my_address(&Address::Short([0x00, 0x02])));
        assert!(!table.is_my_address(&Address::Extended(A)));

        table.set_my_identity(Address::Short([0xab, 0xcd])).unwrap();
        table.set_my_identity(Address::PanId([0x12, 0x34])).unwrap();
        let identity = table.link_identity();
        assert_eq!(identity.short, [0xab, 0xcd]);
        assert_eq!(identity.pan_id, Ieee802154Pan(0x1234));
        assert_eq!(identity.extended, ME);

        assert_eq!(
            table.set_my_identity(Address::Ipv6([0; 16])),
            Err(Error::Unaddressable)
        );
    }

    #[test]
    fn short_override() {
        let mut storage = [None; 1];
        let table = NodeTable::new(
            NodeConfig::new(ME)
                .set_short([0x77, 0x88])
                .set_pan_id(Ieee802154Pan(0xbeef))
                .set_bridge(true),
            &mut storage[..],
        );
        assert_eq!(table.link_identity().short, [0x77, 0x88]);
        assert_eq!(table.link_identity().pan_id, Ieee802154Pan(0xbeef));
        assert!(table.is_bridge());
    }
}
