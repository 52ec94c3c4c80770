use std::collections::BTreeMap;
use std::fmt::Display;

use smolrpl::iface::{NodeConfig, NodeTable, RplConfig, Stack};
use smolrpl::phy::Loopback;
use smolrpl::storage::PacketPool;
use smolrpl::time::*;

/// Packet buffers each simulated node gets.
const POOL_SLOTS: usize = 6;

pub struct Node {
    pub id: usize,
    pub range: f32,
    pub position: Position,
    pub enabled: bool,
    pub extended: [u8; 8],
    pub radio: Loopback,
    pub stack: Stack<'static>,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node[{}] at {}", self.id, self.position)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("range", &self.range)
            .field("position", &self.position)
            .field("enabled", &self.enabled)
            .field("extended", &self.extended)
            .finish()
    }
}

impl Node {
    /// Create a node whose extended address ends in `id + 1`.
    pub fn new(id: usize, node: impl FnOnce(NodeConfig) -> NodeConfig, rpl: RplConfig) -> Self {
        let extended = Self::extended_address(id);
        let table = NodeTable::new(node(NodeConfig::new(extended)), BTreeMap::new());
        let pool = PacketPool::new((0..POOL_SLOTS).map(|_| None).collect::<Vec<_>>());
        let stack = Stack::new(table, pool, rpl, Instant::ZERO).unwrap();

        Self {
            id,
            range: 101.,
            position: Position::from((0., 0.)),
            enabled: true,
            extended,
            radio: Loopback::new(),
            stack,
        }
    }

    pub fn extended_address(id: usize) -> [u8; 8] {
        let mut extended = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x00];
        extended[6..].copy_from_slice(&(id as u16 + 1).to_be_bytes());
        extended
    }

    /// The address a neighbor knows this node by: its short address in an otherwise zeroed
    /// extended address.
    pub fn heard_as(&self) -> [u8; 8] {
        let mut heard = [0u8; 8];
        heard[6..].copy_from_slice(&self.extended[6..]);
        heard
    }

    /// Set the position of the node.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn in_range(&self, other: &Position) -> bool {
        self.position.distance(other) < self.range
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub struct Position(pub (f32, f32));

impl Position {
    pub fn distance(&self, other: &Self) -> f32 {
        ((other.0 .0 - self.0 .0).powf(2.0) + (other.0 .1 - self.0 .1).powf(2.0)).sqrt()
    }

    pub fn x(&self) -> f32 {
        self.0 .0
    }

    pub fn y(&self) -> f32 {
        self.0 .1
    }
}

impl From<(f32, f32)> for Position {
    fn from(pos: (f32, f32)) -> Self {
        Position(pos)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x(), self.y())
    }
}
