#![allow(dead_code)]

mod message;
mod node;

pub use message::Message;
pub use node::{Node, Position};

use smolrpl::iface::{NodeConfig, RplConfig};
use smolrpl::time::*;

/// A root in the middle with `nodes` children spread over each of `levels` rings, 100 units
/// apart.
pub fn topology(mut sim: NetworkSim, prefix: [u8; 8], nodes: usize, levels: usize) -> NetworkSim {
    let pos = Position((0., 0.));
    let root = sim.create_node(
        |node| node.set_dag_root(true).set_prefix(prefix),
        RplConfig::new(),
    );
    root.set_position(pos);

    let interval = (360. / 180. * std::f64::consts::PI / nodes as f64) as f32;
    for level in 0..levels {
        for node in 0..nodes {
            let node_p = (
                pos.x() + 100. * f32::cos(interval * node as f32) * (level + 1) as f32,
                pos.y() + 100. * f32::sin(interval * node as f32) * (level + 1) as f32,
            );
            let node = sim.create_node(|node| node, RplConfig::new());
            node.set_position(node_p.into());
        }
    }

    sim
}

#[derive(Debug)]
pub struct NetworkSim {
    pub nodes: Vec<Node>,
    pub messages: Vec<Message>,
    pub now: Instant,
    /// Deliveries lost to a full receive queue.
    pub missed: usize,
}

impl Default for NetworkSim {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkSim {
    /// Create a new network simulation.
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        Self {
            nodes: vec![],
            messages: vec![],
            now: Instant::ZERO,
            missed: 0,
        }
    }

    /// Create a new node.
    pub fn create_node(
        &mut self,
        node: impl FnOnce(NodeConfig) -> NodeConfig,
        rpl: RplConfig,
    ) -> &mut Node {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, node, rpl));
        &mut self.nodes[id]
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut Node {
        &mut self.nodes[id]
    }

    /// All frames that went over the air so far.
    pub fn msgs(&self) -> &[Message] {
        &self.messages
    }

    /// Frames sent by node `id`.
    pub fn msgs_from(&self, id: usize) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |msg| msg.from == id)
    }

    /// Run the simulation for `duration`, advancing at most `step` at a time.
    pub fn run(&mut self, step: Duration, duration: Duration) {
        let start = self.now;
        while self.now < start + duration {
            let new_step = self.on_tick(self.now, step);

            if new_step == Duration::ZERO {
                self.now += Duration::from_millis(1);
            } else {
                self.now += new_step;
            }
        }
    }

    /// Poll every node once, put what they sent on the air, and return how long the network
    /// can sleep.
    pub fn on_tick(&mut self, now: Instant, mut step: Duration) -> Duration {
        for node in self.nodes.iter_mut().filter(|node| node.enabled) {
            node.stack.poll(now, &mut node.radio);
        }

        let mut on_air = vec![];
        for node in self.nodes.iter_mut().filter(|node| node.enabled) {
            while let Some(frame) = node.radio.take_transmitted() {
                on_air.push((
                    node.position,
                    Message {
                        at: now,
                        from: node.id,
                        data: frame.to_vec(),
                    },
                ));
            }
        }

        // Every frame reaches every enabled node in range; the MAC sorts out what is meant
        // for it.
        for (position, msg) in &on_air {
            for node in self.nodes.iter_mut() {
                if !node.enabled || node.id == msg.from || !node.in_range(position) {
                    continue;
                }
                if node.radio.deliver(&msg.data).is_err() {
                    self.missed += 1;
                }
            }
        }
        self.messages
            .extend(on_air.into_iter().map(|(_, msg)| msg));

        for node in self.nodes.iter_mut().filter(|node| node.enabled) {
            if node.radio.pending_rx() > 0 {
                node.stack.poll(now, &mut node.radio);
            }
            if let Some(delay) = node.stack.poll_delay(now) {
                step = step.min(delay);
            }
        }

        step
    }
}
