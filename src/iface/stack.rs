use super::mac::Mac;
use super::neighbor::NodeTable;
use super::rpl::{Rpl, RplConfig};
use super::scheduler::{Task, TaskQueue, Timers};
use super::{Context, Topology};
use crate::phy::Radio;
use crate::rand::Rand;
use crate::storage::{Diagnostics, PacketBuffer, PacketPool};
use crate::time::{Duration, Instant};
use crate::wire::{Address, AddressKind, Icmpv6Message};
use crate::Result;

/// A mote's control plane.
///
/// The stack owns every piece of per-node state: the packet pool, the timers and the task
/// queue they feed, the link layer, the routing engine and the identity and neighbor store.
/// Nothing runs on its own; [poll] does all the work.
///
/// [poll]: #method.poll
#[derive(Debug)]
pub struct Stack<'a> {
    pool: PacketPool<'a>,
    timers: Timers,
    tasks: TaskQueue,
    mac: Mac,
    rpl: Rpl,
    table: NodeTable<'a>,
    diagnostics: Diagnostics,
}

impl<'a> Stack<'a> {
    /// Create a stack.
    ///
    /// A DODAG root configured without a DODAGID announces its own IPv6 address as the
    /// DODAGID. The random source is seeded from the extended address.
    pub fn new(
        table: NodeTable<'a>,
        pool: PacketPool<'a>,
        mut config: RplConfig,
        timestamp: Instant,
    ) -> Result<Stack<'a>> {
        let identity = table.link_identity();

        if table.is_dag_root() && config.initial_dodag_id().is_none() {
            if let Address::Ipv6(dodag_id) = table.my_address(AddressKind::Ipv6) {
                config = config.set_initial_dodag_id(dodag_id);
            }
        }

        let mut timers = Timers::new(timestamp);
        let rpl = Rpl::new(config, Rand::from_eui64(identity.extended), &mut timers)?;

        Ok(Stack {
            pool,
            timers,
            tasks: TaskQueue::new(),
            mac: Mac::new(identity),
            rpl,
            table,
            diagnostics: Diagnostics::new(),
        })
    }

    pub fn rpl(&self) -> &Rpl {
        &self.rpl
    }

    pub fn table(&self) -> &NodeTable<'a> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut NodeTable<'a> {
        &mut self.table
    }

    pub fn pool(&self) -> &PacketPool<'a> {
        &self.pool
    }

    pub fn mac_mut(&mut self) -> &mut Mac {
        &mut self.mac
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Force a DIO towards the 16-octet IPv6 address in `input`.
    pub fn trigger(&mut self, input: &[u8]) -> Result<()> {
        let mut cx = Context {
            pool: &mut self.pool,
            timers: &mut self.timers,
            topology: &mut self.table,
            link: &mut self.mac,
            diagnostics: &mut self.diagnostics,
        };
        self.rpl.trigger(input, &mut cx)
    }

    /// Transmit and receive frames, and run due timers.
    ///
    /// Received frames are processed first, then expired timers are turned into tasks and
    /// the task queue is drained. Frames queued by a task are handed to the radio before the
    /// next task runs, so a send completes before the next one is attempted.
    ///
    /// Returns `true` if anything was received, run or transmitted.
    pub fn poll<R>(&mut self, timestamp: Instant, radio: &mut R) -> bool
    where
        R: for<'r> Radio<'r>,
    {
        self.mac.set_identity(self.table.link_identity());

        let mut readiness_may_have_changed = self.ingress(timestamp, radio);

        self.timers
            .poll(timestamp, &mut self.tasks, &mut self.diagnostics);
        while let Some(task) = self.tasks.pop() {
            self.run(task);
            self.egress(timestamp, radio);
            readiness_may_have_changed = true;
        }

        readiness_may_have_changed |= self.egress(timestamp, radio);
        readiness_may_have_changed
    }

    /// Return a _soft deadline_ for calling [poll] the next time.
    ///
    /// [poll]: #method.poll
    pub fn poll_at(&self) -> Option<Instant> {
        if self.mac.has_pending() {
            return Some(self.timers.now());
        }
        self.timers.poll_at()
    }

    /// Return an _advisory wait time_ for calling [poll] the next time.
    ///
    /// [poll]: #method.poll
    pub fn poll_delay(&self, timestamp: Instant) -> Option<Duration> {
        match self.poll_at() {
            Some(poll_at) if timestamp < poll_at => Some(poll_at - timestamp),
            Some(_) => Some(Duration::ZERO),
            None => None,
        }
    }

    fn run(&mut self, task: Task) {
        let mut cx = Context {
            pool: &mut self.pool,
            timers: &mut self.timers,
            topology: &mut self.table,
            link: &mut self.mac,
            diagnostics: &mut self.diagnostics,
        };

        match task {
            Task::DioTimerFired => self.rpl.dio_timer_fired(&mut cx),
            Task::DaoTimerFired => self.rpl.dao_timer_fired(&mut cx),
        }
    }

    fn ingress<R>(&mut self, timestamp: Instant, radio: &mut R) -> bool
    where
        R: for<'r> Radio<'r>,
    {
        let mut processed_any = false;

        while let Some(token) = radio.receive() {
            processed_any = true;
            let received =
                self.mac
                    .receive(token, timestamp, &mut self.pool, &mut self.diagnostics);
            if let Some(buffer) = received {
                self.process(buffer);
            }
        }

        processed_any
    }

    /// Hand a MAC payload to the layer it is meant for.
    fn process(&mut self, buffer: PacketBuffer) {
        let rpl_control: u8 = Icmpv6Message::RplControl.into();
        if buffer.payload().first() != Some(&rpl_control) {
            net_trace!("stack: no handler for payload, dropping");
            self.pool.free(buffer);
            return;
        }

        let mut cx = Context {
            pool: &mut self.pool,
            timers: &mut self.timers,
            topology: &mut self.table,
            link: &mut self.mac,
            diagnostics: &mut self.diagnostics,
        };
        if let Err(err) = self.rpl.receive(buffer, &mut cx) {
            net_debug!("stack: control message dropped: {}", err);
        }
    }

    fn egress<R>(&mut self, timestamp: Instant, radio: &mut R) -> bool
    where
        R: for<'r> Radio<'r>,
    {
        let mut emitted_any = false;

        while self.mac.has_pending() {
            let Some(token) = radio.transmit() else {
                break;
            };
            let Some((buffer, result)) = self.mac.dispatch(token, timestamp) else {
                break;
            };
            emitted_any = true;

            let mut cx = Context {
                pool: &mut self.pool,
                timers: &mut self.timers,
                topology: &mut self.table,
                link: &mut self.mac,
                diagnostics: &mut self.diagnostics,
            };
            self.rpl.send_done(buffer, result, &mut cx);
        }

        emitted_any
    }
}

#[cfg(all(test, feature = "alloc"))]
mod test {
    use std::collections::BTreeMap;

    use super::*;
    use crate::iface::NodeConfig;
    use crate::phy::Loopback;
    use crate::wire::{Icmpv6Packet, RplDio, RplDioRepr};

    const ROOT: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x01];

    fn stack(node: NodeConfig) -> Stack<'static> {
        let slots: Vec<Option<PacketBuffer>> = (0..4).map(|_| None).collect();
        Stack::new(
            NodeTable::new(node, BTreeMap::new()),
            PacketPool::new(slots),
            RplConfig::new(),
            Instant::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn root_announces_itself() {
        let mut root = stack(NodeConfig::new(ROOT).set_dag_root(true));
        let mut radio = Loopback::new();
        assert!(root.rpl().is_bootstrapped());

        let mut now = Instant::ZERO;
        while radio.pending_rx() == 0 {
            let deadline = root.poll_at().unwrap();
            assert!(deadline >= now);
            now = deadline;
            root.poll(now, &mut radio);
            radio.loop_back();
            assert!(now < Instant::from_secs(20), "no DIO within 20 s");
        }

        let frame = radio.take_transmitted();
        assert!(frame.is_none());
        assert_eq!(root.pool().in_use(), 0);

        // hear our own DIO: the root keeps its own DODAGID
        root.poll(now, &mut radio);
        assert_eq!(&root.rpl().dodag_id()[..2], &[0xfe, 0x80]);
        assert_eq!(&root.rpl().dodag_id()[8..], &ROOT);
    }

    #[test]
    fn frame_on_air_is_a_dio() {
        let mut root = stack(NodeConfig::new(ROOT).set_dag_root(true));
        let mut radio = Loopback::new();
        let mut cx = Context {
            pool: &mut root.pool,
            timers: &mut root.timers,
            topology: &mut root.table,
            link: &mut root.mac,
            diagnostics: &mut root.diagnostics,
        };
        root.rpl.send_dio(&mut cx).unwrap();
        assert!(root.poll(Instant::ZERO, &mut radio));
        assert_eq!(root.pool().in_use(), 0);

        let frame = radio.take_transmitted().unwrap();
        // short header, then the control message, then the FCS
        let message = &frame[9..frame.len() - 2];
        let packet = Icmpv6Packet::new_checked(message).unwrap();
        assert!(packet.verify_checksum());
        let dio = RplDioRepr::parse(&RplDio::new_checked(packet.payload()).unwrap()).unwrap();
        assert_eq!(dio.rank, 0x0100);
        assert_eq!(&dio.dodag_id[8..], &ROOT);
    }

    #[test]
    fn dio_and_dao_due_together_both_go_out() {
        let slots: Vec<Option<PacketBuffer>> = (0..4).map(|_| None).collect();
        let mut root = Stack::new(
            NodeTable::new(NodeConfig::new(ROOT).set_dag_root(true), BTreeMap::new()),
            PacketPool::new(slots),
            RplConfig::new().set_send_divider(1),
            Instant::ZERO,
        )
        .unwrap();
        let mut radio = Loopback::new();

        // past both the longest DIO and the longest DAO period
        assert!(root.poll(Instant::from_millis(2300), &mut radio));
        assert!(!root.rpl().is_busy());
        assert_eq!(root.pool().in_use(), 0);

        let mut codes = Vec::new();
        while let Some(frame) = radio.take_transmitted() {
            codes.push(frame[9 + 1]);
        }
        codes.sort();
        assert_eq!(codes, vec![0x01, 0x02]);
    }

    #[test]
    fn trigger_sends_towards_destination() {
        let mut root = stack(NodeConfig::new(ROOT).set_dag_root(true));
        let mut radio = Loopback::new();

        assert!(root.trigger(&[0u8; 4]).is_err());
        let mut destination = [0u8; 16];
        destination[..2].copy_from_slice(&[0xfe, 0x80]);
        destination[8..].copy_from_slice(&[0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x00, 0x07]);
        root.trigger(&destination).unwrap();
        assert_eq!(root.poll_delay(Instant::ZERO), Some(Duration::ZERO));
        root.poll(Instant::ZERO, &mut radio);

        let frame = radio.take_transmitted().unwrap();
        // unicast to ..:0007
        assert_eq!(&frame[..7], &[0x61, 0x88, 0x00, 0xfe, 0xca, 0x07, 0x00]);
    }

    #[test]
    fn unknown_payload_is_dropped() {
        let mut node = stack(NodeConfig::new(ROOT));
        let mut radio = Loopback::new();
        let mut frame = heapless::Vec::<u8, 16>::from_slice(&[
            0x41, 0x88, 0x00, 0xfe, 0xca, 0xff, 0xff, 0x02, 0x00, 0x80, 0x00,
        ])
        .unwrap();
        let crc = crate::wire::ieee802154::calculate_crc(&frame);
        frame.extend_from_slice(&crc.to_le_bytes()).unwrap();
        radio.deliver(&frame).unwrap();

        assert!(node.poll(Instant::ZERO, &mut radio));
        assert_eq!(node.pool().in_use(), 0);
        assert!(!node.rpl().is_bootstrapped());
    }
}
