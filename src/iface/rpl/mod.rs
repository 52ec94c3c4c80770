//! The RPL control engine.
//!
//! The engine announces the node's rank with periodic DIOs, advertises the neighbors it can
//! reach the root through with periodic DAOs, and learns the DODAGID and the routing prefix
//! from the DIOs it hears.
//!
//! Both announcements run off a periodic timer. Only one expiry out of
//! [`RplConfig::set_send_divider`] actually sends, and the period is redrawn with fresh
//! jitter after every send attempt. A single busy latch covers DIO and DAO together: once a
//! message is accepted by the link layer, no other one is built until the link layer hands
//! the buffer back through [`Rpl::send_done`].

mod builder;
pub(crate) mod consts;
mod rank;

pub use self::builder::RplConfig;
pub use self::rank::Rank;

use super::{Context, Rejected};
use crate::rand::Rand;
use crate::storage::{Component, Diagnostic, PacketBuffer};
use crate::time::Duration;
use crate::wire::icmpv6::{self, PROTOCOL_ICMPV6};
use crate::wire::rpl::{
    DaoFlags, DioFlags, PrefixFlags, TransitFlags, DIO_LEN, PARENT_LEN,
};
use crate::wire::{
    Address, AddressKind, Icmpv6Message, Icmpv6Packet, RplControlMessage, RplDao,
    RplDaoOptions, RplDaoRepr, RplDio, RplDioOptions, RplDioRepr, RplPrefixOption,
    RplPrefixOptionRepr, RplTransit, RplTransitRepr,
};
use crate::{Error, Result};

use super::scheduler::{Priority, Task, TimerHandle, Timers};

#[derive(Debug)]
pub struct Rpl {
    config: RplConfig,
    rand: Rand,

    dio_timer: TimerHandle,
    dao_timer: TimerHandle,
    dio_period: Duration,
    dao_period: Duration,
    dio_wakeups: u8,
    dao_wakeups: u8,

    busy_sending: bool,

    dio: RplDioRepr,
    dao: RplDaoRepr,
    bootstrapped: bool,
    path_sequence: u8,
    daos_received: u32,
}

impl Rpl {
    /// Create the engine and start its two announcement timers.
    ///
    /// Returns `Err(Error::Exhausted)` if `timers` has no room for them.
    pub fn new(config: RplConfig, mut rand: Rand, timers: &mut Timers) -> Result<Rpl> {
        let dio_period = config.dio_period(&mut rand);
        let dao_period = config.dao_period(&mut rand);
        let dio_timer = timers.start_periodic(dio_period, Task::DioTimerFired, Priority::Rpl)?;
        let dao_timer = timers.start_periodic(dao_period, Task::DaoTimerFired, Priority::Rpl)?;

        let dio = RplDioRepr {
            reserved: 0,
            flags: 0,
            dtsn: consts::DEFAULT_DIO_DTSN,
            version_number: consts::DEFAULT_DIO_VERSION_NUMBER,
            rpl_instance_id: config.dio_instance_id,
            mop_prf: DioFlags::all(),
            dodag_id: config
                .initial_dodag_id
                .unwrap_or(consts::PLACEHOLDER_DIO_DODAG_ID),
            rank: consts::RANK_UNDEFINED,
            options: RplDioOptions::NoPrefix,
        };

        let dao = RplDaoRepr {
            rpl_instance_id: config.dao_instance_id,
            flags: DaoFlags::all(),
            reserved: 0,
            sequence: consts::DEFAULT_DAO_SEQUENCE,
            dodag_id: config
                .initial_dodag_id
                .unwrap_or(consts::PLACEHOLDER_DAO_DODAG_ID),
            options: RplDaoOptions::NoTransit,
            transit: None,
        };

        net_debug!(
            "rpl: DIO every {} ms, DAO every {} ms",
            dio_period.total_millis(),
            dao_period.total_millis()
        );

        Ok(Rpl {
            bootstrapped: config.initial_dodag_id.is_some(),
            config,
            rand,
            dio_timer,
            dao_timer,
            dio_period,
            dao_period,
            dio_wakeups: 0,
            dao_wakeups: 0,
            busy_sending: false,
            dio,
            dao,
            path_sequence: 0,
            daos_received: 0,
        })
    }

    /// Handle an expiry of the DIO timer.
    pub fn dio_timer_fired(&mut self, cx: &mut Context<'_, '_>) {
        self.dio_wakeups = (self.dio_wakeups + 1) % self.config.send_divider;
        if self.dio_wakeups != 0 {
            return;
        }

        if let Err(err) = self.send_dio(cx) {
            net_debug!("rpl: DIO not sent: {}", err);
        }

        self.dio_period = self.config.dio_period(&mut self.rand);
        cx.timers.set_period(self.dio_timer, self.dio_period);
    }

    /// Handle an expiry of the DAO timer.
    pub fn dao_timer_fired(&mut self, cx: &mut Context<'_, '_>) {
        self.dao_wakeups = (self.dao_wakeups + 1) % self.config.send_divider;
        if self.dao_wakeups != 0 {
            return;
        }

        if let Err(err) = self.send_dao(cx) {
            net_debug!("rpl: DAO not sent: {}", err);
        }

        self.dao_period = self.config.dao_period(&mut self.rand);
        cx.timers.set_period(self.dao_timer, self.dao_period);
    }

    /// Announce this node to the all-routers group.
    ///
    /// A bridge, or a node without a rank, stays silent and `Ok(())` is returned. A send
    /// already in progress yields `Err(Error::Busy)`.
    pub fn send_dio(&mut self, cx: &mut Context<'_, '_>) -> Result<()> {
        self.send_dio_to(Address::ALL_ROUTERS, cx)
    }

    /// Force a DIO towards the IPv6 address in `input`.
    ///
    /// `input` must be exactly 16 octets long; anything else is reported as
    /// [Diagnostic::InputBufferLength] and nothing is sent.
    pub fn trigger(&mut self, input: &[u8], cx: &mut Context<'_, '_>) -> Result<()> {
        let destination = match Address::from_bytes(AddressKind::Ipv6, input) {
            Ok(destination) => destination,
            Err(err) => {
                cx.diagnostics.push(Diagnostic::InputBufferLength {
                    length: input.len(),
                });
                return Err(err);
            }
        };

        net_trace!("rpl: DIO triggered towards {}", destination);
        self.send_dio_to(destination, cx)
    }

    fn send_dio_to(&mut self, destination: Address, cx: &mut Context<'_, '_>) -> Result<()> {
        if cx.topology.is_bridge() {
            return Ok(());
        }

        let rank = cx.topology.my_rank();
        if !rank.is_defined() {
            net_trace!("rpl: no rank yet, not sending DIO");
            return Ok(());
        }

        if self.busy_sending {
            return Err(Error::Busy);
        }

        let mut buffer = allocate(cx)?;
        buffer.l3_dest_or_source = destination;
        buffer.l4_protocol = PROTOCOL_ICMPV6;
        buffer.l4_type = Icmpv6Message::RplControl.into();

        let prefix = cx.topology.my_address(AddressKind::Prefix);
        if let Err(err) = self.build_dio(&mut buffer, rank, prefix) {
            cx.pool.free(buffer);
            return Err(err);
        }

        net_trace!("rpl: sending DIO rank={} to {}", rank, destination);
        self.hand_off(buffer, cx)
    }

    fn build_dio(&mut self, buffer: &mut PacketBuffer, rank: Rank, prefix: Address) -> Result<()> {
        self.dio.options = match prefix {
            Address::Prefix(prefix) => {
                let option = RplPrefixOptionRepr {
                    option_length: consts::PREFIX_OPTION_LENGTH,
                    prefix_length: consts::PREFIX_LENGTH,
                    flags: PrefixFlags::all(),
                    route_lifetime: self.config.prefix_lifetime,
                    prefix,
                };
                let header = buffer.reserve_header(option.buffer_len())?;
                option.emit(&mut RplPrefixOption::new_unchecked(header));
                RplDioOptions::Prefix
            }
            _ => RplDioOptions::NoPrefix,
        };

        self.dio.rank = rank.raw_value();
        let header = buffer.reserve_header(self.dio.buffer_len())?;
        self.dio.emit(&mut RplDio::new_unchecked(header));

        emit_control_header(buffer, RplControlMessage::DodagInformationObject)
    }

    /// Advertise the neighbors with a lower rank than this node towards the DODAG root.
    ///
    /// Returns `Err(Error::Busy)` if a send is already in progress.
    pub fn send_dao(&mut self, cx: &mut Context<'_, '_>) -> Result<()> {
        if self.busy_sending {
            return Err(Error::Busy);
        }

        let mut buffer = allocate(cx)?;
        buffer.l3_dest_or_source = Address::Ipv6(self.dao.dodag_id);
        buffer.l4_protocol = PROTOCOL_ICMPV6;
        buffer.l4_type = Icmpv6Message::RplControl.into();

        let parents = cx.topology.neighbors_with_lower_rank(cx.topology.my_rank());
        if let Err(err) = self.build_dao(&mut buffer, &parents) {
            cx.pool.free(buffer);
            return Err(err);
        }

        net_trace!(
            "rpl: sending DAO seq={} with {} parents",
            self.dao.sequence.wrapping_sub(1),
            parents.len().min(consts::MAX_DAO_PARENTS)
        );
        self.hand_off(buffer, cx)
    }

    fn build_dao(&mut self, buffer: &mut PacketBuffer, parents: &[[u8; 8]]) -> Result<()> {
        let count = parents.len().min(consts::MAX_DAO_PARENTS);

        // Prepended back to front so the parents read in table order on the wire.
        for parent in parents[..count].iter().rev() {
            buffer.reserve_header(PARENT_LEN)?.copy_from_slice(parent);
        }

        self.dao.transit = None;
        self.dao.options = RplDaoOptions::NoTransit;
        if count > 0 {
            let transit = RplTransitRepr {
                count: count as u8,
                flags: TransitFlags::E,
                path_control: consts::TRANSIT_PATH_CONTROL,
                path_sequence: self.path_sequence,
                path_lifetime: self.config.path_lifetime,
            };
            let header = buffer.reserve_header(transit.buffer_len())?;
            transit.emit(&mut RplTransit::new_unchecked(header));
            self.dao.transit = Some(transit);
            self.dao.options = RplDaoOptions::Transit;
        }

        let header = buffer.reserve_header(self.dao.buffer_len())?;
        self.dao.emit(&mut RplDao::new_unchecked(header));
        emit_control_header(buffer, RplControlMessage::DestinationAdvertisementObject)?;

        if self.dao.transit.is_some() {
            self.path_sequence = self.path_sequence.wrapping_add(1);
        }
        self.dao.sequence = self.dao.sequence.wrapping_add(1);
        Ok(())
    }

    /// Pass a built message to the link layer. The latch stays up until the buffer comes
    /// back through [send_done](#method.send_done).
    fn hand_off(&mut self, buffer: PacketBuffer, cx: &mut Context<'_, '_>) -> Result<()> {
        match cx.link.send(buffer, cx.diagnostics) {
            Ok(()) => {
                self.busy_sending = true;
                Ok(())
            }
            Err(Rejected { buffer, error }) => {
                cx.pool.free(buffer);
                Err(error)
            }
        }
    }

    /// Process an incoming RPL control message, starting at its control header.
    ///
    /// The buffer is always returned to the pool.
    pub fn receive(&mut self, mut buffer: PacketBuffer, cx: &mut Context<'_, '_>) -> Result<()> {
        buffer.set_owner(Component::Rpl);
        let result = self.process(&mut buffer, cx);
        cx.pool.free(buffer);
        result
    }

    fn process(&mut self, buffer: &mut PacketBuffer, cx: &mut Context<'_, '_>) -> Result<()> {
        let code = {
            let packet = Icmpv6Packet::new_checked(buffer.payload())?;
            if packet.msg_type() != Icmpv6Message::RplControl {
                return Err(Error::Unrecognized);
            }
            if !packet.verify_checksum() {
                cx.diagnostics.push(Diagnostic::ChecksumMismatch);
                return Err(Error::Checksum);
            }
            RplControlMessage::from(packet.msg_code())
        };
        buffer.toss_header(icmpv6::HEADER_LEN)?;

        match code {
            RplControlMessage::DodagInformationObject => self.process_dio(buffer, cx),
            RplControlMessage::DestinationAdvertisementObject => self.process_dao(buffer),
            code => {
                net_trace!("rpl: ignoring {}", code);
                Ok(())
            }
        }
    }

    fn process_dio(&mut self, buffer: &mut PacketBuffer, cx: &mut Context<'_, '_>) -> Result<()> {
        let dio = RplDioRepr::parse(&RplDio::new_checked(buffer.payload())?)?;
        net_trace!(
            "rpl: DIO from {} rank={}",
            buffer.l2_previous_hop,
            Rank::new(dio.rank)
        );

        cx.topology
            .receive_dio(&buffer.l2_previous_hop, &dio, cx.timers.now());

        self.dio.dodag_id = dio.dodag_id;
        self.dao.dodag_id = dio.dodag_id;
        self.bootstrapped = true;

        let prefix_known = cx.topology.my_address(AddressKind::Prefix) != Address::Absent;
        if dio.options == RplDioOptions::Prefix && !prefix_known {
            buffer.toss_header(DIO_LEN)?;
            let option = RplPrefixOptionRepr::parse(&RplPrefixOption::new_checked(
                buffer.payload(),
            )?)?;
            net_debug!("rpl: learned prefix {}", Address::Prefix(option.prefix));
            cx.topology.set_my_identity(Address::Prefix(option.prefix))?;
        }

        Ok(())
    }

    fn process_dao(&mut self, buffer: &mut PacketBuffer) -> Result<()> {
        let dao = RplDaoRepr::parse(&RplDao::new_checked(buffer.payload())?)?;
        self.daos_received = self.daos_received.wrapping_add(1);
        net_debug!(
            "rpl: DAO seq={} from {}, {} received",
            dao.sequence,
            buffer.l2_previous_hop,
            self.daos_received
        );
        Ok(())
    }

    /// Take back a buffer the link layer is done with.
    pub fn send_done(
        &mut self,
        mut buffer: PacketBuffer,
        result: Result<()>,
        cx: &mut Context<'_, '_>,
    ) {
        buffer.set_owner(Component::Rpl);
        if buffer.creator() != Component::Rpl {
            cx.diagnostics.push(Diagnostic::UnexpectedSendDone {
                creator: buffer.creator(),
            });
        }
        if let Err(err) = result {
            net_debug!("rpl: transmission failed: {}", err);
        }
        cx.pool.free(buffer);
        self.busy_sending = false;
    }

    /// Return the current DIO timer period.
    pub fn dio_period(&self) -> Duration {
        self.dio_period
    }

    /// Return the current DAO timer period.
    pub fn dao_period(&self) -> Duration {
        self.dao_period
    }

    /// Return the DODAGID this node announces.
    pub fn dodag_id(&self) -> [u8; 16] {
        self.dio.dodag_id
    }

    /// Query whether a DODAGID has been adopted.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn is_busy(&self) -> bool {
        self.busy_sending
    }

    /// Return the number of well-formed DAOs received.
    pub fn daos_received(&self) -> u32 {
        self.daos_received
    }

    /// Return the sequence number the next DAO will carry.
    pub fn dao_sequence(&self) -> u8 {
        self.dao.sequence
    }

    /// Return the path sequence the next transit option will carry.
    pub fn path_sequence(&self) -> u8 {
        self.path_sequence
    }
}

fn allocate(cx: &mut Context<'_, '_>) -> Result<PacketBuffer> {
    cx.pool.allocate(Component::Rpl).map_err(|err| {
        cx.diagnostics.push(Diagnostic::NoFreePacketBuffer {
            component: Component::Rpl,
        });
        err
    })
}

/// Prepend the ICMPv6 header of a control message and fill in its checksum. The message body
/// must already be in place.
fn emit_control_header(buffer: &mut PacketBuffer, code: RplControlMessage) -> Result<()> {
    buffer.reserve_header(icmpv6::HEADER_LEN)?;
    let mut packet = Icmpv6Packet::new_unchecked(buffer.payload_mut());
    packet.set_msg_type(Icmpv6Message::RplControl);
    packet.set_msg_code(code.into());
    packet.fill_checksum();
    Ok(())
}
