use heapless::Deque;

use super::{LinkLayer, Rejected};
use crate::phy;
use crate::storage::{Component, Diagnostic, Diagnostics, PacketBuffer, PacketPool};
use crate::time::Instant;
use crate::wire::ieee802154::{self, FrameType, LinkIdentity};
use crate::wire::Address;
use crate::{Error, Result};

/// Number of frames the link layer holds while they wait for the radio.
pub const MAC_QUEUE_LEN: usize = 4;

/// The link-layer adapter between the routing engine and the radio.
///
/// Outgoing buffers get their MAC header prepended and wait in a queue until the radio has a
/// transmit token for them. Once sent, [dispatch] hands them back together with the outcome,
/// for the send-done path of their creator.
///
/// [dispatch]: #method.dispatch
#[derive(Debug)]
pub struct Mac {
    identity: LinkIdentity,
    sequence_number: u8,
    security_enabled: bool,
    queue: Deque<PacketBuffer, MAC_QUEUE_LEN>,
}

impl Mac {
    pub fn new(identity: LinkIdentity) -> Mac {
        Mac {
            identity,
            sequence_number: 0,
            security_enabled: false,
            queue: Deque::new(),
        }
    }

    /// Follow a change of the local identity.
    pub fn set_identity(&mut self, identity: LinkIdentity) {
        self.identity = identity;
    }

    /// Mark outgoing frames as secured and append the auxiliary security header.
    pub fn set_security_enabled(&mut self, enabled: bool) {
        self.security_enabled = enabled;
    }

    /// Return the data sequence number the next frame will carry.
    pub fn sequence_number(&self) -> u8 {
        self.sequence_number
    }

    /// Query whether a frame is waiting for the radio.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Send the oldest queued frame through `token`.
    ///
    /// Returns the buffer and the outcome, or `None` if nothing was queued.
    pub fn dispatch<T: phy::TxToken>(
        &mut self,
        token: T,
        timestamp: Instant,
    ) -> Option<(PacketBuffer, Result<()>)> {
        let buffer = self.queue.pop_front()?;
        let result = token.consume(timestamp, buffer.len(), |frame| {
            frame.copy_from_slice(buffer.payload());
            Ok(())
        });
        match result {
            Ok(()) => net_trace!("mac: sent {} octets to {}", buffer.len(), buffer.l2_next_hop),
            Err(err) => net_debug!("mac: radio refused frame: {}", err),
        }
        Some((buffer, result))
    }

    /// Receive one frame from `token`.
    ///
    /// Frames that are not well-formed data frames for this node or the broadcast address are
    /// dropped. An accepted frame comes back in a buffer that starts at the MAC payload, with
    /// `l2_previous_hop` set to the sender.
    pub fn receive<T: phy::RxToken>(
        &mut self,
        token: T,
        timestamp: Instant,
        pool: &mut PacketPool<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Option<PacketBuffer> {
        let mut buffer = match pool.allocate(Component::Mac) {
            Ok(buffer) => buffer,
            Err(_) => {
                diagnostics.push(Diagnostic::NoFreePacketBuffer {
                    component: Component::Mac,
                });
                return None;
            }
        };

        match self.accept(&mut buffer, token, timestamp, diagnostics) {
            Ok(()) => Some(buffer),
            Err(err) => {
                net_trace!("mac: dropping frame: {}", err);
                pool.free(buffer);
                None
            }
        }
    }

    fn accept<T: phy::RxToken>(
        &self,
        buffer: &mut PacketBuffer,
        token: T,
        timestamp: Instant,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        token.consume(timestamp, |frame| buffer.load(frame))?;

        let header =
            ieee802154::retrieve_header(buffer.payload(), &self.identity, diagnostics).check()?;
        net_trace!("mac: received {}", header);

        if header.frame_type != FrameType::Data {
            return Err(Error::Unrecognized);
        }
        if header.pan_id != self.identity.pan_id && header.pan_id != ieee802154::Pan::BROADCAST {
            return Err(Error::Unaddressable);
        }
        if !header.dst.is_broadcast() && !self.identity.is_my_address(&header.dst) {
            return Err(Error::Unaddressable);
        }

        buffer.toss_header(header.header_length)?;
        buffer.l2_previous_hop = header.src;
        Ok(())
    }
}

/// Choose the link-layer next hop of an outgoing buffer.
fn next_hop(buffer: &PacketBuffer) -> Option<Address> {
    if buffer.l2_next_hop != Address::Absent {
        return Some(buffer.l2_next_hop);
    }

    match buffer.l3_dest_or_source {
        address @ Address::Ipv6(_) if address.is_broadcast_or_multicast() => {
            Some(Address::BROADCAST)
        }
        Address::Ipv6(ipv6) => {
            let mut extended = [0u8; 8];
            extended.copy_from_slice(&ipv6[8..]);
            Some(Address::Extended(extended))
        }
        address @ (Address::Short(_) | Address::Extended(_)) => Some(address),
        _ => None,
    }
}

impl LinkLayer for Mac {
    fn send(
        &mut self,
        mut buffer: PacketBuffer,
        diagnostics: &mut Diagnostics,
    ) -> core::result::Result<(), Rejected> {
        if self.queue.is_full() {
            return Err(Rejected {
                buffer,
                error: Error::Exhausted,
            });
        }

        let Some(next_hop) = next_hop(&buffer) else {
            diagnostics.push(Diagnostic::WrongAddressType {
                kind: buffer.l3_dest_or_source.kind(),
                position: 1,
            });
            return Err(Rejected {
                buffer,
                error: Error::Unaddressable,
            });
        };

        if let Err(error) = ieee802154::prepend_header(
            &mut buffer,
            FrameType::Data,
            self.security_enabled,
            self.sequence_number,
            &next_hop,
            &self.identity,
        ) {
            if error == Error::Unaddressable {
                diagnostics.push(Diagnostic::WrongAddressType {
                    kind: next_hop.kind(),
                    position: 1,
                });
            }
            return Err(Rejected { buffer, error });
        }

        self.sequence_number = self.sequence_number.wrapping_add(1);
        buffer.l2_next_hop = next_hop;
        buffer.set_owner(Component::Mac);
        self.queue.push_back(buffer).map_err(|buffer| Rejected {
            buffer,
            error: Error::Exhausted,
        })
    }
}
