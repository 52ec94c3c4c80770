/*! IEEE 802.15.4 MAC header codec.

Nodes talk to each other with 16-bit short addresses on the air while every identity inside the
node is the 64-bit extended address. [prepend_header] writes a header in front of an outgoing
payload, always using short addressing. [retrieve_header] parses an incoming header into a
[Header] descriptor, resolving short addresses back into extended ones:

 - the local short address resolves to the local extended address;
 - the broadcast short address stays `Short(ff ff)`;
 - any other short address is spoofed into `Extended([0, 0, 0, 0, 0, 0, hi, lo])`.

Multi-octet header fields are little-endian on the wire.
*/

use core::fmt;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

use crate::storage::{Diagnostic, Diagnostics, PacketBuffer};
use crate::wire::Address;
use crate::{Error, Result};

enum_with_unknown! {
    /// IEEE 802.15.4 frame type.
    pub enum FrameType(u8) {
        Beacon = 0b000,
        Data = 0b001,
        Acknowledgement = 0b010,
        MacCommand = 0b011,
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameType::Beacon => write!(f, "Beacon"),
            FrameType::Data => write!(f, "Data"),
            FrameType::Acknowledgement => write!(f, "Ack"),
            FrameType::MacCommand => write!(f, "MAC command"),
            FrameType::Unknown(id) => write!(f, "0b{id:03b}"),
        }
    }
}

enum_with_unknown! {
    /// IEEE 802.15.4 addressing mode for destination and source addresses.
    pub enum AddressingMode(u8) {
        Absent = 0b00,
        Short = 0b10,
        Extended = 0b11,
    }
}

impl AddressingMode {
    /// Return the size in octets of the address.
    pub fn size(&self) -> usize {
        match self {
            AddressingMode::Short => 2,
            AddressingMode::Extended => 8,
            AddressingMode::Absent | AddressingMode::Unknown(_) => 0,
        }
    }
}

/// A IEEE 802.15.4 PAN.
#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pan(pub u16);

impl Pan {
    pub const BROADCAST: Self = Self(0xffff);

    /// Return the PAN ID as bytes, in wire order.
    pub fn as_bytes(&self) -> [u8; 2] {
        let mut pan = [0u8; 2];
        LittleEndian::write_u16(&mut pan, self.0);
        pan
    }
}

bitflags! {
    /// Flag bits of the first frame control octet. The low three bits carry the frame type.
    pub struct FrameControl: u8 {
        const SECURITY_ENABLED = 1 << 3;
        const FRAME_PENDING = 1 << 4;
        const ACK_REQUEST = 1 << 5;
        const PAN_ID_COMPRESSION = 1 << 6;
    }
}

const FRAME_TYPE_MASK: u8 = 0b111;
const DST_MODE_SHIFT: u8 = 2;
const SRC_MODE_SHIFT: u8 = 6;

/// Position tags used in [Diagnostic::UnsupportedAddressingMode].
const POSITION_DST: u8 = 1;
const POSITION_SRC: u8 = 2;

/// Length of the header [prepend_header] writes, without the auxiliary security header.
pub const SHORT_HEADER_LEN: usize = 9;
/// Length of the auxiliary security header [prepend_header] writes.
pub const AUX_SECURITY_HEADER_LEN: usize = 2;

/// Frame check sequence length.
pub const FCS_LEN: usize = 2;

/// Compute the 16-bit frame check sequence (CRC-16, reflected polynomial `0x8408`).
pub fn calculate_crc(buffer: &[u8]) -> u16 {
    buffer.iter().fold(0u16, |mut crc, byte| {
        crc ^= *byte as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0x8408
            } else {
                crc >> 1
            };
        }
        crc
    })
}

enum_with_unknown! {
    /// Auxiliary security header security level.
    pub enum SecurityLevel(u8) {
        None = 0,
        Mic32 = 1,
        Mic64 = 2,
        Mic128 = 3,
    }
}

enum_with_unknown! {
    /// How the key is identified in the auxiliary security header.
    pub enum KeyIdMode(u8) {
        Implicit = 0,
        Index = 1,
        Source4Index = 2,
        Source8Index = 3,
    }
}

/// The auxiliary security header as this node writes it: security control octet, then a
/// one-octet key index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuxSecurityHeader {
    pub security_level: SecurityLevel,
    pub key_id_mode: KeyIdMode,
    pub frame_counter_suppressed: bool,
    /// The frame counter size tag: 5 octets when set, 4 otherwise.
    pub frame_counter_5_octets: bool,
    pub key_index: u8,
}

impl AuxSecurityHeader {
    /// The fixed security policy of outgoing frames.
    pub const DEFAULT: AuxSecurityHeader = AuxSecurityHeader {
        security_level: SecurityLevel::Mic32,
        key_id_mode: KeyIdMode::Index,
        frame_counter_suppressed: true,
        frame_counter_5_octets: true,
        key_index: 0x07,
    };

    pub fn parse(data: &[u8; AUX_SECURITY_HEADER_LEN]) -> AuxSecurityHeader {
        let control = data[0];
        AuxSecurityHeader {
            security_level: SecurityLevel::from(control & 0b111),
            key_id_mode: KeyIdMode::from((control >> 3) & 0b11),
            frame_counter_suppressed: control & (1 << 5) != 0,
            frame_counter_5_octets: control & (1 << 6) != 0,
            key_index: data[1],
        }
    }

    pub fn emit(&self, data: &mut [u8]) {
        let mut control = u8::from(self.security_level) & 0b111;
        control |= (u8::from(self.key_id_mode) & 0b11) << 3;
        if self.frame_counter_suppressed {
            control |= 1 << 5;
        }
        if self.frame_counter_5_octets {
            control |= 1 << 6;
        }
        data[0] = control;
        data[1] = self.key_index;
    }
}

/// The local link-layer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkIdentity {
    pub short: [u8; 2],
    pub extended: [u8; 8],
    pub pan_id: Pan,
}

impl LinkIdentity {
    /// Derive the identity from an extended address; the short address is its two low octets.
    pub fn new(extended: [u8; 8], pan_id: Pan) -> LinkIdentity {
        LinkIdentity {
            short: [extended[6], extended[7]],
            extended,
            pan_id,
        }
    }

    pub fn is_my_address(&self, address: &Address) -> bool {
        match address {
            Address::Short(short) => *short == self.short,
            Address::Extended(extended) => *extended == self.extended,
            _ => false,
        }
    }
}

/// Descriptor of a parsed MAC header.
///
/// A fresh descriptor is produced on every parse. `header_length` is the number of octets
/// consumed so far, and the fields past the point where parsing stopped keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    pub valid: bool,
    pub header_length: usize,
    pub frame_type: FrameType,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_requested: bool,
    pub pan_id_compression: bool,
    pub sequence_number: u8,
    pub pan_id: Pan,
    pub dst: Address,
    pub src: Address,
    pub security: Option<AuxSecurityHeader>,
}

impl Header {
    const INVALID: Header = Header {
        valid: false,
        header_length: 0,
        frame_type: FrameType::Unknown(0xff),
        security_enabled: false,
        frame_pending: false,
        ack_requested: false,
        pan_id_compression: false,
        sequence_number: 0,
        pan_id: Pan(0),
        dst: Address::Absent,
        src: Address::Absent,
        security: None,
    };

    /// Return the descriptor if parsing ran to completion, `Err(Error::Truncated)` otherwise.
    pub fn check(self) -> Result<Header> {
        if self.valid {
            Ok(self)
        } else {
            Err(Error::Truncated)
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.valid {
            return write!(f, "802.15.4 invalid after {} octets", self.header_length);
        }
        write!(
            f,
            "802.15.4 {} seq={} pan={:#06x} dst={} src={}",
            self.frame_type, self.sequence_number, self.pan_id.0, self.dst, self.src
        )?;
        if self.security.is_some() {
            write!(f, " secured")?;
        }
        Ok(())
    }
}

/// Prepend a MAC header to the payload of `buffer`.
///
/// The source is always the local short address and the destination is either the broadcast
/// address (for broadcast and multicast next hops) or the low two octets of the next hop.
///
/// Returns `Err(Error::Unaddressable)` for a next hop that cannot be expressed as a short
/// address and `Err(Error::Exhausted)` if the buffer lacks headroom. The buffer is left
/// untouched in both cases.
pub fn prepend_header(
    buffer: &mut PacketBuffer,
    frame_type: FrameType,
    security_enabled: bool,
    sequence_number: u8,
    next_hop: &Address,
    identity: &LinkIdentity,
) -> Result<()> {
    let broadcast = next_hop.is_broadcast_or_multicast();
    let dst = if broadcast {
        [0xff; 2]
    } else {
        match next_hop {
            Address::Short(_) | Address::Extended(_) => {
                next_hop.low_short().ok_or(Error::Unaddressable)?
            }
            _ => return Err(Error::Unaddressable),
        }
    };

    let length = SHORT_HEADER_LEN + if security_enabled { AUX_SECURITY_HEADER_LEN } else { 0 };
    if buffer.headroom() < length {
        return Err(Error::Exhausted);
    }

    if security_enabled {
        let aux = buffer.reserve_header(AUX_SECURITY_HEADER_LEN)?;
        AuxSecurityHeader::DEFAULT.emit(aux);
    }

    let src = buffer.reserve_header(2)?;
    src.copy_from_slice(&[identity.short[1], identity.short[0]]);

    let dst_field = buffer.reserve_header(2)?;
    dst_field.copy_from_slice(&[dst[1], dst[0]]);

    let pan = buffer.reserve_header(2)?;
    pan.copy_from_slice(&identity.pan_id.as_bytes());

    buffer.reserve_header(1)?[0] = sequence_number;

    buffer.reserve_header(1)?[0] = (u8::from(AddressingMode::Short) << DST_MODE_SHIFT)
        | (u8::from(AddressingMode::Short) << SRC_MODE_SHIFT);

    let mut fcf = FrameControl::PAN_ID_COMPRESSION;
    fcf.set(FrameControl::SECURITY_ENABLED, security_enabled);
    fcf.set(
        FrameControl::ACK_REQUEST,
        frame_type != FrameType::Acknowledgement && !broadcast,
    );
    buffer.reserve_header(1)?[0] = (u8::from(frame_type) & FRAME_TYPE_MASK) | fcf.bits();

    net_trace!(
        "802.15.4: prepended {} header seq={} dst={}",
        frame_type,
        sequence_number,
        next_hop
    );
    Ok(())
}

/// Parse the MAC header at the start of `payload`.
///
/// Never fails: a header cut short comes back with `valid == false`. Reserved addressing modes
/// are reported to `diagnostics` and treated as absent.
pub fn retrieve_header<const N: usize>(
    payload: &[u8],
    identity: &LinkIdentity,
    diagnostics: &mut Diagnostics<N>,
) -> Header {
    let mut header = Header::INVALID;
    if parse_fields(&mut header, payload, identity, diagnostics).is_some() {
        header.valid = true;
    }
    header
}

/// Take the next `length` octets, or `None` if the payload ends first.
fn take<'a>(header: &mut Header, payload: &'a [u8], length: usize) -> Option<&'a [u8]> {
    let start = header.header_length;
    if start + length > payload.len() {
        return None;
    }
    header.header_length += length;
    Some(&payload[start..start + length])
}

fn addressing_mode<const N: usize>(
    bits: u8,
    position: u8,
    diagnostics: &mut Diagnostics<N>,
) -> AddressingMode {
    match AddressingMode::from(bits & 0b11) {
        AddressingMode::Unknown(mode) => {
            diagnostics.push(Diagnostic::UnsupportedAddressingMode { position, mode });
            AddressingMode::Absent
        }
        mode => mode,
    }
}

/// Read an address in wire order into a most significant octet first array.
fn read_reversed<const L: usize>(field: &[u8]) -> [u8; L] {
    let mut address = [0u8; L];
    for (dst, src) in address.iter_mut().zip(field.iter().rev()) {
        *dst = *src;
    }
    address
}

fn parse_fields<const N: usize>(
    header: &mut Header,
    payload: &[u8],
    identity: &LinkIdentity,
    diagnostics: &mut Diagnostics<N>,
) -> Option<()> {
    let fcf1 = take(header, payload, 1)?[0];
    let fcf = FrameControl::from_bits_truncate(fcf1);
    header.frame_type = FrameType::from(fcf1 & FRAME_TYPE_MASK);
    header.security_enabled = fcf.contains(FrameControl::SECURITY_ENABLED);
    header.frame_pending = fcf.contains(FrameControl::FRAME_PENDING);
    header.ack_requested = fcf.contains(FrameControl::ACK_REQUEST);
    header.pan_id_compression = fcf.contains(FrameControl::PAN_ID_COMPRESSION);

    let fcf2 = take(header, payload, 1)?[0];
    let dst_mode = addressing_mode(fcf2 >> DST_MODE_SHIFT, POSITION_DST, diagnostics);
    let src_mode = addressing_mode(fcf2 >> SRC_MODE_SHIFT, POSITION_SRC, diagnostics);

    header.sequence_number = take(header, payload, 1)?[0];
    header.pan_id = Pan(LittleEndian::read_u16(take(header, payload, 2)?));

    header.dst = match dst_mode {
        AddressingMode::Short => {
            let short: [u8; 2] = read_reversed(take(header, payload, 2)?);
            if short == identity.short {
                Address::Extended(identity.extended)
            } else if short == [0xff; 2] {
                Address::BROADCAST
            } else {
                Address::spoof_extended(short)
            }
        }
        AddressingMode::Extended => Address::Extended(read_reversed(take(header, payload, 8)?)),
        _ => Address::Absent,
    };

    header.src = match src_mode {
        AddressingMode::Short => Address::spoof_extended(read_reversed(take(header, payload, 2)?)),
        AddressingMode::Extended => Address::Extended(read_reversed(take(header, payload, 8)?)),
        _ => Address::Absent,
    };

    if header.security_enabled {
        let aux = take(header, payload, AUX_SECURITY_HEADER_LEN)?;
        header.security = Some(AuxSecurityHeader::parse(&[aux[0], aux[1]]));
    }

    Some(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::{Component, PacketPool};
    use rstest::rstest;

    const ME: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0x12, 0x34];
    const PEER: [u8; 8] = [0x14, 0x15, 0x92, 0x00, 0x00, 0x0b, 0xab, 0xcd];

    fn me() -> LinkIdentity {
        LinkIdentity::new(ME, Pan(0xcafe))
    }

    fn peer() -> LinkIdentity {
        LinkIdentity::new(PEER, Pan(0xcafe))
    }

    fn encode(
        frame_type: FrameType,
        security: bool,
        next_hop: &Address,
        from: &LinkIdentity,
    ) -> heapless::Vec<u8, 128> {
        let mut storage = [PacketPool::EMPTY_SLOT; 1];
        let mut pool = PacketPool::new(&mut storage[..]);
        let mut buffer = pool.allocate(Component::Mac).unwrap();
        buffer.load(&[0xde, 0xad]).unwrap();

        prepend_header(&mut buffer, frame_type, security, 0x42, next_hop, from).unwrap();
        let bytes = heapless::Vec::from_slice(buffer.payload()).unwrap();
        pool.free(buffer);
        bytes
    }

    #[test]
    fn crc_check_value() {
        assert_eq!(calculate_crc(b"123456789"), 0x2189);
        assert_eq!(calculate_crc(&[]), 0);
    }

    #[test]
    fn emit_unicast_layout() {
        let bytes = encode(FrameType::Data, false, &Address::Extended(PEER), &me());
        assert_eq!(
            &bytes[..],
            &[
                0x61, // data, ack request, PAN-ID compression
                0x88, // short/short
                0x42, // DSN
                0xfe, 0xca, // PAN
                0xcd, 0xab, // dst
                0x34, 0x12, // src
                0xde, 0xad, // payload
            ]
        );
    }

    #[test]
    fn emit_broadcast_secured_layout() {
        let bytes = encode(FrameType::Data, true, &Address::ALL_ROUTERS, &me());
        assert_eq!(
            &bytes[..],
            &[
                0x49, 0x88, 0x42, 0xfe, 0xca, 0xff, 0xff, 0x34, 0x12, 0x69, 0x07, 0xde, 0xad,
            ]
        );
    }

    #[rstest]
    #[case::absent(Address::Absent)]
    #[case::ipv6_unicast(Address::Ipv6([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]))]
    #[case::prefix(Address::Prefix([0xbb; 8]))]
    fn emit_unaddressable(#[case] next_hop: Address) {
        let mut storage = [PacketPool::EMPTY_SLOT; 1];
        let mut pool = PacketPool::new(&mut storage[..]);
        let mut buffer = pool.allocate(Component::Mac).unwrap();

        assert_eq!(
            prepend_header(&mut buffer, FrameType::Data, false, 0, &next_hop, &me()),
            Err(Error::Unaddressable)
        );
        assert!(buffer.is_empty());
        pool.free(buffer);
    }

    #[rstest]
    fn round_trip(
        #[values(FrameType::Beacon, FrameType::Data, FrameType::Acknowledgement, FrameType::MacCommand)]
        frame_type: FrameType,
        #[values(false, true)] security: bool,
        #[values(false, true)] broadcast: bool,
    ) {
        let next_hop = if broadcast {
            Address::BROADCAST
        } else {
            Address::Extended(PEER)
        };
        let bytes = encode(frame_type, security, &next_hop, &me());

        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &peer(), &mut diagnostics)
            .check()
            .unwrap();

        assert_eq!(header.frame_type, frame_type);
        assert_eq!(header.security_enabled, security);
        assert_eq!(header.sequence_number, 0x42);
        assert_eq!(header.pan_id, Pan(0xcafe));
        assert!(header.pan_id_compression);
        assert!(!header.frame_pending);
        assert_eq!(
            header.ack_requested,
            frame_type != FrameType::Acknowledgement && !broadcast
        );
        assert_eq!(header.src, Address::spoof_extended([0x12, 0x34]));
        if broadcast {
            assert_eq!(header.dst, Address::BROADCAST);
        } else {
            assert_eq!(header.dst, Address::Extended(PEER));
        }
        if security {
            assert_eq!(header.security, Some(AuxSecurityHeader::DEFAULT));
            assert_eq!(header.header_length, SHORT_HEADER_LEN + AUX_SECURITY_HEADER_LEN);
        } else {
            assert_eq!(header.security, None);
            assert_eq!(header.header_length, SHORT_HEADER_LEN);
        }
        assert_eq!(&bytes[header.header_length..], &[0xde, 0xad]);
        assert_eq!(diagnostics.total(), 0);
    }

    #[rstest]
    fn every_strict_prefix_is_invalid(#[values(false, true)] security: bool) {
        let bytes = encode(FrameType::Data, security, &Address::Extended(PEER), &me());
        let header_len = bytes.len() - 2;
        let mut diagnostics = Diagnostics::<4>::new();

        for len in 0..header_len {
            let header = retrieve_header(&bytes[..len], &peer(), &mut diagnostics);
            assert!(!header.valid, "prefix of {len} octets parsed");
            assert!(header.header_length <= len);
            assert_eq!(header.check(), Err(Error::Truncated));
        }
        assert!(retrieve_header(&bytes[..header_len], &peer(), &mut diagnostics).valid);
    }

    #[test]
    fn exact_length_header_is_valid() {
        let bytes = [0x41, 0x88, 0x01, 0xfe, 0xca, 0xff, 0xff, 0x34, 0x12];
        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &peer(), &mut diagnostics);
        assert!(header.valid);
        assert_eq!(header.header_length, bytes.len());
    }

    #[test]
    fn own_short_resolves_to_extended() {
        let bytes = [0x61, 0x88, 0x01, 0xfe, 0xca, 0x34, 0x12, 0xcd, 0xab];
        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &me(), &mut diagnostics);
        assert_eq!(header.dst, Address::Extended(ME));
        assert_eq!(header.src, Address::Extended([0, 0, 0, 0, 0, 0, 0xab, 0xcd]));
    }

    #[test]
    fn foreign_short_is_spoofed() {
        let bytes = [0x61, 0x88, 0x01, 0xfe, 0xca, 0x78, 0x56, 0xcd, 0xab];
        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &me(), &mut diagnostics);
        assert_eq!(header.dst, Address::Extended([0, 0, 0, 0, 0, 0, 0x56, 0x78]));
    }

    #[test]
    fn extended_addresses() {
        let mut bytes = heapless::Vec::<u8, 32>::new();
        bytes.extend_from_slice(&[0x41, 0xcc, 0x07, 0xfe, 0xca]).unwrap();
        bytes.extend(ME.iter().rev().copied());
        bytes.extend(PEER.iter().rev().copied());

        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &me(), &mut diagnostics)
            .check()
            .unwrap();
        assert_eq!(header.dst, Address::Extended(ME));
        assert_eq!(header.src, Address::Extended(PEER));
        assert_eq!(header.header_length, 21);
    }

    #[test]
    fn reserved_mode_is_reported_and_absent() {
        // dst mode 0b01, src mode short
        let bytes = [0x41, 0x84, 0x01, 0xfe, 0xca, 0x34, 0x12];
        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &me(), &mut diagnostics)
            .check()
            .unwrap();

        assert_eq!(header.dst, Address::Absent);
        assert_eq!(header.src, Address::spoof_extended([0x12, 0x34]));
        assert_eq!(
            diagnostics.pop(),
            Some(Diagnostic::UnsupportedAddressingMode {
                position: POSITION_DST,
                mode: 0b01
            })
        );
    }

    #[test]
    fn aux_security_control() {
        let mut bytes = [0u8; 2];
        AuxSecurityHeader::DEFAULT.emit(&mut bytes);
        assert_eq!(bytes, [0x69, 0x07]);
        assert_eq!(AuxSecurityHeader::parse(&bytes), AuxSecurityHeader::DEFAULT);
    }

    #[test]
    fn display() {
        let bytes = [0x61, 0x88, 0x01, 0xfe, 0xca, 0x34, 0x12, 0xcd, 0xab];
        let mut diagnostics = Diagnostics::<4>::new();
        let header = retrieve_header(&bytes, &me(), &mut diagnostics);
        assert_eq!(
            format!("{header}"),
            "802.15.4 Data seq=1 pan=0xcafe dst=14-15-92-00-00-0b-12-34 src=00-00-00-00-00-00-ab-cd"
        );
    }
}
