//! RPL control message bodies, as carried after the ICMPv6 control header. See [RFC 6550 § 6].
//!
//! Every structure is a typed view over a byte buffer with fixed offsets; nothing is read by
//! reinterpreting memory. The layouts are the compact profile this stack speaks:
//!
//! ```txt
//! DIO             reserved | flags | dtsn | version | instance | mop/prf | dodag id (16) | rank (2) | options
//! prefix option   type | length | prefix length | flags | route lifetime (4) | prefix (8)
//! DAO             instance | K/D flags | reserved | sequence | dodag id (16) | options
//! transit option  type | count | E flags | path control | path sequence | path lifetime
//! ```
//!
//! The transit option is followed by `count` 8-octet extended addresses. Rank and route lifetime
//! are in network byte order.
//!
//! [RFC 6550 § 6]: https://datatracker.ietf.org/doc/html/rfc6550#section-6

use core::fmt;

use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian};

use crate::{Error, Result};

enum_with_unknown! {
    /// RPL control message code.
    pub enum RplControlMessage(u8) {
        DodagInformationSolicitation = 0x00,
        DodagInformationObject = 0x01,
        DestinationAdvertisementObject = 0x02,
        DestinationAdvertisementObjectAck = 0x03,
    }
}

impl fmt::Display for RplControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RplControlMessage::DodagInformationSolicitation => write!(f, "DIS"),
            RplControlMessage::DodagInformationObject => write!(f, "DIO"),
            RplControlMessage::DestinationAdvertisementObject => write!(f, "DAO"),
            RplControlMessage::DestinationAdvertisementObjectAck => write!(f, "DAO-ACK"),
            RplControlMessage::Unknown(id) => write!(f, "{id}"),
        }
    }
}

enum_with_unknown! {
    /// What follows a DIO.
    pub enum DioOptions(u8) {
        NoPrefix = 0x05,
        Prefix = 0x03,
    }
}

enum_with_unknown! {
    /// What follows a DAO.
    pub enum DaoOptions(u8) {
        NoTransit = 0x07,
        Transit = 0x06,
    }
}

/// Option type of the DIO prefix information option.
pub const PREFIX_OPTION_TYPE: u8 = 0x03;
/// Option type of the DAO transit information option.
pub const TRANSIT_OPTION_TYPE: u8 = 0x06;

bitflags! {
    /// Grounded, mode of operation and preference bits of a DIO.
    pub struct DioFlags: u8 {
        const GROUNDED = 1 << 7;
        const MOP_A = 1 << 5;
        const MOP_B = 1 << 4;
        const MOP_C = 1 << 3;
        const PRF_A = 1 << 2;
        const PRF_B = 1 << 1;
        const PRF_C = 1 << 0;
    }
}

bitflags! {
    /// Flags octet of a DAO.
    pub struct DaoFlags: u8 {
        /// DAO-ACK expected.
        const K = 1 << 7;
        /// DODAGID present.
        const D = 1 << 6;
        const FLAG_A = 1 << 5;
        const FLAG_B = 1 << 4;
        const FLAG_C = 1 << 3;
        const FLAG_D = 1 << 2;
        const FLAG_E = 1 << 1;
        const FLAG_F = 1 << 0;
    }
}

bitflags! {
    /// Flags octet of a transit information option.
    pub struct TransitFlags: u8 {
        /// External.
        const E = 1 << 7;
    }
}

bitflags! {
    /// Flags octet of a prefix information option.
    pub struct PrefixFlags: u8 {
        const PRF_A = 1 << 4;
        const PRF_B = 1 << 3;
    }
}

mod field {
    use crate::wire::field::*;

    pub const DIO_RESERVED: usize = 0;
    pub const DIO_FLAGS: usize = 1;
    pub const DIO_DTSN: usize = 2;
    pub const DIO_VERSION: usize = 3;
    pub const DIO_INSTANCE: usize = 4;
    pub const DIO_MOP_PRF: usize = 5;
    pub const DIO_DODAG_ID: Field = 6..22;
    pub const DIO_RANK: Field = 22..24;
    pub const DIO_OPTIONS: usize = 24;
    pub const DIO_END: usize = 25;

    pub const PREFIX_TYPE: usize = 0;
    pub const PREFIX_OPTION_LENGTH: usize = 1;
    pub const PREFIX_LENGTH: usize = 2;
    pub const PREFIX_FLAGS: usize = 3;
    pub const PREFIX_ROUTE_LIFETIME: Field = 4..8;
    pub const PREFIX_PREFIX: Field = 8..16;
    pub const PREFIX_END: usize = 16;

    pub const DAO_INSTANCE: usize = 0;
    pub const DAO_FLAGS: usize = 1;
    pub const DAO_RESERVED: usize = 2;
    pub const DAO_SEQUENCE: usize = 3;
    pub const DAO_DODAG_ID: Field = 4..20;
    pub const DAO_OPTIONS: usize = 20;
    pub const DAO_END: usize = 21;

    pub const TRANSIT_TYPE: usize = 0;
    pub const TRANSIT_COUNT: usize = 1;
    pub const TRANSIT_FLAGS: usize = 2;
    pub const TRANSIT_PATH_CONTROL: usize = 3;
    pub const TRANSIT_PATH_SEQUENCE: usize = 4;
    pub const TRANSIT_PATH_LIFETIME: usize = 5;
    pub const TRANSIT_END: usize = 6;

    pub const PARENT_LEN: usize = 8;
}

pub const DIO_LEN: usize = field::DIO_END;
pub const PREFIX_OPTION_LEN: usize = field::PREFIX_END;
pub const DAO_LEN: usize = field::DAO_END;
pub const TRANSIT_OPTION_LEN: usize = field::TRANSIT_END;
pub const PARENT_LEN: usize = field::PARENT_LEN;

macro_rules! byte_accessors {
    (mut $( $get:ident, $set:ident, $field:expr; )*) => {
        $(
            #[inline]
            pub fn $set(&mut self, value: u8) {
                self.buffer.as_mut()[$field] = value
            }
        )*
    };
    ($( $get:ident, $set:ident, $field:expr; )*) => {
        $(
            #[inline]
            pub fn $get(&self) -> u8 {
                self.buffer.as_ref()[$field]
            }
        )*
    };
}

macro_rules! view {
    ($(#[$attr:meta])* $name:ident, $end:expr) => {
        $(#[$attr])*
        #[derive(Debug, PartialEq, Eq, Clone)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name<T: AsRef<[u8]>> {
            buffer: T,
        }

        impl<T: AsRef<[u8]>> $name<T> {
            /// Imbue a raw octet buffer with the structure.
            pub const fn new_unchecked(buffer: T) -> Self {
                Self { buffer }
            }

            /// Shorthand for a combination of [new_unchecked] and [check_len].
            ///
            /// [new_unchecked]: #method.new_unchecked
            /// [check_len]: #method.check_len
            pub fn new_checked(buffer: T) -> Result<Self> {
                let packet = Self::new_unchecked(buffer);
                packet.check_len()?;
                Ok(packet)
            }

            /// Consume the view, returning the underlying buffer.
            pub fn into_inner(self) -> T {
                self.buffer
            }

            fn check_fixed_len(&self) -> Result<()> {
                if self.buffer.as_ref().len() < $end {
                    Err(Error::Truncated)
                } else {
                    Ok(())
                }
            }
        }
    };
}

view!(
    /// A read/write wrapper around a DIO.
    Dio,
    field::DIO_END
);

impl<T: AsRef<[u8]>> Dio<T> {
    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        self.check_fixed_len()
    }

    byte_accessors! {
        reserved, set_reserved, field::DIO_RESERVED;
        flags, set_flags, field::DIO_FLAGS;
        dtsn, set_dtsn, field::DIO_DTSN;
        version_number, set_version_number, field::DIO_VERSION;
        rpl_instance_id, set_rpl_instance_id, field::DIO_INSTANCE;
    }

    #[inline]
    pub fn mop_prf(&self) -> DioFlags {
        DioFlags::from_bits_truncate(self.buffer.as_ref()[field::DIO_MOP_PRF])
    }

    #[inline]
    pub fn dodag_id(&self) -> [u8; 16] {
        let mut id = [0u8; 16];
        id.copy_from_slice(&self.buffer.as_ref()[field::DIO_DODAG_ID]);
        id
    }

    #[inline]
    pub fn rank(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::DIO_RANK])
    }

    #[inline]
    pub fn options(&self) -> DioOptions {
        DioOptions::from(self.buffer.as_ref()[field::DIO_OPTIONS])
    }

    /// Return whatever follows the fixed DIO fields.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[field::DIO_END..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Dio<T> {
    byte_accessors! { mut
        reserved, set_reserved, field::DIO_RESERVED;
        flags, set_flags, field::DIO_FLAGS;
        dtsn, set_dtsn, field::DIO_DTSN;
        version_number, set_version_number, field::DIO_VERSION;
        rpl_instance_id, set_rpl_instance_id, field::DIO_INSTANCE;
    }

    #[inline]
    pub fn set_mop_prf(&mut self, value: DioFlags) {
        self.buffer.as_mut()[field::DIO_MOP_PRF] = value.bits()
    }

    #[inline]
    pub fn set_dodag_id(&mut self, value: &[u8; 16]) {
        self.buffer.as_mut()[field::DIO_DODAG_ID].copy_from_slice(value)
    }

    #[inline]
    pub fn set_rank(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::DIO_RANK], value)
    }

    #[inline]
    pub fn set_options(&mut self, value: DioOptions) {
        self.buffer.as_mut()[field::DIO_OPTIONS] = value.into()
    }
}

/// A high-level representation of a DIO.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DioRepr {
    pub reserved: u8,
    pub flags: u8,
    pub dtsn: u8,
    pub version_number: u8,
    pub rpl_instance_id: u8,
    pub mop_prf: DioFlags,
    pub dodag_id: [u8; 16],
    pub rank: u16,
    pub options: DioOptions,
}

impl DioRepr {
    /// Parse a DIO and return a high-level representation.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Dio<&T>) -> Result<DioRepr> {
        packet.check_len()?;
        Ok(DioRepr {
            reserved: packet.reserved(),
            flags: packet.flags(),
            dtsn: packet.dtsn(),
            version_number: packet.version_number(),
            rpl_instance_id: packet.rpl_instance_id(),
            mop_prf: packet.mop_prf(),
            dodag_id: packet.dodag_id(),
            rank: packet.rank(),
            options: packet.options(),
        })
    }

    /// Return the length of a DIO that will be emitted from this high-level representation.
    pub const fn buffer_len(&self) -> usize {
        DIO_LEN
    }

    /// Emit a high-level representation into a DIO.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Dio<&mut T>) {
        packet.set_reserved(self.reserved);
        packet.set_flags(self.flags);
        packet.set_dtsn(self.dtsn);
        packet.set_version_number(self.version_number);
        packet.set_rpl_instance_id(self.rpl_instance_id);
        packet.set_mop_prf(self.mop_prf);
        packet.set_dodag_id(&self.dodag_id);
        packet.set_rank(self.rank);
        packet.set_options(self.options);
    }
}

impl fmt::Display for DioRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DIO instance={:#04x} version={:#04x} rank={:#06x} options={:?}",
            self.rpl_instance_id, self.version_number, self.rank, self.options
        )
    }
}

view!(
    /// A read/write wrapper around a DIO prefix information option.
    PrefixOption,
    field::PREFIX_END
);

impl<T: AsRef<[u8]>> PrefixOption<T> {
    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        self.check_fixed_len()
    }

    byte_accessors! {
        option_type, set_option_type, field::PREFIX_TYPE;
        option_length, set_option_length, field::PREFIX_OPTION_LENGTH;
        prefix_length, set_prefix_length, field::PREFIX_LENGTH;
    }

    #[inline]
    pub fn flags(&self) -> PrefixFlags {
        PrefixFlags::from_bits_truncate(self.buffer.as_ref()[field::PREFIX_FLAGS])
    }

    #[inline]
    pub fn route_lifetime(&self) -> u32 {
        NetworkEndian::read_u32(&self.buffer.as_ref()[field::PREFIX_ROUTE_LIFETIME])
    }

    #[inline]
    pub fn prefix(&self) -> [u8; 8] {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.buffer.as_ref()[field::PREFIX_PREFIX]);
        prefix
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> PrefixOption<T> {
    byte_accessors! { mut
        option_type, set_option_type, field::PREFIX_TYPE;
        option_length, set_option_length, field::PREFIX_OPTION_LENGTH;
        prefix_length, set_prefix_length, field::PREFIX_LENGTH;
    }

    #[inline]
    pub fn set_flags(&mut self, value: PrefixFlags) {
        self.buffer.as_mut()[field::PREFIX_FLAGS] = value.bits()
    }

    #[inline]
    pub fn set_route_lifetime(&mut self, value: u32) {
        NetworkEndian::write_u32(
            &mut self.buffer.as_mut()[field::PREFIX_ROUTE_LIFETIME],
            value,
        )
    }

    #[inline]
    pub fn set_prefix(&mut self, value: &[u8; 8]) {
        self.buffer.as_mut()[field::PREFIX_PREFIX].copy_from_slice(value)
    }
}

/// A high-level representation of a DIO prefix information option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PrefixOptionRepr {
    pub option_length: u8,
    pub prefix_length: u8,
    pub flags: PrefixFlags,
    pub route_lifetime: u32,
    pub prefix: [u8; 8],
}

impl PrefixOptionRepr {
    /// Parse a prefix option. Returns `Err(Error::Unrecognized)` for any other option type.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(
        packet: &PrefixOption<&T>,
    ) -> Result<PrefixOptionRepr> {
        packet.check_len()?;
        if packet.option_type() != PREFIX_OPTION_TYPE {
            return Err(Error::Unrecognized);
        }
        Ok(PrefixOptionRepr {
            option_length: packet.option_length(),
            prefix_length: packet.prefix_length(),
            flags: packet.flags(),
            route_lifetime: packet.route_lifetime(),
            prefix: packet.prefix(),
        })
    }

    pub const fn buffer_len(&self) -> usize {
        PREFIX_OPTION_LEN
    }

    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut PrefixOption<&mut T>) {
        packet.set_option_type(PREFIX_OPTION_TYPE);
        packet.set_option_length(self.option_length);
        packet.set_prefix_length(self.prefix_length);
        packet.set_flags(self.flags);
        packet.set_route_lifetime(self.route_lifetime);
        packet.set_prefix(&self.prefix);
    }
}

view!(
    /// A read/write wrapper around a DAO.
    Dao,
    field::DAO_END
);

impl<T: AsRef<[u8]>> Dao<T> {
    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        self.check_fixed_len()
    }

    byte_accessors! {
        rpl_instance_id, set_rpl_instance_id, field::DAO_INSTANCE;
        reserved, set_reserved, field::DAO_RESERVED;
        sequence, set_sequence, field::DAO_SEQUENCE;
    }

    #[inline]
    pub fn flags(&self) -> DaoFlags {
        DaoFlags::from_bits_truncate(self.buffer.as_ref()[field::DAO_FLAGS])
    }

    #[inline]
    pub fn dodag_id(&self) -> [u8; 16] {
        let mut id = [0u8; 16];
        id.copy_from_slice(&self.buffer.as_ref()[field::DAO_DODAG_ID]);
        id
    }

    #[inline]
    pub fn options(&self) -> DaoOptions {
        DaoOptions::from(self.buffer.as_ref()[field::DAO_OPTIONS])
    }

    /// Return whatever follows the fixed DAO fields.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[field::DAO_END..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Dao<T> {
    byte_accessors! { mut
        rpl_instance_id, set_rpl_instance_id, field::DAO_INSTANCE;
        reserved, set_reserved, field::DAO_RESERVED;
        sequence, set_sequence, field::DAO_SEQUENCE;
    }

    #[inline]
    pub fn set_flags(&mut self, value: DaoFlags) {
        self.buffer.as_mut()[field::DAO_FLAGS] = value.bits()
    }

    #[inline]
    pub fn set_dodag_id(&mut self, value: &[u8; 16]) {
        self.buffer.as_mut()[field::DAO_DODAG_ID].copy_from_slice(value)
    }

    #[inline]
    pub fn set_options(&mut self, value: DaoOptions) {
        self.buffer.as_mut()[field::DAO_OPTIONS] = value.into()
    }
}

view!(
    /// A read/write wrapper around a DAO transit information option and the parent list that
    /// follows it.
    Transit,
    field::TRANSIT_END
);

impl<T: AsRef<[u8]>> Transit<T> {
    /// Ensure that no accessor method will panic if called, including [parents].
    ///
    /// [parents]: #method.parents
    pub fn check_len(&self) -> Result<()> {
        self.check_fixed_len()?;
        let needed = field::TRANSIT_END + self.count() as usize * field::PARENT_LEN;
        if self.buffer.as_ref().len() < needed {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    byte_accessors! {
        option_type, set_option_type, field::TRANSIT_TYPE;
        count, set_count, field::TRANSIT_COUNT;
        path_control, set_path_control, field::TRANSIT_PATH_CONTROL;
        path_sequence, set_path_sequence, field::TRANSIT_PATH_SEQUENCE;
        path_lifetime, set_path_lifetime, field::TRANSIT_PATH_LIFETIME;
    }

    #[inline]
    pub fn flags(&self) -> TransitFlags {
        TransitFlags::from_bits_truncate(self.buffer.as_ref()[field::TRANSIT_FLAGS])
    }

    /// Return an iterator over the advertised parents, in wire order.
    pub fn parents(&self) -> impl Iterator<Item = [u8; 8]> + '_ {
        self.buffer.as_ref()[field::TRANSIT_END..]
            .chunks_exact(field::PARENT_LEN)
            .take(self.count() as usize)
            .map(|chunk| {
                let mut parent = [0u8; 8];
                parent.copy_from_slice(chunk);
                parent
            })
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Transit<T> {
    byte_accessors! { mut
        option_type, set_option_type, field::TRANSIT_TYPE;
        count, set_count, field::TRANSIT_COUNT;
        path_control, set_path_control, field::TRANSIT_PATH_CONTROL;
        path_sequence, set_path_sequence, field::TRANSIT_PATH_SEQUENCE;
        path_lifetime, set_path_lifetime, field::TRANSIT_PATH_LIFETIME;
    }

    #[inline]
    pub fn set_flags(&mut self, value: TransitFlags) {
        self.buffer.as_mut()[field::TRANSIT_FLAGS] = value.bits()
    }
}

/// A high-level representation of a transit information option header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TransitRepr {
    pub count: u8,
    pub flags: TransitFlags,
    pub path_control: u8,
    pub path_sequence: u8,
    pub path_lifetime: u8,
}

impl TransitRepr {
    /// Parse a transit option. Returns `Err(Error::Unrecognized)` for any other option type.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Transit<&T>) -> Result<TransitRepr> {
        packet.check_len()?;
        if packet.option_type() != TRANSIT_OPTION_TYPE {
            return Err(Error::Unrecognized);
        }
        Ok(TransitRepr {
            count: packet.count(),
            flags: packet.flags(),
            path_control: packet.path_control(),
            path_sequence: packet.path_sequence(),
            path_lifetime: packet.path_lifetime(),
        })
    }

    /// Length of the option header alone; the parent list is written separately.
    pub const fn buffer_len(&self) -> usize {
        TRANSIT_OPTION_LEN
    }

    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Transit<&mut T>) {
        packet.set_option_type(TRANSIT_OPTION_TYPE);
        packet.set_count(self.count);
        packet.set_flags(self.flags);
        packet.set_path_control(self.path_control);
        packet.set_path_sequence(self.path_sequence);
        packet.set_path_lifetime(self.path_lifetime);
    }
}

/// A high-level representation of a DAO, with its transit option if one is present.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DaoRepr {
    pub rpl_instance_id: u8,
    pub flags: DaoFlags,
    pub reserved: u8,
    pub sequence: u8,
    pub dodag_id: [u8; 16],
    pub options: DaoOptions,
    pub transit: Option<TransitRepr>,
}

impl DaoRepr {
    /// Parse a DAO. When the options octet announces a transit option, it is parsed and its
    /// parent list is bounds checked too.
    pub fn parse<T: AsRef<[u8]> + ?Sized>(packet: &Dao<&T>) -> Result<DaoRepr> {
        packet.check_len()?;
        let options = packet.options();
        let transit = match options {
            DaoOptions::Transit => {
                Some(TransitRepr::parse(&Transit::new_checked(packet.payload())?)?)
            }
            DaoOptions::NoTransit => None,
            DaoOptions::Unknown(_) => return Err(Error::Malformed),
        };

        Ok(DaoRepr {
            rpl_instance_id: packet.rpl_instance_id(),
            flags: packet.flags(),
            reserved: packet.reserved(),
            sequence: packet.sequence(),
            dodag_id: packet.dodag_id(),
            options,
            transit,
        })
    }

    /// Length of the fixed DAO fields; options are written separately.
    pub const fn buffer_len(&self) -> usize {
        DAO_LEN
    }

    /// Emit the fixed DAO fields.
    pub fn emit<T: AsRef<[u8]> + AsMut<[u8]> + ?Sized>(&self, packet: &mut Dao<&mut T>) {
        packet.set_rpl_instance_id(self.rpl_instance_id);
        packet.set_flags(self.flags);
        packet.set_reserved(self.reserved);
        packet.set_sequence(self.sequence);
        packet.set_dodag_id(&self.dodag_id);
        packet.set_options(self.options);
    }
}

impl fmt::Display for DaoRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DAO instance={:#04x} seq={:#04x}",
            self.rpl_instance_id, self.sequence
        )?;
        if let Some(transit) = &self.transit {
            write!(
                f,
                " parents={} path_seq={}",
                transit.count, transit.path_sequence
            )?;
        }
        Ok(())
    }
}
