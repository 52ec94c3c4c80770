use core::fmt;

use crate::{Error, Result};

/// The kind of an [Address], without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Absent,
    Short,
    Extended,
    Ipv6,
    PanId,
    Prefix,
}

impl AddressKind {
    /// Return the size in octets of an address of this kind.
    pub const fn size(&self) -> usize {
        match self {
            AddressKind::Absent => 0,
            AddressKind::Short | AddressKind::PanId => 2,
            AddressKind::Extended | AddressKind::Prefix => 8,
            AddressKind::Ipv6 => 16,
        }
    }
}

/// An address as it travels between the layers of a mote.
///
/// The variant alone decides which octets are meaningful. Converting between variants only
/// happens through explicit constructors such as [Address::spoof_extended].
///
/// Multi-octet values are stored most significant octet first; the link layer reverses them
/// on the wire.
#[derive(Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    #[default]
    Absent,
    Short([u8; 2]),
    Extended([u8; 8]),
    Ipv6([u8; 16]),
    PanId([u8; 2]),
    Prefix([u8; 8]),
}

impl Address {
    /// The link-layer broadcast address.
    pub const BROADCAST: Address = Address::Short([0xff; 2]);

    /// The link-local all-routers multicast group, `ff02::2`.
    pub const ALL_ROUTERS: Address = Address::Ipv6([
        0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x02,
    ]);

    /// Build an address of the given kind from raw octets.
    ///
    /// Returns `Err(Error::Unaddressable)` if the length does not match the kind.
    pub fn from_bytes(kind: AddressKind, data: &[u8]) -> Result<Address> {
        if data.len() != kind.size() {
            return Err(Error::Unaddressable);
        }

        Ok(match kind {
            AddressKind::Absent => Address::Absent,
            AddressKind::Short => Address::Short([data[0], data[1]]),
            AddressKind::PanId => Address::PanId([data[0], data[1]]),
            AddressKind::Extended => {
                let mut b = [0u8; 8];
                b.copy_from_slice(data);
                Address::Extended(b)
            }
            AddressKind::Prefix => {
                let mut b = [0u8; 8];
                b.copy_from_slice(data);
                Address::Prefix(b)
            }
            AddressKind::Ipv6 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(data);
                Address::Ipv6(b)
            }
        })
    }

    /// Synthesize an extended address from a short one, by placing the two short octets in the
    /// low two octets of an otherwise zeroed extended address.
    pub const fn spoof_extended(short: [u8; 2]) -> Address {
        Address::Extended([0, 0, 0, 0, 0, 0, short[0], short[1]])
    }

    pub const fn kind(&self) -> AddressKind {
        match self {
            Address::Absent => AddressKind::Absent,
            Address::Short(_) => AddressKind::Short,
            Address::Extended(_) => AddressKind::Extended,
            Address::Ipv6(_) => AddressKind::Ipv6,
            Address::PanId(_) => AddressKind::PanId,
            Address::Prefix(_) => AddressKind::Prefix,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Absent => &[],
            Address::Short(value) | Address::PanId(value) => value,
            Address::Extended(value) | Address::Prefix(value) => value,
            Address::Ipv6(value) => value,
        }
    }

    /// Query whether this is the link-layer broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the address designates more than one node.
    pub fn is_broadcast_or_multicast(&self) -> bool {
        match self {
            Address::Short(value) => *value == [0xff; 2],
            Address::Extended(value) => *value == [0xff; 8],
            Address::Ipv6(value) => value[0] == 0xff,
            Address::Absent | Address::PanId(_) | Address::Prefix(_) => false,
        }
    }

    /// Return the two low-order octets of an extended address, which is the 16-bit address the
    /// node uses on the air.
    pub fn low_short(&self) -> Option<[u8; 2]> {
        match self {
            Address::Extended(value) => Some([value[6], value[7]]),
            Address::Short(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Absent => write!(f, "not-present"),
            Address::Ipv6(bytes) => {
                for (i, pair) in bytes.chunks(2).enumerate() {
                    if i != 0 {
                        write!(f, ":")?;
                    }
                    write!(f, "{:02x}{:02x}", pair[0], pair[1])?;
                }
                Ok(())
            }
            Address::PanId(bytes) => write!(f, "pan-{:02x}{:02x}", bytes[0], bytes[1]),
            Address::Prefix(bytes) => {
                for pair in bytes.chunks(2) {
                    write!(f, "{:02x}{:02x}:", pair[0], pair[1])?;
                }
                write!(f, ":/64")
            }
            Address::Short(bytes) => write_dashed(f, bytes),
            Address::Extended(bytes) => write_dashed(f, bytes),
        }
    }
}

fn write_dashed(f: &mut fmt::Formatter, bytes: &[u8]) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if i != 0 {
            write!(f, "-")?;
        }
        write!(f, "{b:02x}")?;
    }
    Ok(())
}
