// ------------------------------------
// Announcement timing:
// ------------------------------------
/// Base DIO timer period in milliseconds; jitter is added on top.
pub const DEFAULT_DIO_BASE_MS: u64 = 1700;
/// Base DAO timer period in milliseconds, distinct from the DIO base so the two desynchronize.
pub const DEFAULT_DAO_BASE_MS: u64 = 2000;
/// Mask applied to a 16-bit random draw to obtain the period jitter.
pub const DEFAULT_JITTER_MASK: u16 = 0x00ff;
/// A message is sent on one timer expiry out of this many.
pub const DEFAULT_SEND_DIVIDER: u8 = 5;

// ------------------------------------
// DIO template:
// ------------------------------------
pub const DEFAULT_DIO_INSTANCE_ID: u8 = 0x22;
pub const DEFAULT_DIO_VERSION_NUMBER: u8 = 0x11;
pub const DEFAULT_DIO_DTSN: u8 = 0x33;
/// DODAGID announced until one is learned from the network.
pub const PLACEHOLDER_DIO_DODAG_ID: [u8; 16] = [
    0xaa, 0xaa, 0xbb, 0xbb, 0xcc, 0xcc, 0xdd, 0xdd, 0xaa, 0xaa, 0xbb, 0xbb, 0xcc, 0xcc, 0xdd, 0xdd,
];

pub const PREFIX_OPTION_LENGTH: u8 = 0x08;
pub const PREFIX_LENGTH: u8 = 0x06;
pub const DEFAULT_ROUTE_LIFETIME: u32 = 0x0000_0011;

// ------------------------------------
// DAO template:
// ------------------------------------
pub const DEFAULT_DAO_INSTANCE_ID: u8 = 0x88;
pub const DEFAULT_DAO_SEQUENCE: u8 = 0x99;
pub const PLACEHOLDER_DAO_DODAG_ID: [u8; 16] = [
    0xee, 0xff, 0xee, 0xff, 0xee, 0xff, 0xee, 0xff, 0xee, 0xff, 0xee, 0xff, 0xee, 0xff, 0xee, 0xff,
];

pub const TRANSIT_PATH_CONTROL: u8 = 0xff;
pub const DEFAULT_PATH_LIFETIME: u8 = 0xaa;
/// Most parents advertised in one DAO; bounded by the packet buffer capacity.
pub const MAX_DAO_PARENTS: usize = 8;

// ------------------------------------
// Rank:
// ------------------------------------
pub const RANK_UNDEFINED: u16 = 0xffff;
pub const DEFAULT_MIN_HOP_RANK_INCREASE: u16 = 256;
