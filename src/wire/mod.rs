/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation*. It provides two levels
of functionality.

 * First, it provides functions to extract fields from sequences of octets,
   and to insert fields into sequences of octets. This happens through typed views
   such as [Icmpv6Packet] or [RplDio].
 * Second, it provides a compact, high-level representation of packet data that can be
   parsed from and emitted into a sequence of octets. This happens through the `Repr`
   family of structs, e.g. [RplDioRepr] or [RplDaoRepr].

The MAC header is different: its layout depends on the addressing modes, so it is written
with [prepend_header] directly in front of a payload and read with [retrieve_header], which
never fails and instead marks the descriptor it returns invalid.

[Icmpv6Packet]: struct.Icmpv6Packet.html
[RplDio]: struct.RplDio.html
[RplDioRepr]: struct.RplDioRepr.html
[RplDaoRepr]: struct.RplDaoRepr.html
[prepend_header]: ieee802154/fn.prepend_header.html
[retrieve_header]: ieee802154/fn.retrieve_header.html

The typed views guarantee that, if `check_len()` returned `Ok(())`, then no accessor or setter
method will panic. When parsing untrusted input, it is *necessary* to use `new_checked()`.
The `Repr::emit()` methods never panic as long as the underlying buffer is at least
`Repr::buffer_len()` octets long.
*/

mod field {
    pub type Field = ::core::ops::Range<usize>;
}

mod address;
pub mod icmpv6;
pub mod ieee802154;
pub mod rpl;

pub use self::address::{Address, AddressKind};

pub use self::icmpv6::{Message as Icmpv6Message, Packet as Icmpv6Packet};

pub use self::ieee802154::{
    FrameType as Ieee802154FrameType, Header as Ieee802154Header, LinkIdentity,
    Pan as Ieee802154Pan,
};

pub use self::rpl::{
    Dao as RplDao, DaoOptions as RplDaoOptions, DaoRepr as RplDaoRepr, Dio as RplDio,
    DioOptions as RplDioOptions, DioRepr as RplDioRepr, PrefixOption as RplPrefixOption,
    PrefixOptionRepr as RplPrefixOptionRepr, RplControlMessage, Transit as RplTransit,
    TransitRepr as RplTransitRepr,
};
