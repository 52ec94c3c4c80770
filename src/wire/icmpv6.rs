use core::fmt;

use byteorder::{ByteOrder, NetworkEndian};

use crate::{Error, Result};

/// IANA protocol number of ICMPv6.
pub const PROTOCOL_ICMPV6: u8 = 58;

enum_with_unknown! {
    /// Internet protocol control message type.
    pub enum Message(u8) {
        /// Echo Request
        EchoRequest = 0x80,
        /// Echo Reply
        EchoReply = 0x81,
        /// RPL Control Message
        RplControl = 0x9b,
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Message::EchoRequest => write!(f, "echo request"),
            Message::EchoReply => write!(f, "echo reply"),
            Message::RplControl => write!(f, "RPL control message"),
            Message::Unknown(id) => write!(f, "{id}"),
        }
    }
}

pub mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub fn data(data: &[u8]) -> u16 {
        let accum = data.chunks(2).fold(0u32, |accum, chunk| {
            let word = if chunk.len() == 2 {
                NetworkEndian::read_u16(chunk) as u32
            } else {
                (chunk[0] as u32) << 8
            };
            accum + word
        });
        propagate_carries(accum)
    }
}

/// A read/write wrapper around a control message header and its body.
///
/// The checksum covers type, code and body; there is no pseudo-header.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

// Ranges and constants describing key boundaries in the header.
mod field {
    use crate::wire::field::*;

    pub const TYPE: usize = 0;
    pub const CODE: usize = 1;
    pub const CHECKSUM: Field = 2..4;

    pub const HEADER_END: usize = 4;
}

/// Length of the control message header.
pub const HEADER_LEN: usize = field::HEADER_END;

impl<T: AsRef<[u8]>> Packet<T> {
    /// Imbue a raw octet buffer with control message structure.
    pub const fn new_unchecked(buffer: T) -> Packet<T> {
        Packet { buffer }
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: T) -> Result<Packet<T>> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        if self.buffer.as_ref().len() < field::HEADER_END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Consume the packet, returning the underlying buffer.
    pub fn into_inner(self) -> T {
        self.buffer
    }

    /// Return the message type field.
    #[inline]
    pub fn msg_type(&self) -> Message {
        Message::from(self.buffer.as_ref()[field::TYPE])
    }

    /// Return the message code field.
    #[inline]
    pub fn msg_code(&self) -> u8 {
        self.buffer.as_ref()[field::CODE]
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.buffer.as_ref()[field::CHECKSUM])
    }

    /// Validate the checksum over the whole message.
    pub fn verify_checksum(&self) -> bool {
        if cfg!(fuzzing) {
            return true;
        }

        checksum::data(self.buffer.as_ref()) == !0
    }

    /// Return the message body.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[field::HEADER_END..]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    /// Set the message type field.
    #[inline]
    pub fn set_msg_type(&mut self, value: Message) {
        self.buffer.as_mut()[field::TYPE] = value.into()
    }

    /// Set the message code field.
    #[inline]
    pub fn set_msg_code(&mut self, value: u8) {
        self.buffer.as_mut()[field::CODE] = value
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.buffer.as_mut()[field::CHECKSUM], value)
    }

    /// Compute and fill in the checksum. The body must be in place.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = !checksum::data(self.buffer.as_ref());
        self.set_checksum(checksum)
    }

    /// Return a mutable pointer to the message body.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[field::HEADER_END..]
    }
}

impl<T: AsRef<[u8]>> fmt::Display for Packet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ICMPv6 type={} code={:#04x} len={}",
            self.msg_type(),
            self.msg_code(),
            self.payload().len()
        )?;
        if !self.verify_checksum() {
            write!(f, " (checksum incorrect)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static RPL_DAO_BYTES: [u8; 8] = [0x9b, 0x02, 0x00, 0x00, 0x88, 0xff, 0x00, 0x99];

    #[test]
    fn checksum_data() {
        assert_eq!(checksum::data(&[0x00, 0x01, 0xf2, 0x03]), 0xf204);
        assert_eq!(checksum::data(&[0xff, 0xff, 0x00, 0x01]), 0x0001);
        assert_eq!(checksum::data(&[0x01]), 0x0100);
    }

    #[test]
    fn fill_then_verify() {
        let mut bytes = RPL_DAO_BYTES;
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.fill_checksum();
        assert!(packet.verify_checksum());
        assert_eq!(packet.msg_type(), Message::RplControl);
        assert_eq!(packet.msg_code(), 0x02);
        assert_eq!(packet.payload(), &[0x88, 0xff, 0x00, 0x99]);

        // 0x9b02 + 0x88ff + 0x0099 = 0x1249a -> 0x249b, complemented.
        assert_eq!(packet.checksum(), !0x249b);
    }

    #[test]
    fn corrupted_body_fails() {
        let mut bytes = RPL_DAO_BYTES;
        let mut packet = Packet::new_unchecked(&mut bytes[..]);
        packet.fill_checksum();
        packet.payload_mut()[3] ^= 0x10;
        assert!(!packet.verify_checksum());
    }

    #[test]
    fn truncated() {
        assert_eq!(
            Packet::new_checked(&[0x9b, 0x01, 0x00][..]).unwrap_err(),
            Error::Truncated
        );
    }
}
