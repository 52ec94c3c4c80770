/*! Access to the radio.

The `phy` module deals with the *radio*. It provides a trait for transmitting and receiving
IEEE 802.15.4 frames, [Radio](trait.Radio.html), and one implementation of it:

  * the [_loopback_](struct.Loopback.html), an in-memory medium for testing and simulation.

Frames handed to and taken from a radio start at the MAC header and end with the frame check
sequence. Radios compute and verify the frame check sequence themselves, so the bytes the
stack sees through a token never include it.

# Examples

An implementation of the [Radio](trait.Radio.html) trait for a simple transceiver could look
as follows:

```rust
use smolrpl::Result;
use smolrpl::phy::{self, Radio, RadioCapabilities};
use smolrpl::time::Instant;

struct Cc2420 {
    rx_buffer: [u8; 127],
    tx_buffer: [u8; 127],
}

impl<'a> Radio<'a> for Cc2420 {
    type RxToken = Cc2420RxToken<'a>;
    type TxToken = Cc2420TxToken<'a>;

    fn receive(&'a mut self) -> Option<Self::RxToken> {
        Some(Cc2420RxToken(&mut self.rx_buffer[..]))
    }

    fn transmit(&'a mut self) -> Option<Self::TxToken> {
        Some(Cc2420TxToken(&mut self.tx_buffer[..]))
    }

    fn capabilities(&self) -> RadioCapabilities {
        RadioCapabilities::default()
    }
}

struct Cc2420RxToken<'a>(&'a mut [u8]);

impl<'a> phy::RxToken for Cc2420RxToken<'a> {
    fn consume<R, F>(mut self, _timestamp: Instant, f: F) -> Result<R>
        where F: FnOnce(&mut [u8]) -> Result<R>
    {
        // TODO: receive frame into buffer
        let result = f(&mut self.0);
        println!("rx called");
        result
    }
}

struct Cc2420TxToken<'a>(&'a mut [u8]);

impl<'a> phy::TxToken for Cc2420TxToken<'a> {
    fn consume<R, F>(self, _timestamp: Instant, len: usize, f: F) -> Result<R>
        where F: FnOnce(&mut [u8]) -> Result<R>
    {
        let result = f(&mut self.0[..len]);
        println!("tx called {}", len);
        // TODO: send frame
        result
    }
}
```
*/

use crate::time::Instant;
use crate::Result;

mod loopback;

pub use self::loopback::{Frame, Loopback, LOOPBACK_QUEUE_LEN};

/// Largest PHY payload of an IEEE 802.15.4 frame, frame check sequence included.
pub const MAX_FRAME_LEN: usize = 127;

/// A description of radio capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct RadioCapabilities {
    /// Largest frame the radio can send or receive, frame check sequence included.
    pub max_frame_len: usize,
}

impl Default for RadioCapabilities {
    fn default() -> Self {
        RadioCapabilities {
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

/// An interface for sending and receiving raw IEEE 802.15.4 frames.
///
/// The interface is based on _tokens_, which are types that allow to receive/transmit a
/// single frame. The `receive` and `transmit` functions only construct such tokens, the
/// real sending/receiving operation are performed when the tokens are consumed.
pub trait Radio<'a> {
    type RxToken: RxToken + 'a;
    type TxToken: TxToken + 'a;

    /// Construct a token for the next received frame, if there is one.
    fn receive(&'a mut self) -> Option<Self::RxToken>;

    /// Construct a transmit token, if the radio can take a frame.
    fn transmit(&'a mut self) -> Option<Self::TxToken>;

    /// Get a description of radio capabilities.
    fn capabilities(&self) -> RadioCapabilities;
}

/// A token to receive a single frame.
pub trait RxToken {
    /// Consumes the token to receive a single frame.
    ///
    /// This method receives a frame and then calls the given closure `f` with the raw
    /// frame bytes, without the frame check sequence, as argument.
    fn consume<R, F>(self, timestamp: Instant, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> Result<R>;
}

/// A token to transmit a single frame.
pub trait TxToken {
    /// Consumes the token to send a single frame.
    ///
    /// This method constructs a transmit buffer of size `len` and calls the passed
    /// closure `f` with a mutable reference to that buffer. The closure should write the
    /// MAC header and payload into it. When the closure returns, the radio appends the frame
    /// check sequence and sends the frame out.
    fn consume<R, F>(self, timestamp: Instant, len: usize, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> Result<R>;
}
