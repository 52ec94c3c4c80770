use byteorder::{ByteOrder, LittleEndian};
use heapless::{Deque, Vec};

use super::{Radio, RadioCapabilities, MAX_FRAME_LEN};
use crate::phy;
use crate::time::Instant;
use crate::wire::ieee802154::{calculate_crc, FCS_LEN};
use crate::{Error, Result};

/// Number of frames each direction of a [Loopback] can hold.
pub const LOOPBACK_QUEUE_LEN: usize = 8;

/// A frame as it travels through the air, frame check sequence included.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// An in-memory radio.
///
/// Transmitted frames collect in an outgoing queue, from where a test harness or a simulated
/// medium takes them with [take_transmitted] and hands them to other radios with [deliver].
/// The frame check sequence is appended on transmit and verified on receive; frames that
/// fail verification are dropped and counted.
///
/// [take_transmitted]: #method.take_transmitted
/// [deliver]: #method.deliver
#[derive(Debug, Default)]
pub struct Loopback {
    rx: Deque<Frame, LOOPBACK_QUEUE_LEN>,
    tx: Deque<Frame, LOOPBACK_QUEUE_LEN>,
    crc_errors: usize,
}

impl Loopback {
    pub fn new() -> Loopback {
        Loopback::default()
    }

    /// Queue a frame for reception.
    ///
    /// Returns `Err(Error::Exhausted)` if the receive queue is full and
    /// `Err(Error::Truncated)` if the frame does not fit in a PHY payload.
    pub fn deliver(&mut self, frame: &[u8]) -> Result<()> {
        let frame = Frame::from_slice(frame).map_err(|_| Error::Truncated)?;
        self.rx.push_back(frame).map_err(|_| Error::Exhausted)
    }

    /// Take the oldest transmitted frame.
    pub fn take_transmitted(&mut self) -> Option<Frame> {
        self.tx.pop_front()
    }

    /// Move every transmitted frame to the receive queue, so the radio hears itself.
    pub fn loop_back(&mut self) {
        while let Some(frame) = self.tx.pop_front() {
            if self.rx.push_back(frame).is_err() {
                net_debug!("loopback: receive queue full");
                break;
            }
        }
    }

    /// Number of frames dropped because of a frame check sequence mismatch.
    pub fn crc_errors(&self) -> usize {
        self.crc_errors
    }

    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }
}

impl<'a> Radio<'a> for Loopback {
    type RxToken = RxToken;
    type TxToken = TxToken<'a>;

    fn receive(&'a mut self) -> Option<Self::RxToken> {
        while let Some(frame) = self.rx.pop_front() {
            if frame.len() < FCS_LEN {
                self.crc_errors += 1;
                continue;
            }
            let (body, fcs) = frame.split_at(frame.len() - FCS_LEN);
            if calculate_crc(body) != LittleEndian::read_u16(fcs) {
                net_debug!("loopback: dropping frame with bad FCS");
                self.crc_errors += 1;
                continue;
            }
            let mut frame = frame;
            frame.truncate(frame.len() - FCS_LEN);
            return Some(RxToken { frame });
        }
        None
    }

    fn transmit(&'a mut self) -> Option<Self::TxToken> {
        if self.tx.is_full() {
            return None;
        }
        Some(TxToken { queue: &mut self.tx })
    }

    fn capabilities(&self) -> RadioCapabilities {
        RadioCapabilities::default()
    }
}

#[doc(hidden)]
pub struct RxToken {
    frame: Frame,
}

impl phy::RxToken for RxToken {
    fn consume<R, F>(mut self, _timestamp: Instant, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> Result<R>,
    {
        f(&mut self.frame)
    }
}

#[doc(hidden)]
pub struct TxToken<'a> {
    queue: &'a mut Deque<Frame, LOOPBACK_QUEUE_LEN>,
}

impl<'a> phy::TxToken for TxToken<'a> {
    fn consume<R, F>(self, _timestamp: Instant, len: usize, f: F) -> Result<R>
    where
        F: FnOnce(&mut [u8]) -> Result<R>,
    {
        if len + FCS_LEN > MAX_FRAME_LEN {
            return Err(Error::Exhausted);
        }

        let mut frame = Frame::new();
        frame
            .resize(len + FCS_LEN, 0)
            .map_err(|_| Error::Exhausted)?;
        let result = f(&mut frame[..len])?;

        let crc = calculate_crc(&frame[..len]);
        LittleEndian::write_u16(&mut frame[len..], crc);
        self.queue.push_back(frame).map_err(|_| Error::Exhausted)?;
        Ok(result)
    }
}
