use heapless::Deque;

use crate::storage::Component;
use crate::wire::AddressKind;

/// Default number of diagnostics kept before the oldest get overwritten.
pub const DIAGNOSTICS_CAPACITY: usize = 8;

/// A non-fatal event worth reporting.
///
/// None of these stop the node. They are recorded, logged, and the operation that raised them
/// either continues with a safe default or is abandoned for this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    /// The packet pool was empty.
    NoFreePacketBuffer { component: Component },
    /// A frame header used the reserved addressing mode. `position` is 1 for the
    /// destination and 2 for the source.
    UnsupportedAddressingMode { position: u8, mode: u8 },
    /// A send completion arrived for a buffer this component did not create.
    UnexpectedSendDone { creator: Component },
    /// An externally supplied input had the wrong length.
    InputBufferLength { length: usize },
    /// An address of the wrong kind was handed to a layer.
    WrongAddressType { kind: AddressKind, position: u8 },
    /// A control message failed checksum verification.
    ChecksumMismatch,
    /// A task was dropped because the task queue was full.
    TaskQueueFull,
}

/// A bounded record of recent diagnostics.
///
/// When the record is full, pushing overwrites the oldest entry.
#[derive(Debug)]
pub struct Diagnostics<const N: usize = DIAGNOSTICS_CAPACITY> {
    storage: Deque<Diagnostic, N>,
    /// Counts the number of diagnostics never inspected.
    discarded: usize,
    /// Counter of all diagnostics having entered the record.
    number: usize,
}

impl<const N: usize> Default for Diagnostics<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Diagnostics<N> {
    pub const fn new() -> Self {
        Diagnostics {
            storage: Deque::new(),
            discarded: 0,
            number: 0,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        net_debug!("diagnostic: {:?}", diagnostic);
        self.number += 1;
        if let Err(diagnostic) = self.storage.push_back(diagnostic) {
            self.discarded += 1;
            self.storage.pop_front();
            let _ = self.storage.push_back(diagnostic);
        }
    }

    /// Retrieve the oldest diagnostic.
    pub fn pop(&mut self) -> Option<Diagnostic> {
        self.storage.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.storage.iter()
    }

    /// Query whether a matching diagnostic is still in the record.
    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.storage.iter().any(|d| d == diagnostic)
    }

    /// Reset the record and all counters.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.discarded = 0;
        self.number = 0;
    }

    /// How many diagnostics were overwritten before being inspected.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Current number of diagnostics in the record.
    pub fn unhandled(&self) -> usize {
        self.storage.len()
    }

    /// Report the total number of diagnostics, discarded and unhandled.
    pub fn total(&self) -> usize {
        self.number
    }

    pub fn capacity(&self) -> usize {
        N
    }
}
