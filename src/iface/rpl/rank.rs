//! The Rank of a node within a DODAG.
//!
//! A Rank can be thought of as a fixed-point number, where the position of the radix point between
//! the integer part and the fractional part is determined by `MinHopRankIncrease`.
//!
//! Meaning of the comparison:
//! - **Rank M is less than Rank N**: the position of M is closer to the DODAG root than the position
//! of N. Node M may safely be a DODAG parent for node N.
//! - **Rank M is greater than Rank N**: node M may be in the sub-DODAG of node N.
//!
//! Ranks compare on their raw value, so two neighbors within the same hop band are still ordered.

use super::consts::{DEFAULT_MIN_HOP_RANK_INCREASE, RANK_UNDEFINED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rank {
    value: u16,
}

impl core::fmt::Display for Rank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_defined() {
            write!(f, "Rank({:#06x})", self.value)
        } else {
            write!(f, "Rank(undefined)")
        }
    }
}

impl Rank {
    /// The rank of a node that has not joined a DODAG.
    pub const UNDEFINED: Self = Rank::new(RANK_UNDEFINED);

    /// The ROOT_RANK is the smallest rank a DODAG root announces.
    /// DAG_RANK(ROOT_RANK) should be 1. See RFC6550 § 17.
    pub const ROOT: Self = Rank::new(DEFAULT_MIN_HOP_RANK_INCREASE);

    pub const fn new(value: u16) -> Self {
        Self { value }
    }

    /// Return the integer part of the Rank.
    pub fn dag_rank(&self) -> u16 {
        self.value / DEFAULT_MIN_HOP_RANK_INCREASE
    }

    /// Return the raw Rank value.
    pub fn raw_value(&self) -> u16 {
        self.value
    }

    pub fn is_defined(&self) -> bool {
        self.value != RANK_UNDEFINED
    }

    /// Return the rank of a child of a node with this rank.
    pub fn child(&self) -> Rank {
        Rank::new(self.value.saturating_add(DEFAULT_MIN_HOP_RANK_INCREASE))
    }
}

impl From<u16> for Rank {
    fn from(value: u16) -> Self {
        Rank::new(value)
    }
}
