//! Block position within the lattice.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The slot a block occupies: a round, a chain, and a height on that chain.
///
/// Heights are dense per chain starting at zero; the round is the
/// configuration epoch the block was proposed under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub round: u64,
    pub chain_id: u32,
    pub height: u64,
}

impl Position {
    pub fn new(round: u64, chain_id: u32, height: u64) -> Self {
        Self {
            round,
            chain_id,
            height,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}:c{}:h{}", self.round, self.chain_id, self.height)
    }
}
