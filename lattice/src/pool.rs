//! Per-chain buffer for blocks whose ack dependencies are premature.
//!
//! When a block arrives before the blocks it acks (or its own parent), the
//! facade shelves it here. After every admission the lowest buffered block of
//! each chain is re-checked, and blocks the chain has advanced past are
//! purged.

use braid_types::Block;
use std::collections::BTreeMap;

/// Bounded number of buffered blocks per chain.
const MAX_BLOCKS_PER_CHAIN: usize = 1024;

/// Per-chain ordered buffer of premature blocks.
pub struct BlockPool {
    chains: Vec<BTreeMap<u64, Block>>,
}

impl BlockPool {
    pub fn new(num_chains: u32) -> Self {
        Self {
            chains: (0..num_chains).map(|_| BTreeMap::new()).collect(),
        }
    }

    /// Number of chains the pool tracks.
    pub fn num_chains(&self) -> u32 {
        self.chains.len() as u32
    }

    /// Grow the pool when a new round adds chains. Shrinking never drops
    /// buffered blocks; stale chains drain through `purge_below`.
    pub fn resize(&mut self, num_chains: u32) {
        while self.chains.len() < num_chains as usize {
            self.chains.push(BTreeMap::new());
        }
    }

    /// Buffer a block at its (chain, height) slot.
    ///
    /// Duplicates (same slot) and blocks beyond the per-chain bound are
    /// dropped; either way the pool keeps at most one block per slot.
    pub fn add(&mut self, block: Block) {
        let chain_id = block.position.chain_id as usize;
        let Some(chain) = self.chains.get_mut(chain_id) else {
            return;
        };
        if chain.len() >= MAX_BLOCKS_PER_CHAIN {
            tracing::warn!(chain_id, "block pool full, dropping buffered block");
            return;
        }
        chain.entry(block.position.height).or_insert(block);
    }

    /// The lowest-height buffered block for `chain_id`, if any.
    pub fn tip(&self, chain_id: u32) -> Option<&Block> {
        self.chains
            .get(chain_id as usize)?
            .values()
            .next()
    }

    /// Drop the current tip of `chain_id` (after it has been admitted or
    /// proven invalid).
    pub fn remove_tip(&mut self, chain_id: u32) {
        if let Some(chain) = self.chains.get_mut(chain_id as usize) {
            if let Some(&height) = chain.keys().next() {
                chain.remove(&height);
            }
        }
    }

    /// Discard all buffered blocks on `chain_id` with height ≤ `height`;
    /// called after admission of that slot.
    pub fn purge_below(&mut self, chain_id: u32, height: u64) {
        if let Some(chain) = self.chains.get_mut(chain_id as usize) {
            *chain = chain.split_off(&(height + 1));
        }
    }

    /// Total buffered blocks across all chains.
    pub fn len(&self) -> usize {
        self.chains.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.iter().all(|c| c.is_empty())
    }
}
