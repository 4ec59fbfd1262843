//! Strong-ack extraction over admitted blocks.
//!
//! A block is *strongly acked* once blocks on `2f + 1` distinct chains
//! (counting its own) transitively acknowledge it. Strong ack is monotone —
//! chains are only ever added — and each block is handed to total ordering
//! exactly once, in ascending `(chain_id, height)` order per admission.

use braid_types::{Block, BlockHash, LatticeConfig};
use std::collections::{BTreeSet, HashMap};

struct BlockEntry {
    chain_id: u32,
    height: u64,
    round: u64,
    /// Parent plus ack hashes — the edges the closure walks.
    refs: Vec<BlockHash>,
    /// Chains with an admitted block transitively acking this one.
    acked_chains: BTreeSet<u32>,
    /// The block itself until extraction, then its slot stays for closure
    /// walks until every chain has acked it.
    block: Option<Block>,
}

/// Computes strong-ack closure for admitted blocks and yields the ones ready
/// for total ordering.
pub struct ReliableBroadcast {
    configs: Vec<LatticeConfig>,
    entries: HashMap<BlockHash, BlockEntry>,
}

impl ReliableBroadcast {
    pub fn new(genesis_config: LatticeConfig) -> Self {
        Self {
            configs: vec![genesis_config],
            entries: HashMap::new(),
        }
    }

    pub fn append_config(&mut self, config: LatticeConfig) {
        self.configs.push(config);
    }

    /// Number of blocks still tracked (admitted, not yet acked by every chain).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a newly admitted block, propagate its acks through the closure,
    /// and return every block that just became strongly acked, ascending by
    /// `(chain_id, height)`.
    pub fn process(&mut self, block: &Block) -> Vec<Block> {
        let hash = block.hash;
        let chain_id = block.position.chain_id;

        let mut refs: Vec<BlockHash> = Vec::with_capacity(block.acks.len() + 1);
        if !block.parent.is_zero() {
            refs.push(block.parent);
        }
        refs.extend(block.acks.iter().map(|a| a.hash));

        let mut touched: Vec<BlockHash> = vec![hash];
        self.entries.insert(
            hash,
            BlockEntry {
                chain_id,
                height: block.position.height,
                round: block.position.round,
                refs: refs.clone(),
                acked_chains: BTreeSet::from([chain_id]),
                block: Some(block.clone()),
            },
        );

        // Transitive closure: walk references, stopping wherever this chain
        // already acked (its whole ancestry is then acked too).
        let mut stack = refs;
        while let Some(r) = stack.pop() {
            let Some(entry) = self.entries.get_mut(&r) else {
                // Already acked by every chain and dropped, or delivered.
                continue;
            };
            if entry.acked_chains.insert(chain_id) {
                touched.push(r);
                stack.extend(entry.refs.iter().copied());
            }
        }

        // Extract every touched block that crossed its round's threshold.
        let mut ready: Vec<(u32, u64, Block)> = Vec::new();
        for h in &touched {
            let entry = self.entries.get_mut(h).expect("touched entry present");
            let threshold = self
                .configs
                .get(entry.round as usize)
                .map_or(usize::MAX, LatticeConfig::strong_ack_threshold);
            if entry.block.is_some() && entry.acked_chains.len() >= threshold {
                let block = entry.block.take().expect("unextracted entry holds block");
                tracing::debug!(block = %h, "block strongly acked");
                ready.push((entry.chain_id, entry.height, block));
            }
        }

        // Entries acked by all chains can never gain information; once
        // extracted they are dead weight for the closure walk as well.
        for h in &touched {
            let entry = &self.entries[h];
            let num_chains = self
                .configs
                .get(entry.round as usize)
                .map_or(u32::MAX, |c| c.num_chains);
            if entry.block.is_none() && entry.acked_chains.len() >= num_chains as usize {
                self.entries.remove(h);
            }
        }

        ready.sort_by_key(|(c, h, _)| (*c, *h));
        ready.into_iter().map(|(_, _, b)| b).collect()
    }
}
