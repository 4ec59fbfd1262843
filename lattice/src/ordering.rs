//! The total-ordering kernel.
//!
//! Consumes strongly-acked blocks (per chain in ascending height, arbitrary
//! interleaving across chains) and emits deterministic delivery batches. A
//! batch is delivered *normally* once the candidate front is provably stable
//! against any future input; it is delivered *early* when a silent chain
//! withholds the information needed for stability and the remaining chains
//! have crossed the threshold K heights past the candidates.
//!
//! Stability is decided with acking-height vectors: `grade(u, v) = 0` means
//! that even with every missing chain's future acks, `u` can never come to
//! precede `v`, because ack counts only grow and `v` already leads on enough
//! chains. A candidate all other candidates grade 0 against is permanently
//! undominated; delivering exactly that set makes the output a function of
//! the input multiset, not its arrival order.

use crate::error::LatticeError;
use braid_types::{Block, BlockHash, LatticeConfig};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// One delivery batch, blocks in ascending hash order.
#[derive(Clone, Debug)]
pub struct DeliveredBatch {
    pub blocks: Vec<Block>,
    pub early: bool,
}

struct PendingBlock {
    block: Block,
    /// `(chain, height)` of the parent plus every ack.
    refs: Vec<(u32, u64)>,
    /// chain → minimum height of a pending block on that chain that
    /// transitively references this one (a block references itself).
    acked_by: BTreeMap<u32, u64>,
}

struct RoundSetup {
    num_chains: u32,
    k: u64,
    phi: usize,
    threshold: usize,
}

impl RoundSetup {
    fn from_config(cfg: &LatticeConfig) -> Self {
        Self {
            num_chains: cfg.num_chains,
            k: cfg.k as u64,
            phi: cfg.phi(),
            threshold: cfg.delivery_threshold(),
        }
    }
}

/// The ordering kernel. See the module docs for the delivery rules.
pub struct TotalOrdering {
    configs: Vec<RoundSetup>,
    /// Round whose `(K, T)` currently apply.
    round: u64,
    pending: HashMap<BlockHash, PendingBlock>,
    /// Per chain: pending hashes, ascending and height-contiguous.
    chains: Vec<VecDeque<BlockHash>>,
    /// Per chain: the next undelivered height.
    next_height: Vec<u64>,
    /// Per chain: round of the latest delivered block.
    delivered_round: Vec<u64>,
}

impl TotalOrdering {
    pub fn new(genesis_config: &LatticeConfig) -> Self {
        let n = genesis_config.num_chains as usize;
        Self {
            configs: vec![RoundSetup::from_config(genesis_config)],
            round: 0,
            pending: HashMap::new(),
            chains: (0..n).map(|_| VecDeque::new()).collect(),
            next_height: vec![0; n],
            delivered_round: vec![0; n],
        }
    }

    /// Append the configuration for the next round. The facade has already
    /// validated the round number.
    pub fn append_config(&mut self, config: &LatticeConfig) {
        let n = config.num_chains as usize;
        while self.chains.len() < n {
            self.chains.push(VecDeque::new());
            self.next_height.push(0);
            self.delivered_round.push(0);
        }
        self.configs.push(RoundSetup::from_config(config));
    }

    /// Blocks received but not yet delivered.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one strongly-acked block; returns every batch it unlocks.
    pub fn process_block(&mut self, block: Block) -> Result<Vec<DeliveredBatch>, LatticeError> {
        let chain_id = block.position.chain_id;
        let height = block.position.height;
        let c = chain_id as usize;
        if c >= self.chains.len() {
            return Err(LatticeError::UnexpectedBlock);
        }
        let expected = self.next_height[c] + self.chains[c].len() as u64;
        if height != expected {
            // Duplicate, gap, or out-of-order input: the reliable-broadcast
            // stage guarantees none of these, so this is a logic error.
            return Err(LatticeError::UnexpectedBlock);
        }

        let mut refs: Vec<(u32, u64)> = Vec::with_capacity(block.acks.len() + 1);
        if height > 0 {
            refs.push((chain_id, height - 1));
        }
        refs.extend(block.acks.iter().map(|a| (a.chain_id, a.height)));

        self.chains[c].push_back(block.hash);
        self.pending.insert(
            block.hash,
            PendingBlock {
                block,
                refs,
                acked_by: BTreeMap::new(),
            },
        );
        self.rebuild_ack_relation();

        let mut batches = Vec::new();
        while let Some(batch) = self.try_deliver() {
            batches.push(batch);
            self.maybe_rollover();
        }
        Ok(batches)
    }

    fn hash_at(&self, chain: u32, height: u64) -> Option<BlockHash> {
        let c = chain as usize;
        let base = *self.next_height.get(c)?;
        let idx = height.checked_sub(base)?;
        self.chains.get(c)?.get(idx as usize).copied()
    }

    fn is_delivered(&self, chain: u32, height: u64) -> bool {
        self.next_height
            .get(chain as usize)
            .is_some_and(|&next| height < next)
    }

    /// Recompute every pending block's acking chains from scratch.
    ///
    /// Chains are walked in ascending id, heights ascending, so the first
    /// marker a chain leaves on a block is its minimum acking height; the
    /// walk stops wherever the chain is already recorded, because that
    /// block's whole ancestry was covered by the earlier marker.
    fn rebuild_ack_relation(&mut self) {
        for p in self.pending.values_mut() {
            p.acked_by.clear();
        }
        let order: Vec<BlockHash> = self
            .chains
            .iter()
            .flat_map(|deque| deque.iter().copied())
            .collect();
        for hash in order {
            let (chain_id, height, refs) = {
                let p = &self.pending[&hash];
                (
                    p.block.position.chain_id,
                    p.block.position.height,
                    p.refs.clone(),
                )
            };
            self.pending
                .get_mut(&hash)
                .expect("ordered hash pending")
                .acked_by
                .entry(chain_id)
                .or_insert(height);
            let mut stack = refs;
            while let Some((rc, rh)) = stack.pop() {
                if self.is_delivered(rc, rh) {
                    continue;
                }
                // A reference neither delivered nor received yet is skipped;
                // the relation is rebuilt when that block arrives.
                let Some(rhash) = self.hash_at(rc, rh) else {
                    continue;
                };
                let p = self.pending.get_mut(&rhash).expect("charted hash pending");
                if let std::collections::btree_map::Entry::Vacant(e) =
                    p.acked_by.entry(chain_id)
                {
                    e.insert(height);
                    stack.extend(p.refs.iter().copied());
                }
            }
        }
    }

    /// Attempt one delivery against the current state.
    fn try_deliver(&mut self) -> Option<DeliveredBatch> {
        let setup = &self.configs[self.round as usize];
        let n = setup.num_chains as usize;

        // Candidates: chain fronts whose references are all delivered.
        let mut candidates: Vec<BlockHash> = Vec::new();
        for c in 0..n.min(self.chains.len()) {
            let Some(&front) = self.chains[c].front() else {
                continue;
            };
            let p = &self.pending[&front];
            if p.refs.iter().all(|&(rc, rh)| self.is_delivered(rc, rh)) {
                candidates.push(front);
            }
        }
        if candidates.is_empty() {
            return None;
        }

        // Acking-height vectors over the active chains. `u64::MAX` stands
        // for "this chain has pending blocks and none of them acks the
        // candidate"; a chain with nothing pending contributes no entry.
        let m = candidates.len();
        let mut ahv: Vec<Vec<Option<u64>>> = Vec::with_capacity(m);
        let mut abs: Vec<usize> = Vec::with_capacity(m);
        for hash in &candidates {
            let p = &self.pending[hash];
            let row: Vec<Option<u64>> = (0..n as u32)
                .map(|c| match p.acked_by.get(&c) {
                    Some(&h) => Some(h),
                    None if self.chains[c as usize].is_empty() => None,
                    None => Some(u64::MAX),
                })
                .collect();
            ahv.push(row);
            abs.push(p.acked_by.len());
        }

        let phi = setup.phi;
        let grade = |u: usize, v: usize| -> i8 {
            let mut wins = 0usize;
            for c in 0..n {
                if let (Some(a), Some(b)) = (ahv[u][c], ahv[v][c]) {
                    if a < b {
                        wins += 1;
                    }
                }
            }
            if wins > phi {
                1
            } else if (wins as i64) < phi as i64 - n as i64 + abs[v] as i64 {
                0
            } else {
                -1
            }
        };

        // A candidate is preceding when no other candidate can ever come to
        // precede it, regardless of future acks.
        let preceding: Vec<bool> = (0..m)
            .map(|x| (0..m).all(|y| y == x || grade(y, x) == 0))
            .collect();
        let internally_stable = (0..m)
            .filter(|&y| !preceding[y])
            .all(|y| (0..m).any(|x| preceding[x] && grade(x, y) == 1));
        let externally_stable = (0..m)
            .filter(|&x| preceding[x])
            .all(|x| abs[x] >= setup.threshold);

        if preceding.iter().any(|&p| p) && internally_stable && externally_stable {
            let delivered: Vec<BlockHash> = candidates
                .iter()
                .zip(&preceding)
                .filter(|(_, &p)| p)
                .map(|(h, _)| *h)
                .collect();
            return Some(self.deliver(delivered, false));
        }

        // Early delivery: the candidates span at least K+1 chains, each
        // candidate's own chain has run K heights past it without the order
        // becoming decidable, and the union of acking chains crosses T.
        let k = setup.k;
        let spans = candidates.len() as u64;
        let advanced = candidates.iter().all(|hash| {
            let p = &self.pending[hash];
            let c = p.block.position.chain_id as usize;
            let latest = self.next_height[c] + self.chains[c].len() as u64 - 1;
            latest >= p.block.position.height + k
        });
        let union: BTreeSet<u32> = candidates
            .iter()
            .flat_map(|h| self.pending[h].acked_by.keys().copied())
            .collect();
        if spans >= k + 1 && advanced && union.len() >= setup.threshold {
            return Some(self.deliver(candidates, true));
        }

        None
    }

    /// Remove the given chain fronts from the pending state and emit them
    /// in ascending hash order.
    fn deliver(&mut self, hashes: Vec<BlockHash>, early: bool) -> DeliveredBatch {
        let mut blocks: Vec<Block> = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let p = self.pending.remove(&hash).expect("delivered hash pending");
            let c = p.block.position.chain_id as usize;
            let front = self.chains[c].pop_front();
            debug_assert_eq!(front, Some(hash));
            self.next_height[c] = p.block.position.height + 1;
            self.delivered_round[c] = p.block.position.round;
            blocks.push(p.block);
        }
        blocks.sort_by_key(|b| b.hash);
        tracing::debug!(count = blocks.len(), early, "total ordering delivered");
        DeliveredBatch { blocks, early }
    }

    /// Swap to the next round's parameters once every active chain has
    /// delivered a block of that round.
    fn maybe_rollover(&mut self) {
        while (self.round as usize + 1) < self.configs.len() {
            let next = self.round + 1;
            let active = self.configs[self.round as usize].num_chains as usize;
            let all_rolled = (0..active).all(|c| self.delivered_round[c] >= next);
            if !all_rolled {
                break;
            }
            self.round = next;
            tracing::info!(round = next, "total ordering config rollover");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_types::{Ack, Position};

    fn config() -> LatticeConfig {
        LatticeConfig::default() // N=4, K=1, phi=2, T=3
    }

    fn block(chain_id: u32, height: u64, parent: BlockHash, acks: Vec<Ack>, tag: u8) -> Block {
        Block {
            position: Position::new(0, chain_id, height),
            parent,
            acks,
            hash: BlockHash::new([tag; 32]),
            ..Block::default()
        }
    }

    /// Genesis blocks for `chains` chains plus height-1 blocks each acking
    /// the other listed chains' genesis.
    fn committee(chains: &[u32]) -> (Vec<Block>, Vec<Block>) {
        let genesis: Vec<Block> = chains
            .iter()
            .map(|&c| block(c, 0, BlockHash::ZERO, vec![], 0x10 + c as u8))
            .collect();
        let children: Vec<Block> = chains
            .iter()
            .map(|&c| {
                let acks = chains
                    .iter()
                    .filter(|&&o| o != c)
                    .map(|&o| {
                        let g = genesis.iter().find(|g| g.position.chain_id == o).unwrap();
                        Ack::new(o, 0, g.hash)
                    })
                    .collect();
                let parent = genesis.iter().find(|g| g.position.chain_id == c).unwrap();
                block(c, 1, parent.hash, acks, 0x20 + c as u8)
            })
            .collect();
        (genesis, children)
    }

    fn feed(to: &mut TotalOrdering, blocks: &[Block]) -> Vec<DeliveredBatch> {
        let mut all = Vec::new();
        for b in blocks {
            all.extend(to.process_block(b.clone()).unwrap());
        }
        all
    }

    fn delivered_hashes(batches: &[DeliveredBatch]) -> Vec<BlockHash> {
        batches
            .iter()
            .flat_map(|b| b.blocks.iter().map(|x| x.hash))
            .collect()
    }

    #[test]
    fn genesis_batch_delivers_normally_after_full_ack() {
        let mut to = TotalOrdering::new(&config());
        let (genesis, children) = committee(&[0, 1, 2, 3]);

        assert!(feed(&mut to, &genesis).is_empty());
        assert!(feed(&mut to, &children[..3]).is_empty());

        let batches = feed(&mut to, &children[3..]);
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].early);

        let mut expected: Vec<BlockHash> = genesis.iter().map(|g| g.hash).collect();
        expected.sort();
        assert_eq!(delivered_hashes(&batches), expected);
    }

    #[test]
    fn batch_is_sorted_by_hash() {
        let mut to = TotalOrdering::new(&config());
        let (genesis, children) = committee(&[0, 1, 2, 3]);
        let mut inputs = genesis.clone();
        inputs.extend(children);
        let batches = feed(&mut to, &inputs);

        for batch in &batches {
            let hashes: Vec<BlockHash> = batch.blocks.iter().map(|b| b.hash).collect();
            let mut sorted = hashes.clone();
            sorted.sort();
            assert_eq!(hashes, sorted);
        }
    }

    #[test]
    fn arrival_order_does_not_change_output() {
        let (genesis, children) = committee(&[0, 1, 2, 3]);

        // Several interleavings that keep per-chain ascending order and feed
        // the genesis front first.
        let orders: Vec<Vec<Block>> = vec![
            {
                let mut v = genesis.clone();
                v.extend(children.clone());
                v
            },
            {
                let mut v = genesis.clone();
                v.extend(children.iter().rev().cloned());
                v
            },
            {
                let mut v: Vec<Block> = genesis.iter().rev().cloned().collect();
                v.extend(children.iter().rev().cloned());
                v
            },
        ];

        let mut outputs = Vec::new();
        for order in orders {
            let mut to = TotalOrdering::new(&config());
            let batches = feed(&mut to, &order);
            outputs.push(delivered_hashes(&batches));
        }
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0], outputs[2]);
    }

    #[test]
    fn stalled_chain_triggers_early_delivery() {
        // Chains 0..2 advance, chain 3 stays silent.
        let mut to = TotalOrdering::new(&config());
        let (genesis, children) = committee(&[0, 1, 2]);

        assert!(feed(&mut to, &genesis).is_empty());
        let mut batches = feed(&mut to, &children[..2]);
        batches.extend(feed(&mut to, &children[2..]));

        assert_eq!(batches.len(), 1);
        assert!(batches[0].early);
        let mut expected: Vec<BlockHash> = genesis.iter().map(|g| g.hash).collect();
        expected.sort();
        assert_eq!(delivered_hashes(&batches), expected);
    }

    #[test]
    fn early_delivery_waits_for_look_back() {
        // With only the genesis blocks of chains 0..2 the union of ackers is
        // wide enough, but no chain has advanced K past its candidate.
        let mut to = TotalOrdering::new(&config());
        let (genesis, _) = committee(&[0, 1, 2]);
        assert!(feed(&mut to, &genesis).is_empty());
    }

    #[test]
    fn early_delivery_respects_threshold() {
        // Only two chains alive: the union of ackers never reaches T=3.
        let mut to = TotalOrdering::new(&config());
        let (genesis, children) = committee(&[0, 1]);
        assert!(feed(&mut to, &genesis).is_empty());
        assert!(feed(&mut to, &children).is_empty());
    }

    #[test]
    fn duplicate_input_is_unexpected() {
        let mut to = TotalOrdering::new(&config());
        let g = block(0, 0, BlockHash::ZERO, vec![], 1);
        to.process_block(g.clone()).unwrap();
        assert!(matches!(
            to.process_block(g),
            Err(LatticeError::UnexpectedBlock)
        ));
    }

    #[test]
    fn height_gap_is_unexpected() {
        let mut to = TotalOrdering::new(&config());
        let g = block(0, 0, BlockHash::ZERO, vec![], 1);
        to.process_block(g.clone()).unwrap();
        let skip = block(0, 2, g.hash, vec![], 2);
        assert!(matches!(
            to.process_block(skip),
            Err(LatticeError::UnexpectedBlock)
        ));
    }

    #[test]
    fn unknown_chain_is_unexpected() {
        let mut to = TotalOrdering::new(&config());
        let b = block(9, 0, BlockHash::ZERO, vec![], 1);
        assert!(matches!(
            to.process_block(b),
            Err(LatticeError::UnexpectedBlock)
        ));
    }

    #[test]
    fn successive_fronts_deliver_as_acks_land() {
        let (genesis, children) = committee(&[0, 1, 2, 3]);
        let mut inputs = genesis.clone();
        inputs.extend(children.clone());

        // Height-2 blocks acking the height-1 blocks of the other chains.
        let grandchildren: Vec<Block> = (0..4u32)
            .map(|c| {
                let acks = (0..4u32)
                    .filter(|&o| o != c)
                    .map(|o| Ack::new(o, 1, children[o as usize].hash))
                    .collect();
                block(c, 2, children[c as usize].hash, acks, 0x30 + c as u8)
            })
            .collect();
        inputs.extend(grandchildren);

        let mut to = TotalOrdering::new(&config());
        let batches = feed(&mut to, &inputs);
        let total: usize = batches.iter().map(|b| b.blocks.len()).sum();
        // Genesis and height-1 batches are out; height-2 blocks wait for
        // their own ackers.
        assert_eq!(total, 8);
        assert_eq!(to.pending_len(), 4);
    }

    #[test]
    fn round_rollover_swaps_parameters() {
        let mut to = TotalOrdering::new(&config());
        to.append_config(&LatticeConfig {
            k: 0,
            ..config()
        });
        assert_eq!(to.round, 0);

        // Chains deliver round-1 genesis blocks: committee flow with every
        // position stamped round 1.
        let (mut genesis, mut children) = committee(&[0, 1, 2, 3]);
        for b in genesis.iter_mut().chain(children.iter_mut()) {
            b.position.round = 1;
        }
        let mut inputs = genesis;
        inputs.extend(children);
        let batches = feed(&mut to, &inputs);
        assert!(!batches.is_empty());
        assert_eq!(to.round, 1);
    }
}
