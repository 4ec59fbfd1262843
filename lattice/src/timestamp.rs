//! Consensus timestamp assignment over delivered batches.
//!
//! Each delivered block is stamped with the median of its own proposal
//! timestamp and the proposal timestamps of the blocks it directly acks,
//! then pushed forward a nanosecond past the previous stamp so the global
//! sequence is strictly increasing.

use crate::error::LatticeError;
use braid_types::{Block, Timestamp};
use std::collections::BTreeMap;

/// Stateful timestamp assigner; lives as long as the lattice.
pub struct ConsensusTimestamp {
    /// Per chain: proposal timestamps of delivered blocks, by height.
    /// Acks always point at delivered blocks, so lookups never miss.
    chain_ts: Vec<BTreeMap<u64, Timestamp>>,
    /// Per chain: the next height expected from total ordering.
    expected: Vec<u64>,
    /// The last consensus timestamp handed out.
    last_ts: Timestamp,
}

impl ConsensusTimestamp {
    pub fn new(num_chains: u32) -> Self {
        let n = num_chains as usize;
        Self {
            chain_ts: (0..n).map(|_| BTreeMap::new()).collect(),
            expected: vec![0; n],
            last_ts: Timestamp::EPOCH,
        }
    }

    /// Grow to a new round's chain count.
    pub fn append_config(&mut self, num_chains: u32) {
        while self.chain_ts.len() < num_chains as usize {
            self.chain_ts.push(BTreeMap::new());
            self.expected.push(0);
        }
    }

    /// The last consensus timestamp assigned.
    pub fn last_timestamp(&self) -> Timestamp {
        self.last_ts
    }

    /// Stamp one delivered batch in place.
    ///
    /// Fails with `BatchNotContinuous` when a chain's delivered heights skip,
    /// or when an ack points at a block that was never delivered — both mean
    /// the ordering precondition upstream is broken.
    pub fn process_batch(&mut self, batch: &mut [Block]) -> Result<(), LatticeError> {
        // Record proposal times and check per-chain continuity first so a
        // failed batch leaves no partial stamps behind.
        for b in batch.iter() {
            let c = b.position.chain_id as usize;
            if c >= self.expected.len() || b.position.height != self.expected[c] {
                return Err(LatticeError::BatchNotContinuous {
                    chain_id: b.position.chain_id,
                });
            }
            self.expected[c] = b.position.height + 1;
        }
        for b in batch.iter() {
            self.chain_ts[b.position.chain_id as usize]
                .insert(b.position.height, b.timestamp);
        }

        for b in batch.iter_mut() {
            let mut times: Vec<Timestamp> = Vec::with_capacity(b.acks.len() + 1);
            for ack in &b.acks {
                let ts = self
                    .chain_ts
                    .get(ack.chain_id as usize)
                    .and_then(|m| m.get(&ack.height))
                    .copied()
                    .ok_or(LatticeError::BatchNotContinuous {
                        chain_id: ack.chain_id,
                    })?;
                times.push(ts);
            }
            times.push(b.timestamp);
            times.sort();
            let median = times[times.len() / 2];

            let stamped = median.max(self.last_ts.next());
            b.consensus_timestamp = stamped;
            self.last_ts = stamped;
        }
        Ok(())
    }
}
