//! Per-chain tip state and the cross-chain admission protocol.
//!
//! `LatticeData` is the single authoritative record of admitted blocks. It
//! validates incoming blocks through a staged pipeline — position, parent
//! continuity, ack shape, ack existence, ack monotonicity, timestamp window —
//! each stage fatal on its own, and it fills the lattice-derived fields of
//! locally proposed blocks.

use crate::error::LatticeError;
use braid_types::{Ack, Block, BlockHash, LatticeConfig, Position, Timestamp};
use std::collections::BTreeMap;

/// Admission state of one chain.
struct ChainStatus {
    /// Highest admitted block.
    tip: Option<Block>,
    /// Hash and proposal timestamp of every admitted height, for ack
    /// existence checks and timestamp windows.
    by_height: BTreeMap<u64, (BlockHash, Timestamp)>,
}

impl ChainStatus {
    fn new() -> Self {
        Self {
            tip: None,
            by_height: BTreeMap::new(),
        }
    }

    fn tip_height(&self) -> Option<u64> {
        self.tip.as_ref().map(|t| t.position.height)
    }
}

/// Per-chain tip state and cross-chain ack validation.
pub struct LatticeData {
    configs: Vec<LatticeConfig>,
    chains: Vec<ChainStatus>,
    /// `acked_height[observer][observed]` — the height of the last ack the
    /// observer chain issued for the observed chain. Strictly advancing.
    acked_height: Vec<Vec<Option<u64>>>,
}

impl LatticeData {
    /// Construct with the genesis round's configuration.
    pub fn new(genesis_config: LatticeConfig) -> Self {
        let n = genesis_config.num_chains as usize;
        Self {
            configs: vec![genesis_config],
            chains: (0..n).map(|_| ChainStatus::new()).collect(),
            acked_height: vec![vec![None; n]; n],
        }
    }

    /// The latest round a configuration exists for.
    pub fn last_round(&self) -> u64 {
        self.configs.len() as u64 - 1
    }

    pub fn config(&self, round: u64) -> Option<&LatticeConfig> {
        self.configs.get(round as usize)
    }

    /// The tip of `chain_id`, if it has admitted any block.
    pub fn tip(&self, chain_id: u32) -> Option<&Block> {
        self.chains.get(chain_id as usize)?.tip.as_ref()
    }

    /// Whether the block at `(chain_id, height)` with `hash` is admitted.
    pub fn contains(&self, chain_id: u32, height: u64, hash: &BlockHash) -> bool {
        self.chains
            .get(chain_id as usize)
            .and_then(|c| c.by_height.get(&height))
            .is_some_and(|(h, _)| h == hash)
    }

    /// The position the next block on `chain_id` must claim.
    pub fn next_position(&self, chain_id: u32) -> Position {
        match self.tip(chain_id) {
            Some(tip) => Position::new(
                tip.position.round,
                chain_id,
                tip.position.height + 1,
            ),
            None => Position::new(0, chain_id, 0),
        }
    }

    /// Fill position, parent, acks, and timestamp of a block the local node
    /// is proposing on `b.position.chain_id`.
    ///
    /// Policy: ack the current tip of every other chain whose view has
    /// advanced since this chain's last ack of it; the timestamp is
    /// `propose_time` clamped into the window spanned by the acked blocks.
    pub fn prepare_block(
        &self,
        b: &mut Block,
        propose_time: Timestamp,
    ) -> Result<(), LatticeError> {
        let chain_id = b.position.chain_id;
        let status = self
            .chains
            .get(chain_id as usize)
            .ok_or(LatticeError::IncorrectBlockPosition)?;

        let (round, height, parent) = match &status.tip {
            Some(tip) => {
                // Honor a caller-requested round bump into an appended config.
                let tip_round = tip.position.round;
                let round = if b.position.round == tip_round + 1
                    && b.position.round <= self.last_round()
                {
                    b.position.round
                } else {
                    tip_round
                };
                (round, tip.position.height + 1, tip.hash)
            }
            None => (b.position.round.min(self.last_round()), 0, BlockHash::ZERO),
        };
        let cfg = self
            .config(round)
            .ok_or(LatticeError::IncorrectBlockPosition)?;
        if chain_id >= cfg.num_chains {
            return Err(LatticeError::IncorrectBlockPosition);
        }

        let mut acks: Vec<Ack> = Vec::new();
        let mut window_base: Option<Timestamp> = status.tip.as_ref().map(|t| t.timestamp);
        for observed in 0..cfg.num_chains {
            if observed == chain_id {
                continue;
            }
            let Some(tip) = self.tip(observed) else {
                continue;
            };
            let advanced = self.acked_height[chain_id as usize][observed as usize]
                .is_none_or(|last| tip.position.height > last);
            if advanced {
                acks.push(Ack::new(observed, tip.position.height, tip.hash));
                window_base = Some(match window_base {
                    Some(base) => base.max(tip.timestamp),
                    None => tip.timestamp,
                });
            }
        }

        b.position = Position::new(round, chain_id, height);
        b.parent = parent;
        b.acks = acks;
        b.timestamp = match window_base {
            Some(base) => {
                let floor = base.saturating_add(cfg.min_block_interval);
                let ceiling = base.saturating_add(cfg.max_block_interval);
                propose_time.max(floor).min(ceiling)
            }
            None => propose_time,
        };
        Ok(())
    }

    /// Check a block against the current lattice state without admitting it.
    ///
    /// Stages run in order and each failure is fatal for this attempt;
    /// only `AckingBlockNotExists` invites a retry after the lattice advances.
    pub fn sanity_check(&self, b: &Block) -> Result<(), LatticeError> {
        let chain_id = b.position.chain_id;
        let round = b.position.round;

        // Stage 1: position against the round's configuration.
        let cfg = self
            .config(round)
            .ok_or(LatticeError::IncorrectBlockPosition)?;
        if chain_id >= cfg.num_chains {
            return Err(LatticeError::IncorrectBlockPosition);
        }
        let status = &self.chains[chain_id as usize];
        if let Some(tip) = &status.tip {
            let tip_round = tip.position.round;
            if round < tip_round || round > tip_round + 1 {
                return Err(LatticeError::IncorrectBlockPosition);
            }
        }

        // Stage 2: parent/height continuity on the block's own chain.
        match status.tip_height() {
            None => {
                if b.position.height > 0 {
                    // The chain's earlier blocks have not arrived yet.
                    return Err(LatticeError::AckingBlockNotExists);
                }
                if !b.parent.is_zero() {
                    return Err(LatticeError::IncorrectBlockPosition);
                }
            }
            Some(tip_height) => {
                if b.position.height <= tip_height {
                    return Err(LatticeError::IncorrectBlockPosition);
                }
                if b.position.height > tip_height + 1 {
                    return Err(LatticeError::AckingBlockNotExists);
                }
                let tip = status.tip.as_ref().expect("tip height implies tip");
                if b.parent != tip.hash {
                    return Err(LatticeError::IncorrectBlockPosition);
                }
            }
        }

        // Stage 3: ack shape, then ack existence.
        let mut prev_chain: Option<u32> = None;
        for ack in &b.acks {
            if ack.chain_id == chain_id {
                return Err(LatticeError::SelfAck {
                    chain_id: ack.chain_id,
                });
            }
            if ack.chain_id >= self.chains.len() as u32 {
                return Err(LatticeError::IncorrectBlockPosition);
            }
            if let Some(prev) = prev_chain {
                if ack.chain_id == prev {
                    return Err(LatticeError::DuplicateAck {
                        chain_id: ack.chain_id,
                    });
                }
                if ack.chain_id < prev {
                    return Err(LatticeError::AcksNotSorted);
                }
            }
            prev_chain = Some(ack.chain_id);
        }
        for ack in &b.acks {
            if !self.contains(ack.chain_id, ack.height, &ack.hash) {
                return Err(LatticeError::AckingBlockNotExists);
            }
        }

        // Stage 4: every (proposer, observed) ack height strictly advances.
        for ack in &b.acks {
            if let Some(last) = self.acked_height[chain_id as usize][ack.chain_id as usize] {
                if ack.height <= last {
                    return Err(LatticeError::NonMonotonicAckHeight {
                        chain_id: ack.chain_id,
                        last_height: last,
                    });
                }
            }
        }

        // Stage 5: timestamp window against the acked blocks and the parent.
        let mut window_base: Option<Timestamp> =
            status.tip.as_ref().map(|t| t.timestamp);
        for ack in &b.acks {
            let (_, ts) = self.chains[ack.chain_id as usize].by_height[&ack.height];
            window_base = Some(match window_base {
                Some(base) => base.max(ts),
                None => ts,
            });
        }
        if let Some(base) = window_base {
            let floor = base.saturating_add(cfg.min_block_interval);
            let ceiling = base.saturating_add(cfg.max_block_interval);
            if b.timestamp < floor || b.timestamp > ceiling {
                return Err(LatticeError::TimestampOutOfWindow);
            }
        }

        Ok(())
    }

    /// Admit a block. Must only be called after [`Self::sanity_check`]
    /// succeeded; still guards continuity so a duplicate admission fails
    /// without touching state.
    pub fn add_block(&mut self, b: &Block) -> Result<(), LatticeError> {
        let chain_id = b.position.chain_id as usize;
        let status = self
            .chains
            .get(chain_id)
            .ok_or(LatticeError::IncorrectBlockPosition)?;
        let expected = status.tip_height().map_or(0, |h| h + 1);
        if b.position.height != expected {
            return Err(LatticeError::IncorrectBlockPosition);
        }

        let status = &mut self.chains[chain_id];
        status
            .by_height
            .insert(b.position.height, (b.hash, b.timestamp));
        status.tip = Some(b.clone());
        for ack in &b.acks {
            self.acked_height[chain_id][ack.chain_id as usize] = Some(ack.height);
        }
        tracing::debug!(block = %b.hash, position = %b.position, "block admitted");
        Ok(())
    }

    /// Append the configuration for the next round.
    pub fn append_config(
        &mut self,
        round: u64,
        config: LatticeConfig,
    ) -> Result<(), LatticeError> {
        let expected = self.configs.len() as u64;
        if round != expected {
            return Err(LatticeError::ConfigOutOfOrder { round, expected });
        }
        let n = config.num_chains as usize;
        while self.chains.len() < n {
            self.chains.push(ChainStatus::new());
        }
        for row in &mut self.acked_height {
            while row.len() < n {
                row.push(None);
            }
        }
        while self.acked_height.len() < n {
            self.acked_height.push(vec![None; n]);
        }
        self.configs.push(config);
        Ok(())
    }
}
