//! Blocks and cross-chain acknowledgements.

use crate::hash::BlockHash;
use crate::keys::{NodeId, Signature};
use crate::position::Position;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A cross-chain acknowledgement: the proposer has observed the block with
/// `hash` at `height` on `chain_id`.
///
/// The derived ordering is `(chain_id, height, hash)` — the canonical sort
/// order for a block's ack list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ack {
    pub chain_id: u32,
    pub height: u64,
    pub hash: BlockHash,
}

impl Ack {
    pub fn new(chain_id: u32, height: u64, hash: BlockHash) -> Self {
        Self {
            chain_id,
            height,
            hash,
        }
    }
}

/// An application-supplied attestation attached to each block.
///
/// Opaque to the consensus core; it rides along and is covered by the block
/// hash through the digest of its data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub height: u64,
    pub data: Vec<u8>,
}

/// A block on one chain of the lattice.
///
/// `hash` and `signature` are filled by the authenticator after every other
/// field is final; neither is an input to the canonical hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Identity of the proposing notary node.
    pub proposer: NodeId,
    /// The slot this block occupies.
    pub position: Position,
    /// Hash of the previous block on the same chain; zero for genesis.
    pub parent: BlockHash,
    /// Cross-chain acks, sorted ascending by `(chain_id, height)`, at most
    /// one per chain, never the proposer's own chain.
    pub acks: Vec<Ack>,
    /// Proposal time claimed by the proposer.
    pub timestamp: Timestamp,
    /// Application payload bytes.
    pub payload: Vec<u8>,
    /// Application witness attestation.
    pub witness: Witness,
    /// Final timestamp assigned at delivery; `EPOCH` until then.
    pub consensus_timestamp: Timestamp,
    /// Canonical content hash.
    pub hash: BlockHash,
    /// Proposer's signature over `hash`.
    pub signature: Signature,
}

impl Block {
    /// A block is genesis iff it sits at height zero with no parent.
    pub fn is_genesis(&self) -> bool {
        self.position.height == 0 && self.parent.is_zero()
    }

    /// The ack this block carries for `chain_id`, if any.
    pub fn ack_for_chain(&self, chain_id: u32) -> Option<&Ack> {
        self.acks.iter().find(|a| a.chain_id == chain_id)
    }
}
