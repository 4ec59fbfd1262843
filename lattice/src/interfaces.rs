//! Seams between the consensus core and its collaborators.
//!
//! Sub-modules never call back into the facade; they return data and the
//! facade dispatches through these traits. Transport and the BA ticker are
//! not consumed by the core and have no seam here.

use braid_types::{Block, BlockHash, LatticeConfig, NodeId, Position, Witness};

/// The application layer the lattice drives.
///
/// Implementations must be safe for concurrent invocation from multiple
/// facades (one per node in simulation).
pub trait Application: Send + Sync {
    /// Payload bytes for a block the local node is about to propose.
    fn prepare_payload(&self, position: Position) -> Vec<u8>;

    /// Witness attestation for a block the local node is about to propose.
    fn prepare_witness(&self, consensus_height: u64) -> Witness;

    /// Application-level validity of a foreign block's payload.
    fn verify_block(&self, block: &Block) -> bool;

    /// A block has been delivered with its final consensus timestamp.
    fn block_delivered(&self, block: Block);
}

/// Optional observation hooks, fired in the order
/// strongly-acked → confirmed → ordering-delivered → delivered.
pub trait DebugHooks: Send + Sync {
    fn strongly_acked(&self, hash: BlockHash);

    fn block_confirmed(&self, hash: BlockHash);

    fn total_ordering_delivered(&self, hashes: Vec<BlockHash>, early: bool);
}

/// Round configuration supplier.
pub trait Governance: Send + Sync {
    /// Configuration for `round`, if already decided.
    fn configuration(&self, round: u64) -> Option<LatticeConfig>;

    /// The notary committee for `round`.
    fn notary_set(&self, round: u64) -> Vec<NodeId>;
}
