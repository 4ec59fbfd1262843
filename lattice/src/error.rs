//! Error types for the consensus core.

use braid_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the lattice facade and its subsystems.
///
/// `AckingBlockNotExists` is the only recoverable kind: the facade shelves
/// the block and retries it once its dependencies are admitted. Hash,
/// signature, position, and ack-shape failures are permanent rejections.
/// `UnexpectedBlock` and `BatchNotContinuous` indicate broken preconditions
/// inside the core itself.
#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("hash of block is incorrect")]
    IncorrectHash,

    #[error("signature of block is incorrect")]
    IncorrectSignature,

    #[error("position of block is incorrect")]
    IncorrectBlockPosition,

    #[error("acks are not sorted by (chain, height)")]
    AcksNotSorted,

    #[error("block carries more than one ack for chain {chain_id}")]
    DuplicateAck { chain_id: u32 },

    #[error("block acks its own chain {chain_id}")]
    SelfAck { chain_id: u32 },

    #[error("ack of chain {chain_id} does not advance past height {last_height}")]
    NonMonotonicAckHeight { chain_id: u32, last_height: u64 },

    #[error("block timestamp is outside the acked window")]
    TimestampOutOfWindow,

    #[error("acking block does not exist")]
    AckingBlockNotExists,

    #[error("block rejected by the application")]
    InvalidBlock,

    #[error("genesis block should be empty")]
    GenesisBlockNotEmpty,

    #[error("missing {field} in block")]
    MissingBlockInfo { field: &'static str },

    #[error("unexpected block in total ordering")]
    UnexpectedBlock,

    #[error("delivered batch is not height-continuous on chain {chain_id}")]
    BatchNotContinuous { chain_id: u32 },

    #[error("config for round {round} appended out of order (expected {expected})")]
    ConfigOutOfOrder { round: u64, expected: u64 },

    #[error("lattice has been cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LatticeError {
    /// Whether the block should be shelved in the pool and retried later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LatticeError::AckingBlockNotExists)
    }
}
