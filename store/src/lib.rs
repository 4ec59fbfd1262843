//! Block persistence for the Braid consensus core.
//!
//! The core itself persists nothing beyond what flows through
//! [`BlockDatabase`]; production deployments supply their own backend, tests
//! and simulations use [`MemoryBlockDb`].

pub mod error;
pub mod memory;

pub use error::StoreError;
pub use memory::MemoryBlockDb;

use braid_types::{Block, BlockHash};

/// Storage interface the lattice writes delivered state through.
///
/// Implementations must be safe for concurrent invocation from multiple
/// lattice facades (one per node in simulation).
pub trait BlockDatabase: Send + Sync {
    /// Store a new block. Fails with [`StoreError::AlreadyExists`] if a block
    /// with the same hash is present.
    fn put(&self, block: &Block) -> Result<(), StoreError>;

    /// Overwrite an existing block (e.g. after its consensus timestamp is
    /// assigned). Fails with [`StoreError::NotFound`] if absent.
    fn update(&self, block: &Block) -> Result<(), StoreError>;

    /// Retrieve a block by hash.
    fn get(&self, hash: &BlockHash) -> Result<Block, StoreError>;

    /// Check if a block exists.
    fn contains(&self, hash: &BlockHash) -> Result<bool, StoreError>;
}
