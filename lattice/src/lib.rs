//! Braid — a block-lattice total-ordering consensus core.
//!
//! A committee of notary nodes produces blocks in parallel, one chain per
//! node, with cross-chain acknowledgements. This crate turns that partially
//! ordered stream into a single deterministic, timestamped delivery sequence,
//! identical on every honest node that has seen the same blocks.
//!
//! ## Module overview
//!
//! - [`authenticator`] — canonical hashing plus Ed25519 sign/verify of blocks.
//! - [`pool`] — per-chain buffer for blocks whose ack dependencies are premature.
//! - [`data`] — per-chain tip state and the cross-chain admission protocol.
//! - [`broadcast`] — strong-ack closure over admitted blocks.
//! - [`ordering`] — the total-ordering kernel (candidate set, preceding set,
//!   normal and early delivery).
//! - [`timestamp`] — consensus timestamp assignment over delivered batches.
//! - [`facade`] — the [`Lattice`] facade orchestrating the above behind one lock.
//! - [`interfaces`] — the application/governance seams the core consumes.
//! - [`error`] — error types.

pub mod authenticator;
pub mod broadcast;
pub mod data;
pub mod error;
pub mod facade;
pub mod interfaces;
pub mod ordering;
pub mod pool;
pub mod timestamp;

pub use authenticator::Authenticator;
pub use broadcast::ReliableBroadcast;
pub use data::LatticeData;
pub use error::LatticeError;
pub use facade::{CancelToken, Lattice, ProcessOutput};
pub use interfaces::{Application, DebugHooks, Governance};
pub use ordering::{DeliveredBatch, TotalOrdering};
pub use pool::BlockPool;
pub use timestamp::ConsensusTimestamp;
