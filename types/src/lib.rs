//! Fundamental types for the Braid consensus core.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: hashes, node identities, block positions, cross-chain acks,
//! blocks, timestamps, and per-round configuration.

pub mod block;
pub mod config;
pub mod hash;
pub mod keys;
pub mod position;
pub mod time;

pub use block::{Ack, Block, Witness};
pub use config::LatticeConfig;
pub use hash::BlockHash;
pub use keys::{KeyPair, NodeId, PrivateKey, PublicKey, Signature};
pub use position::Position;
pub use time::Timestamp;
