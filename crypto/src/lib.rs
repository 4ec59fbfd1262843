//! Cryptographic primitives for the Braid consensus core.
//!
//! - [`hash`] — Blake2b-256 hashing and the canonical block/payload digests.
//! - [`keys`] — Ed25519 key generation and node identity derivation.
//! - [`sign`] — Ed25519 signing of canonical block digests.

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi, hash_block, hash_payload};
pub use keys::{generate_keypair, keypair_from_seed, node_id, public_from_private};
pub use sign::{sign_digest, verify_digest};
