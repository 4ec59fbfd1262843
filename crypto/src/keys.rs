//! Ed25519 key generation and node identity derivation.

use braid_types::{KeyPair, NodeId, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

/// Generate a new Ed25519 key pair from a secure random source.
pub fn generate_keypair() -> KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    keypair_from_signing_key(signing_key)
}

/// Derive a deterministic Ed25519 key pair from a 32-byte seed.
///
/// Used by tests and simulations that need reproducible committees.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    keypair_from_signing_key(SigningKey::from_bytes(seed))
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// The node identity belonging to a public key.
pub fn node_id(public: &PublicKey) -> NodeId {
    NodeId::from_public_key(public)
}

fn keypair_from_signing_key(signing_key: SigningKey) -> KeyPair {
    let public = PublicKey(signing_key.verifying_key().to_bytes());
    let private = PrivateKey(signing_key.to_bytes());
    KeyPair { public, private }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_deterministic() {
        let a = keypair_from_seed(&[7u8; 32]);
        let b = keypair_from_seed(&[7u8; 32]);
        assert_eq!(a.public, b.public);
    }

    #[test]
    fn distinct_seeds_distinct_keys() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn public_matches_private() {
        let kp = keypair_from_seed(&[3u8; 32]);
        assert_eq!(public_from_private(&kp.private), kp.public);
    }

    #[test]
    fn node_id_wraps_public_key() {
        let kp = keypair_from_seed(&[4u8; 32]);
        let id = node_id(&kp.public);
        assert_eq!(id.as_bytes(), kp.public.as_bytes());
        assert_eq!(id.public_key(), kp.public);
    }
}
