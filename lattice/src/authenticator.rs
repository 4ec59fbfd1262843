//! Block signing and verification.

use crate::error::LatticeError;
use braid_crypto::{hash_block, node_id, sign_digest, verify_digest};
use braid_types::{Block, KeyPair, NodeId};

/// Signs outgoing blocks with the local key and verifies foreign ones.
///
/// A pure function of the key pair; holds no lattice state.
pub struct Authenticator {
    keypair: KeyPair,
    id: NodeId,
}

impl Authenticator {
    pub fn new(keypair: KeyPair) -> Self {
        let id = node_id(&keypair.public);
        Self { keypair, id }
    }

    /// The local node's identity.
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Fill `hash` and `signature`. Every other field must be final; the
    /// proposer is stamped with the local identity.
    pub fn sign_block(&self, block: &mut Block) {
        block.proposer = self.id;
        block.hash = hash_block(block);
        block.signature = sign_digest(&block.hash, &self.keypair.private);
    }

    /// Verify a block's canonical hash and its signature against the
    /// proposer's embedded public key.
    pub fn verify_block(&self, block: &Block) -> Result<(), LatticeError> {
        if hash_block(block) != block.hash {
            return Err(LatticeError::IncorrectHash);
        }
        if block.signature.is_zero() {
            return Err(LatticeError::IncorrectSignature);
        }
        let key = block.proposer.public_key();
        if !verify_digest(&block.hash, &block.signature, &key) {
            return Err(LatticeError::IncorrectSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_crypto::keypair_from_seed;
    use braid_types::{Ack, BlockHash, Position, Timestamp};

    fn auth(seed: u8) -> Authenticator {
        Authenticator::new(keypair_from_seed(&[seed; 32]))
    }

    fn signed_block(auth: &Authenticator) -> Block {
        let mut b = Block {
            position: Position::new(0, 2, 5),
            parent: BlockHash::new([4u8; 32]),
            acks: vec![Ack::new(0, 3, BlockHash::new([1u8; 32]))],
            timestamp: Timestamp::from_secs(10),
            payload: b"tx".to_vec(),
            ..Block::default()
        };
        auth.sign_block(&mut b);
        b
    }

    #[test]
    fn sign_then_verify() {
        let auth = auth(1);
        let b = signed_block(&auth);
        assert!(auth.verify_block(&b).is_ok());
    }

    #[test]
    fn verify_accepts_foreign_proposer() {
        // Verification keys come from the block itself, so any
        // authenticator can check any proposer's block.
        let proposer = auth(1);
        let checker = auth(2);
        let b = signed_block(&proposer);
        assert!(checker.verify_block(&b).is_ok());
    }

    #[test]
    fn flipped_hash_byte_is_incorrect_hash() {
        let auth = auth(1);
        let mut b = signed_block(&auth);
        let mut bytes = *b.hash.as_bytes();
        bytes[0] ^= 0x01;
        b.hash = BlockHash::new(bytes);
        assert!(matches!(
            auth.verify_block(&b),
            Err(LatticeError::IncorrectHash)
        ));
    }

    #[test]
    fn mutated_content_is_incorrect_hash() {
        let auth = auth(1);
        let mut b = signed_block(&auth);
        b.payload = b"other".to_vec();
        assert!(matches!(
            auth.verify_block(&b),
            Err(LatticeError::IncorrectHash)
        ));
    }

    #[test]
    fn foreign_signature_is_incorrect_signature() {
        let proposer = auth(1);
        let imposter = auth(2);
        let mut b = signed_block(&proposer);
        // Re-sign with another key but keep the original proposer claim.
        b.signature = braid_crypto::sign_digest(&b.hash, &imposter.keypair.private);
        assert!(matches!(
            proposer.verify_block(&b),
            Err(LatticeError::IncorrectSignature)
        ));
    }

    #[test]
    fn unsigned_block_is_incorrect_signature() {
        let auth = auth(1);
        let mut b = signed_block(&auth);
        b.signature = braid_types::Signature::default();
        assert!(matches!(
            auth.verify_block(&b),
            Err(LatticeError::IncorrectSignature)
        ));
    }

    #[test]
    fn sign_stamps_proposer_identity() {
        let auth = auth(3);
        let b = signed_block(&auth);
        assert_eq!(b.proposer, auth.node_id());
    }
}
