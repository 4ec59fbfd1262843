//! Blake2b hashing and the canonical block digest.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use braid_types::{Block, BlockHash};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Digest of a block's payload bytes.
///
/// The canonical block hash covers the payload through this digest, so large
/// payloads can be witnessed without re-hashing them.
pub fn hash_payload(payload: &[u8]) -> [u8; 32] {
    blake2b_256(payload)
}

/// Compute the canonical hash of a block.
///
/// Field order is fixed and length-sensitive fields are counted, so the hash
/// is independent of any serde encoding:
/// proposer, round, chain_id, height, parent, ack count, each ack as
/// (chain_id, height, hash), timestamp, payload digest, witness height,
/// witness data digest. `hash`, `signature`, and `consensus_timestamp` are
/// not inputs.
pub fn hash_block(block: &Block) -> BlockHash {
    let mut hasher = Blake2b256::new();
    hasher.update(block.proposer.as_bytes());
    hasher.update(block.position.round.to_le_bytes());
    hasher.update(block.position.chain_id.to_le_bytes());
    hasher.update(block.position.height.to_le_bytes());
    hasher.update(block.parent.as_bytes());
    hasher.update((block.acks.len() as u32).to_le_bytes());
    for ack in &block.acks {
        hasher.update(ack.chain_id.to_le_bytes());
        hasher.update(ack.height.to_le_bytes());
        hasher.update(ack.hash.as_bytes());
    }
    hasher.update(block.timestamp.as_nanos().to_le_bytes());
    hasher.update(hash_payload(&block.payload));
    hasher.update(block.witness.height.to_le_bytes());
    hasher.update(blake2b_256(&block.witness.data));

    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    BlockHash::new(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_types::{Ack, Position, Timestamp};

    fn sample_block() -> Block {
        Block {
            position: Position::new(0, 1, 3),
            parent: BlockHash::new([7u8; 32]),
            acks: vec![Ack::new(0, 2, BlockHash::new([1u8; 32]))],
            timestamp: Timestamp::from_secs(5),
            payload: b"payload".to_vec(),
            ..Block::default()
        }
    }

    #[test]
    fn blake2b_deterministic() {
        let h1 = blake2b_256(b"hello braid");
        let h2 = blake2b_256(b"hello braid");
        assert_eq!(h1, h2);
    }

    #[test]
    fn blake2b_different_inputs() {
        assert_ne!(blake2b_256(b"hello"), blake2b_256(b"world"));
    }

    #[test]
    fn blake2b_multi_equivalent() {
        let single = blake2b_256(b"helloworld");
        let multi = blake2b_256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn block_hash_deterministic() {
        assert_eq!(hash_block(&sample_block()), hash_block(&sample_block()));
    }

    #[test]
    fn block_hash_covers_every_field() {
        let base = hash_block(&sample_block());

        let mut b = sample_block();
        b.position.height = 4;
        assert_ne!(hash_block(&b), base);

        let mut b = sample_block();
        b.parent = BlockHash::ZERO;
        assert_ne!(hash_block(&b), base);

        let mut b = sample_block();
        b.acks[0].height = 9;
        assert_ne!(hash_block(&b), base);

        let mut b = sample_block();
        b.payload = b"other".to_vec();
        assert_ne!(hash_block(&b), base);

        let mut b = sample_block();
        b.witness.data = b"w".to_vec();
        assert_ne!(hash_block(&b), base);
    }

    #[test]
    fn block_hash_ignores_seal_fields() {
        let base = hash_block(&sample_block());

        let mut b = sample_block();
        b.hash = BlockHash::new([9u8; 32]);
        b.signature = braid_types::Signature([3u8; 64]);
        b.consensus_timestamp = Timestamp::from_secs(99);
        assert_eq!(hash_block(&b), base);
    }
}
