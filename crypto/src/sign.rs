//! Ed25519 signing of canonical block digests.
//!
//! Blocks are never signed raw: the proposer signs the 32-byte canonical
//! hash, so one signature commits to every hashed field at once and a
//! verifier needs only the digest plus the proposer's embedded public key.

use braid_types::{BlockHash, PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a canonical block digest with the proposer's private key.
pub fn sign_digest(digest: &BlockHash, private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    let sig = signing_key.sign(digest.as_bytes());
    Signature(sig.to_bytes())
}

/// Verify a digest signature against the proposer's public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
/// Also rejects non-canonical signatures (malleability protection).
pub fn verify_digest(digest: &BlockHash, signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(digest.as_bytes(), &dalek_sig).is_ok()
}
