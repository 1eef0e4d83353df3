//! # Ed25519 Keys
//!
//! Plain (non-hierarchical) Ed25519 keys and signature verification.
//!
//! - Private keys are zeroized on drop (ed25519-dalek's `zeroize` feature).
//! - Generation uses `OsRng`.
//! - Key bytes are never logged or printed through `Debug`.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use super::hash::blake3_224;
use crate::config::{SIGNATURE_LENGTH, SIGNING_KEY_LENGTH, VERIFYING_KEY_LENGTH};
use crate::ledger::KeyHash;

/// Ed25519 signing key for the raw-key handler.
pub struct Ed25519Keypair {
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SIGNING_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key_bytes(&self) -> [u8; VERIFYING_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Raw seed, for sealing into an encrypted envelope.
    pub fn seed_bytes(&self) -> Zeroizing<[u8; SIGNING_KEY_LENGTH]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Keypair(pub={})", hex::encode(self.public_key_bytes()))
    }
}

/// Verify `signature` over `message` under `public_key`.
///
/// Returns `false` for malformed keys rather than erroring; callers only
/// ever need a yes/no answer.
pub fn verify(
    public_key: &[u8; VERIFYING_KEY_LENGTH],
    message: &[u8],
    signature: &[u8; SIGNATURE_LENGTH],
) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(message, &signature).is_ok()
}

/// Ledger key hash of a verification key.
pub fn key_hash(public_key: &[u8; VERIFYING_KEY_LENGTH]) -> KeyHash {
    KeyHash::new(blake3_224(public_key))
}
