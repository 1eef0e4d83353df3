//! # Cryptographic Primitives
//!
//! Everything security-related in txforge flows through here: body and key
//! hashes, Ed25519 signatures, and the passphrase-sealed envelopes that key
//! handlers persist.
//!
//! - **Ed25519** for vkey witnesses.
//! - **BLAKE3** for transaction ids and key/script hashes.
//! - **HMAC-SHA512** for BIP32-Ed25519 child derivation.
//! - **Argon2id + AES-256-GCM** for secrets at rest.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations.

pub mod ed25519;
pub mod encryption;
pub mod hash;

pub use ed25519::{key_hash, verify, Ed25519Keypair};
pub use encryption::{decrypt_with_aad, derive_key, encrypt_with_aad, EncryptionError, KdfParams};
pub use hash::{blake3_224, blake3_hash, hmac_sha512, sha512};
