//! # Secret Sealing: Argon2id + AES-256-GCM
//!
//! Key handlers never persist a private key in the clear. The secret is
//! sealed with AES-256-GCM under a key stretched from the caller's
//! passphrase by Argon2id.
//!
//! ## Nonce management
//!
//! Every seal draws a fresh random 96-bit nonce from `OsRng`. A sealed blob
//! is written once and re-sealed from scratch if the passphrase changes, so
//! a single KDF output never encrypts more than a handful of messages.
//!
//! ## Associated data
//!
//! Callers bind context (the handler mode, the cached public key) as AAD.
//! Swapping the ciphertext of one handler into the envelope of another makes
//! decryption fail instead of silently yielding the wrong key.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{
    AES_KEY_LENGTH, AES_NONCE_LENGTH, DEFAULT_KDF_ITERATIONS, DEFAULT_KDF_MEMORY_KIB,
    DEFAULT_KDF_PARALLELISM, KDF_SALT_LENGTH, MAX_KDF_ITERATIONS, MAX_KDF_MEMORY_KIB,
    MAX_KDF_PARALLELISM,
};

/// Errors that can occur while sealing or opening a secret.
///
/// Deliberately coarse: "wrong passphrase" and "corrupted ciphertext" are
/// the same error.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong passphrase or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid key derivation parameters: {0}")]
    InvalidKdfParams(String),
}

/// Argon2id cost parameters, stored next to the ciphertext so a blob can
/// always be reopened with the cost it was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_KDF_MEMORY_KIB,
            iterations: DEFAULT_KDF_ITERATIONS,
            parallelism: DEFAULT_KDF_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Checks the cost against Argon2's own limits and against the
    /// `MAX_KDF_*` ceilings.
    pub fn validate(&self) -> Result<(), EncryptionError> {
        if self.memory_kib > MAX_KDF_MEMORY_KIB
            || self.iterations > MAX_KDF_ITERATIONS
            || self.parallelism > MAX_KDF_PARALLELISM
        {
            return Err(EncryptionError::InvalidKdfParams(format!(
                "cost m={} t={} p={} exceeds m={MAX_KDF_MEMORY_KIB} t={MAX_KDF_ITERATIONS} p={MAX_KDF_PARALLELISM}",
                self.memory_kib, self.iterations, self.parallelism
            )));
        }
        self.argon_params().map(|_| ())
    }

    fn argon_params(&self) -> Result<Params, EncryptionError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(AES_KEY_LENGTH),
        )
        .map_err(|e| EncryptionError::InvalidKdfParams(e.to_string()))
    }
}

/// Stretch a passphrase into an AES-256 key.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; KDF_SALT_LENGTH],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, EncryptionError> {
    params.validate()?;
    let argon_params = params.argon_params()?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    argon
        .hash_password_into(passphrase, salt, &mut key[..])
        .map_err(|e| EncryptionError::InvalidKdfParams(e.to_string()))?;
    Ok(key)
}

/// Fresh random KDF salt.
pub fn random_salt() -> [u8; KDF_SALT_LENGTH] {
    let mut salt = [0u8; KDF_SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypt with Additional Authenticated Data (AAD).
///
/// Returns `(nonce, ciphertext)`; the ciphertext includes the 16-byte tag.
/// The same AAD must be supplied to [`decrypt_with_aad`].
pub fn encrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; AES_NONCE_LENGTH], Vec<u8>), EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt ciphertext produced by [`encrypt_with_aad`].
///
/// The plaintext is returned in a zeroizing buffer; it is key material.
pub fn decrypt_with_aad(
    key: &[u8; AES_KEY_LENGTH],
    nonce: &[u8; AES_NONCE_LENGTH],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| EncryptionError::DecryptFailed)
}
