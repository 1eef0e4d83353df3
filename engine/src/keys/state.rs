//! Persisted handler state.
//!
//! A handler's secret is sealed with AES-256-GCM under a key stretched from
//! the user's passphrase with Argon2id. The envelope is bincode:
//!
//! ```text
//! magic "TXKH" (u32) | version (u16) | mode | public data | kdf params
//!   | salt (16) | nonce (12) | ciphertext + tag
//! ```
//!
//! Everything before the salt is bound into the ciphertext as associated
//! data, so swapping the public key or the mode of a blob makes it fail to
//! open rather than sign with mismatched metadata.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{KeyHandlerError, KeyHandlerMode};
use crate::config::{AES_NONCE_LENGTH, HANDLER_STATE_MAGIC, HANDLER_STATE_VERSION, KDF_SALT_LENGTH};
use crate::crypto::encryption::{self, KdfParams};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerState {
    magic: u32,
    version: u16,
    pub mode: KeyHandlerMode,
    /// Non-secret key material stored in the clear: the verification key
    /// for raw keys, the root extended public key for hierarchical keys.
    pub public_data: Vec<u8>,
    pub kdf: KdfParams,
    salt: [u8; KDF_SALT_LENGTH],
    nonce: [u8; AES_NONCE_LENGTH],
    ciphertext: Vec<u8>,
}

impl HandlerState {
    /// Encrypts `secret` under `passphrase`.
    pub fn seal(
        mode: KeyHandlerMode,
        public_data: Vec<u8>,
        secret: &[u8],
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<Self, KeyHandlerError> {
        let salt = encryption::random_salt();
        let mut state = Self {
            magic: HANDLER_STATE_MAGIC,
            version: HANDLER_STATE_VERSION,
            mode,
            public_data,
            kdf,
            salt,
            nonce: [0u8; AES_NONCE_LENGTH],
            ciphertext: Vec::new(),
        };

        let key = encryption::derive_key(passphrase.as_bytes(), &state.salt, &state.kdf)?;
        let (nonce, ciphertext) = encryption::encrypt_with_aad(&key, secret, &state.aad())?;
        state.nonce = nonce;
        state.ciphertext = ciphertext;
        Ok(state)
    }

    /// Decrypts the secret. Fails with [`KeyHandlerError::Decryption`] on a
    /// wrong passphrase or any tampering with the envelope.
    pub fn open(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, KeyHandlerError> {
        let key = encryption::derive_key(passphrase.as_bytes(), &self.salt, &self.kdf)?;
        Ok(encryption::decrypt_with_aad(
            &key,
            &self.nonce,
            &self.ciphertext,
            &self.aad(),
        )?)
    }

    fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(8 + self.public_data.len());
        aad.extend_from_slice(&self.magic.to_be_bytes());
        aad.extend_from_slice(&self.version.to_be_bytes());
        aad.push(match self.mode {
            KeyHandlerMode::RawKey => 0,
            KeyHandlerMode::HierarchicalKey => 1,
        });
        aad.extend_from_slice(&self.public_data);
        aad
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, KeyHandlerError> {
        bincode::serialize(self).map_err(|e| KeyHandlerError::Storage(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyHandlerError> {
        let state: Self = bincode::deserialize(bytes)
            .map_err(|e| KeyHandlerError::MalformedState(e.to_string()))?;
        if state.magic != HANDLER_STATE_MAGIC {
            return Err(KeyHandlerError::MalformedState(format!(
                "bad magic {:#010x}",
                state.magic
            )));
        }
        if state.version != HANDLER_STATE_VERSION {
            return Err(KeyHandlerError::MalformedState(format!(
                "unsupported version {}",
                state.version
            )));
        }
        state
            .kdf
            .validate()
            .map_err(|e| KeyHandlerError::MalformedState(e.to_string()))?;
        Ok(state)
    }
}
