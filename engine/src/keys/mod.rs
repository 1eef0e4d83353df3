//! # Key Handlers
//!
//! Signing is isolated behind key handlers so that no other part of the
//! engine ever holds private key material. A handler is one of two modes:
//!
//! - **Raw key**: a single Ed25519 key. Signs without derivation paths.
//! - **Hierarchical key**: a BIP32-Ed25519 root. Every signing call names
//!   the CIP-1852 paths to sign with, and the handler can export extended
//!   account public keys.
//!
//! [`SecureKeyHandler`] is the tagged union callers hold. Its operations
//! check the mode first, so asking a raw-key handler for an account key, or
//! passing paths to it, is a [`KeyHandlerError::WrongCapability`] and never
//! silently ignored.
//!
//! Handlers sign the transaction *body hash* and return witnesses; they do
//! not mutate the transaction. Secrets are decrypted per call and wiped
//! before the call returns.
//!
//! ## Lifecycle
//!
//! ```no_run
//! use txforge::crypto::KdfParams;
//! use txforge::keys::{SecureKeyHandler, SoftwareEd25519Handler, StaticPassphrase};
//!
//! let handler = SoftwareEd25519Handler::generate(
//!     Box::new(StaticPassphrase::new("correct horse")),
//!     KdfParams::default(),
//! )?;
//! let handler = SecureKeyHandler::RawKey(Box::new(handler));
//!
//! let state = handler.serialize_state()?;
//! let restored =
//!     SecureKeyHandler::from_state(&state, Box::new(StaticPassphrase::new("correct horse")))?;
//! assert_eq!(restored.get_public_key()?, handler.get_public_key()?);
//! # Ok::<(), txforge::keys::KeyHandlerError>(())
//! ```

pub mod bip32;
pub mod derivation;
pub mod software;
pub mod state;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::CodecError;
use crate::crypto::EncryptionError;
use crate::error::ErrorKind;
use crate::ledger::{Transaction, Vkey, VkeyWitnessSet};

pub use bip32::{Bip32PrivateKey, Bip32PublicKey};
pub use derivation::{harden, is_hardened, AccountDerivationPath, DerivationPath};
pub use software::{SoftwareBip32Handler, SoftwareEd25519Handler};
pub use state::HandlerState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum KeyHandlerError {
    #[error("{operation} is not supported by a {mode} handler")]
    WrongCapability {
        operation: &'static str,
        mode: KeyHandlerMode,
    },

    #[error("key storage failed: {0}")]
    Storage(String),

    #[error("could not unseal key material -- wrong passphrase or corrupted state")]
    Decryption,

    #[error("invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed handler state: {0}")]
    MalformedState(String),

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl KeyHandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongCapability { .. } => ErrorKind::WrongCapability,
            Self::Storage(_) => ErrorKind::ExternalOracle,
            Self::Decryption | Self::MalformedState(_) => ErrorKind::Decoding,
            Self::InvalidDerivationPath(_) | Self::InvalidKey(_) | Self::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            Self::BufferTooSmall { .. } => ErrorKind::InsufficientBuffer,
            Self::Codec(e) => e.kind(),
        }
    }
}

impl From<EncryptionError> for KeyHandlerError {
    fn from(err: EncryptionError) -> Self {
        match err {
            EncryptionError::DecryptFailed => Self::Decryption,
            EncryptionError::InvalidKdfParams(msg) => Self::InvalidArgument(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Mode and passphrases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyHandlerMode {
    RawKey,
    HierarchicalKey,
}

impl fmt::Display for KeyHandlerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RawKey => "raw-key",
            Self::HierarchicalKey => "hierarchical-key",
        })
    }
}

/// Supplies the passphrase that unseals a handler's secret.
///
/// Asked once per signing or export call, so a provider can prompt the
/// user every time or cache as it sees fit.
pub trait PassphraseProvider: Send {
    fn passphrase(&mut self) -> Result<Zeroizing<String>, KeyHandlerError>;
}

impl<F> PassphraseProvider for F
where
    F: FnMut() -> Result<Zeroizing<String>, KeyHandlerError> + Send,
{
    fn passphrase(&mut self) -> Result<Zeroizing<String>, KeyHandlerError> {
        self()
    }
}

/// A passphrase fixed at construction.
pub struct StaticPassphrase(Zeroizing<String>);

impl StaticPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }
}

impl PassphraseProvider for StaticPassphrase {
    fn passphrase(&mut self) -> Result<Zeroizing<String>, KeyHandlerError> {
        Ok(self.0.clone())
    }
}

impl fmt::Debug for StaticPassphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticPassphrase(..)")
    }
}

// ---------------------------------------------------------------------------
// Handler traits
// ---------------------------------------------------------------------------

/// Handler over a single Ed25519 key.
pub trait Ed25519KeyHandler: Send {
    /// One witness over the body hash of `tx`.
    fn sign_transaction(&mut self, tx: &Transaction) -> Result<VkeyWitnessSet, KeyHandlerError>;

    fn public_key(&self) -> Result<Vkey, KeyHandlerError>;

    /// Opaque blob from which the handler can be restored.
    fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError>;
}

/// Handler over a BIP32-Ed25519 root key.
pub trait Bip32KeyHandler: Send {
    /// One witness per path, in path order.
    fn sign_transaction(
        &mut self,
        tx: &Transaction,
        paths: &[DerivationPath],
    ) -> Result<VkeyWitnessSet, KeyHandlerError>;

    fn extended_account_public_key(
        &mut self,
        path: &AccountDerivationPath,
    ) -> Result<Bip32PublicKey, KeyHandlerError>;

    fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError>;
}

// ---------------------------------------------------------------------------
// SecureKeyHandler
// ---------------------------------------------------------------------------

pub enum SecureKeyHandler {
    RawKey(Box<dyn Ed25519KeyHandler>),
    HierarchicalKey(Box<dyn Bip32KeyHandler>),
}

impl SecureKeyHandler {
    pub fn mode(&self) -> KeyHandlerMode {
        match self {
            Self::RawKey(_) => KeyHandlerMode::RawKey,
            Self::HierarchicalKey(_) => KeyHandlerMode::HierarchicalKey,
        }
    }

    /// Signs `tx` and returns the witnesses.
    ///
    /// Raw-key handlers take no paths; hierarchical handlers require at
    /// least one.
    pub fn sign_transaction(
        &mut self,
        tx: &Transaction,
        paths: Option<&[DerivationPath]>,
    ) -> Result<VkeyWitnessSet, KeyHandlerError> {
        let mode = self.mode();
        match self {
            Self::RawKey(handler) => match paths {
                None => handler.sign_transaction(tx),
                Some(_) => Err(KeyHandlerError::WrongCapability {
                    operation: "signing with derivation paths",
                    mode,
                }),
            },
            Self::HierarchicalKey(handler) => match paths {
                Some(paths) if !paths.is_empty() => handler.sign_transaction(tx, paths),
                _ => Err(KeyHandlerError::InvalidArgument(
                    "hierarchical key handlers need at least one derivation path".into(),
                )),
            },
        }
    }

    pub fn get_public_key(&self) -> Result<Vkey, KeyHandlerError> {
        match self {
            Self::RawKey(handler) => handler.public_key(),
            Self::HierarchicalKey(_) => Err(KeyHandlerError::WrongCapability {
                operation: "get_public_key",
                mode: KeyHandlerMode::HierarchicalKey,
            }),
        }
    }

    pub fn get_extended_account_public_key(
        &mut self,
        path: &AccountDerivationPath,
    ) -> Result<Bip32PublicKey, KeyHandlerError> {
        let mode = self.mode();
        match self {
            Self::HierarchicalKey(handler) => handler.extended_account_public_key(path),
            Self::RawKey(_) => Err(KeyHandlerError::WrongCapability {
                operation: "get_extended_account_public_key",
                mode,
            }),
        }
    }

    pub fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError> {
        match self {
            Self::RawKey(handler) => handler.serialize_state(),
            Self::HierarchicalKey(handler) => handler.serialize_state(),
        }
    }

    /// Writes the state into `buf` and returns its length. `buf` is left
    /// untouched when it is too small.
    pub fn serialize_state_into(&self, buf: &mut [u8]) -> Result<usize, KeyHandlerError> {
        let state = Zeroizing::new(self.serialize_state()?);
        if state.len() > buf.len() {
            return Err(KeyHandlerError::BufferTooSmall {
                needed: state.len(),
                available: buf.len(),
            });
        }
        buf[..state.len()].copy_from_slice(&state);
        Ok(state.len())
    }

    /// Restores a software handler from [`serialize_state`](Self::serialize_state)
    /// output. The mode comes from the blob.
    pub fn from_state(
        bytes: &[u8],
        passphrase: Box<dyn PassphraseProvider>,
    ) -> Result<Self, KeyHandlerError> {
        let state = HandlerState::from_bytes(bytes)?;
        Ok(match state.mode {
            KeyHandlerMode::RawKey => {
                Self::RawKey(Box::new(SoftwareEd25519Handler::from_state(state, passphrase)?))
            }
            KeyHandlerMode::HierarchicalKey => Self::HierarchicalKey(Box::new(
                SoftwareBip32Handler::from_state(state, passphrase)?,
            )),
        })
    }
}

impl fmt::Debug for SecureKeyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureKeyHandler({})", self.mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SignatureBytes, TransactionBody, VkeyWitness};

    struct FixedKey {
        signs: usize,
    }

    impl Ed25519KeyHandler for FixedKey {
        fn sign_transaction(&mut self, _: &Transaction) -> Result<VkeyWitnessSet, KeyHandlerError> {
            self.signs += 1;
            let mut set = VkeyWitnessSet::new();
            set.push(VkeyWitness::new(Vkey::new([1; 32]), SignatureBytes::new([2; 64])));
            Ok(set)
        }

        fn public_key(&self) -> Result<Vkey, KeyHandlerError> {
            Ok(Vkey::new([1; 32]))
        }

        fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError> {
            Ok(vec![0xAB; 40])
        }
    }

    struct FixedTree;

    impl Bip32KeyHandler for FixedTree {
        fn sign_transaction(
            &mut self,
            _: &Transaction,
            paths: &[DerivationPath],
        ) -> Result<VkeyWitnessSet, KeyHandlerError> {
            Ok(paths
                .iter()
                .map(|_| VkeyWitness::new(Vkey::new([3; 32]), SignatureBytes::new([4; 64])))
                .collect::<Vec<_>>()
                .into())
        }

        fn extended_account_public_key(
            &mut self,
            _: &AccountDerivationPath,
        ) -> Result<Bip32PublicKey, KeyHandlerError> {
            Ok(Bip32PrivateKey::from_seed(&[5; 32])?.to_public())
        }

        fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError> {
            Ok(vec![1, 2, 3])
        }
    }

    fn tx() -> Transaction {
        Transaction::new(TransactionBody::default())
    }

    fn raw() -> SecureKeyHandler {
        SecureKeyHandler::RawKey(Box::new(FixedKey { signs: 0 }))
    }

    fn hd() -> SecureKeyHandler {
        SecureKeyHandler::HierarchicalKey(Box::new(FixedTree))
    }

    #[test]
    fn raw_key_rejects_paths() {
        let paths = [DerivationPath::cip1852(0, 0, 0)];
        let err = raw().sign_transaction(&tx(), Some(&paths[..])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCapability);
        assert_eq!(raw().sign_transaction(&tx(), None).unwrap().len(), 1);
    }

    #[test]
    fn hierarchical_key_requires_paths() {
        let err = hd().sign_transaction(&tx(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = hd().sign_transaction(&tx(), Some(&[][..])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let paths = [DerivationPath::cip1852(0, 0, 0), DerivationPath::cip1852(0, 0, 1)];
        assert_eq!(hd().sign_transaction(&tx(), Some(&paths[..])).unwrap().len(), 2);
    }

    #[test]
    fn cross_mode_queries_are_wrong_capability() {
        let err = hd().get_public_key().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCapability);
        assert!(err.to_string().contains("hierarchical-key"));

        let err = raw()
            .get_extended_account_public_key(&AccountDerivationPath::cip1852(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCapability);

        assert!(hd()
            .get_extended_account_public_key(&AccountDerivationPath::cip1852(0))
            .is_ok());
        assert_eq!(raw().get_public_key().unwrap(), Vkey::new([1; 32]));
    }

    #[test]
    fn serialize_into_small_buffer_leaves_it_untouched() {
        let mut buf = [0u8; 16];
        let err = raw().serialize_state_into(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            KeyHandlerError::BufferTooSmall {
                needed: 40,
                available: 16
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InsufficientBuffer);
        assert_eq!(buf, [0u8; 16]);

        let mut big = [0u8; 64];
        assert_eq!(raw().serialize_state_into(&mut big).unwrap(), 40);
        assert_eq!(&big[..40], &[0xAB; 40][..]);
    }

    #[test]
    fn decrypt_failure_maps_to_decryption() {
        let err: KeyHandlerError = EncryptionError::DecryptFailed.into();
        assert!(matches!(err, KeyHandlerError::Decryption));
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn closures_are_passphrase_providers() {
        let mut calls = 0;
        let mut provider = move || -> Result<Zeroizing<String>, KeyHandlerError> {
            calls += 1;
            Ok(Zeroizing::new(format!("pass{calls}")))
        };
        assert_eq!(provider.passphrase().unwrap().as_str(), "pass1");
        assert_eq!(provider.passphrase().unwrap().as_str(), "pass2");
        let mut fixed = StaticPassphrase::new("x");
        assert_eq!(fixed.passphrase().unwrap().as_str(), "x");
        assert_eq!(format!("{fixed:?}"), "StaticPassphrase(..)");
    }
}
