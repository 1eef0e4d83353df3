//! In-process key handlers backed by a passphrase-sealed [`HandlerState`].
//!
//! The decrypted secret lives only for the duration of a signing or export
//! call, in zeroizing buffers.

use std::fmt;

use tracing::debug;
use zeroize::Zeroizing;

use super::state::HandlerState;
use super::{
    AccountDerivationPath, Bip32KeyHandler, Bip32PrivateKey, Bip32PublicKey, DerivationPath,
    Ed25519KeyHandler, KeyHandlerError, KeyHandlerMode, PassphraseProvider,
};
use crate::config::{SIGNING_KEY_LENGTH, VERIFYING_KEY_LENGTH};
use crate::crypto::{Ed25519Keypair, KdfParams};
use crate::ledger::{SignatureBytes, Transaction, Vkey, VkeyWitness, VkeyWitnessSet};

fn expect_mode(state: &HandlerState, mode: KeyHandlerMode) -> Result<(), KeyHandlerError> {
    if state.mode != mode {
        return Err(KeyHandlerError::MalformedState(format!(
            "state holds a {} key, expected {mode}",
            state.mode
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Raw Ed25519
// ---------------------------------------------------------------------------

pub struct SoftwareEd25519Handler {
    state: HandlerState,
    public_key: Vkey,
    passphrase: Box<dyn PassphraseProvider>,
}

impl SoftwareEd25519Handler {
    /// Seals `keypair` under the provider's passphrase.
    pub fn new(
        keypair: &Ed25519Keypair,
        mut passphrase: Box<dyn PassphraseProvider>,
        kdf: KdfParams,
    ) -> Result<Self, KeyHandlerError> {
        let public_key = Vkey::new(keypair.public_key_bytes());
        let pw = passphrase.passphrase()?;
        let state = HandlerState::seal(
            KeyHandlerMode::RawKey,
            public_key.as_bytes().to_vec(),
            &keypair.seed_bytes()[..],
            &pw,
            kdf,
        )?;
        Ok(Self {
            state,
            public_key,
            passphrase,
        })
    }

    pub fn generate(
        passphrase: Box<dyn PassphraseProvider>,
        kdf: KdfParams,
    ) -> Result<Self, KeyHandlerError> {
        Self::new(&Ed25519Keypair::generate(), passphrase, kdf)
    }

    pub fn from_state(
        state: HandlerState,
        passphrase: Box<dyn PassphraseProvider>,
    ) -> Result<Self, KeyHandlerError> {
        expect_mode(&state, KeyHandlerMode::RawKey)?;
        let public_key = Vkey::from_slice(&state.public_data).map_err(|_| {
            KeyHandlerError::MalformedState(format!(
                "verification key must be {VERIFYING_KEY_LENGTH} bytes"
            ))
        })?;
        Ok(Self {
            state,
            public_key,
            passphrase,
        })
    }

    fn unseal(&mut self) -> Result<Ed25519Keypair, KeyHandlerError> {
        let pw = self.passphrase.passphrase()?;
        let secret = self.state.open(&pw)?;
        let seed: Zeroizing<[u8; SIGNING_KEY_LENGTH]> = Zeroizing::new(
            secret
                .as_slice()
                .try_into()
                .map_err(|_| KeyHandlerError::MalformedState("sealed seed has wrong length".into()))?,
        );
        let keypair = Ed25519Keypair::from_seed(&seed);
        if keypair.public_key_bytes() != *self.public_key.as_bytes() {
            return Err(KeyHandlerError::InvalidKey(
                "sealed key does not match stored verification key".into(),
            ));
        }
        Ok(keypair)
    }
}

impl Ed25519KeyHandler for SoftwareEd25519Handler {
    fn sign_transaction(&mut self, tx: &Transaction) -> Result<VkeyWitnessSet, KeyHandlerError> {
        let body_hash = tx.body_hash()?;
        let keypair = self.unseal()?;
        let signature = SignatureBytes::new(keypair.sign(body_hash.as_bytes()));

        let mut witnesses = VkeyWitnessSet::new();
        witnesses.push(VkeyWitness::new(self.public_key, signature));
        debug!(tx_id = %body_hash, "signed with raw key");
        Ok(witnesses)
    }

    fn public_key(&self) -> Result<Vkey, KeyHandlerError> {
        Ok(self.public_key)
    }

    fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError> {
        self.state.to_bytes()
    }
}

impl fmt::Debug for SoftwareEd25519Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareEd25519Handler")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// BIP32-Ed25519
// ---------------------------------------------------------------------------

pub struct SoftwareBip32Handler {
    state: HandlerState,
    root_public: Bip32PublicKey,
    passphrase: Box<dyn PassphraseProvider>,
}

impl SoftwareBip32Handler {
    /// Seals `root` under the provider's passphrase.
    pub fn new(
        root: &Bip32PrivateKey,
        mut passphrase: Box<dyn PassphraseProvider>,
        kdf: KdfParams,
    ) -> Result<Self, KeyHandlerError> {
        let root_public = root.to_public();
        let pw = passphrase.passphrase()?;
        let state = HandlerState::seal(
            KeyHandlerMode::HierarchicalKey,
            root_public.as_bytes().to_vec(),
            root.as_bytes(),
            &pw,
            kdf,
        )?;
        Ok(Self {
            state,
            root_public,
            passphrase,
        })
    }

    pub fn generate(
        passphrase: Box<dyn PassphraseProvider>,
        kdf: KdfParams,
    ) -> Result<Self, KeyHandlerError> {
        Self::new(&Bip32PrivateKey::generate(), passphrase, kdf)
    }

    pub fn from_state(
        state: HandlerState,
        passphrase: Box<dyn PassphraseProvider>,
    ) -> Result<Self, KeyHandlerError> {
        expect_mode(&state, KeyHandlerMode::HierarchicalKey)?;
        let root_public = Bip32PublicKey::from_bytes(&state.public_data)
            .map_err(|e| KeyHandlerError::MalformedState(e.to_string()))?;
        Ok(Self {
            state,
            root_public,
            passphrase,
        })
    }

    pub fn root_public_key(&self) -> &Bip32PublicKey {
        &self.root_public
    }

    fn unseal(&mut self) -> Result<Bip32PrivateKey, KeyHandlerError> {
        let pw = self.passphrase.passphrase()?;
        let secret = self.state.open(&pw)?;
        let root = Bip32PrivateKey::from_bytes(&secret)?;
        if root.to_public() != self.root_public {
            return Err(KeyHandlerError::InvalidKey(
                "sealed root does not match stored public key".into(),
            ));
        }
        Ok(root)
    }
}

impl Bip32KeyHandler for SoftwareBip32Handler {
    fn sign_transaction(
        &mut self,
        tx: &Transaction,
        paths: &[DerivationPath],
    ) -> Result<VkeyWitnessSet, KeyHandlerError> {
        if paths.is_empty() {
            return Err(KeyHandlerError::InvalidArgument(
                "no derivation paths given".into(),
            ));
        }
        let body_hash = tx.body_hash()?;
        let root = self.unseal()?;

        let mut witnesses = VkeyWitnessSet::new();
        for path in paths {
            let key = root.derive_path(&path.indices());
            let signature = SignatureBytes::new(key.sign(body_hash.as_bytes()));
            witnesses.push(VkeyWitness::new(Vkey::new(key.public_key_bytes()), signature));
        }
        debug!(tx_id = %body_hash, witnesses = witnesses.len(), "signed with derived keys");
        Ok(witnesses)
    }

    fn extended_account_public_key(
        &mut self,
        path: &AccountDerivationPath,
    ) -> Result<Bip32PublicKey, KeyHandlerError> {
        let root = self.unseal()?;
        Ok(root.derive_path(&path.indices()).to_public())
    }

    fn serialize_state(&self) -> Result<Vec<u8>, KeyHandlerError> {
        self.state.to_bytes()
    }
}

impl fmt::Debug for SoftwareBip32Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareBip32Handler")
            .field("root_public", &self.root_public)
            .finish_non_exhaustive()
    }
}
