//! Transactions: body, witness set, redeemers.
//!
//! The body is what gets hashed and signed. Everything in the witness set is
//! attached afterwards and is excluded from the body hash, which is why the
//! fee (part of the body) must already account for the size of witnesses
//! that do not exist yet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::bytes::{Bytes, DataHash, KeyHash, SignatureBytes, TransactionId, Vkey};
use super::output::{NativeScript, PlutusData, Script, TransactionInput, TransactionOutput};
use super::value::MultiAsset;
use crate::codec::{self, CodecError};
use crate::crypto::ed25519;
use crate::crypto::hash::blake3_hash;

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Credential {
    Key(KeyHash),
    Script(KeyHash),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Certificate {
    StakeRegistration(Credential),
    StakeDeregistration(Credential),
    StakeDelegation { credential: Credential, pool: KeyHash },
}

impl Certificate {
    /// Key hash that must witness this certificate, if any.
    pub fn required_signer(&self) -> Option<KeyHash> {
        let credential = match self {
            // Registration is unauthenticated.
            Self::StakeRegistration(_) => return None,
            Self::StakeDeregistration(c) => c,
            Self::StakeDelegation { credential, .. } => credential,
        };
        match credential {
            Credential::Key(hash) => Some(*hash),
            Credential::Script(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validity_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub withdrawals: BTreeMap<Address, u64>,
    #[serde(default, skip_serializing_if = "MultiAsset::is_empty")]
    pub mint: MultiAsset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_data_hash: Option<DataHash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collateral: Vec<TransactionInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_signers: Vec<KeyHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral_return: Option<TransactionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_collateral: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_inputs: Vec<TransactionInput>,
}

impl TransactionBody {
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        Self {
            inputs,
            outputs,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Redeemers
// ---------------------------------------------------------------------------

/// Script purpose a redeemer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerTag {
    Spend,
    Mint,
    Cert,
    Reward,
    Vote,
    Propose,
}

/// Execution budget of a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnits {
    pub memory: u64,
    pub steps: u64,
}

impl ExUnits {
    pub const fn new(memory: u64, steps: u64) -> Self {
        Self { memory, steps }
    }

    pub fn checked_add(&self, other: &ExUnits) -> Option<ExUnits> {
        Some(ExUnits {
            memory: self.memory.checked_add(other.memory)?,
            steps: self.steps.checked_add(other.steps)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

impl Redeemer {
    /// A redeemer whose budget is still unknown.
    pub fn placeholder(tag: RedeemerTag, index: u32, data: PlutusData) -> Self {
        Self {
            tag,
            index,
            data,
            ex_units: ExUnits::default(),
        }
    }

    /// `(tag, index)` pair identifying the script purpose.
    pub fn pointer(&self) -> (RedeemerTag, u32) {
        (self.tag, self.index)
    }
}

// ---------------------------------------------------------------------------
// Witnesses
// ---------------------------------------------------------------------------

/// A verification key and its signature over a body hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VkeyWitness {
    pub vkey: Vkey,
    pub signature: SignatureBytes,
}

impl VkeyWitness {
    pub fn new(vkey: Vkey, signature: SignatureBytes) -> Self {
        Self { vkey, signature }
    }

    /// Checks the signature against `body_hash`.
    pub fn verify(&self, body_hash: &TransactionId) -> bool {
        ed25519::verify(
            self.vkey.as_bytes(),
            body_hash.as_bytes(),
            self.signature.as_bytes(),
        )
    }

    /// Key hash of the witnessing key.
    pub fn key_hash(&self) -> KeyHash {
        ed25519::key_hash(self.vkey.as_bytes())
    }
}

/// Witnesses produced by one signing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VkeyWitnessSet(Vec<VkeyWitness>);

impl VkeyWitnessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, witness: VkeyWitness) {
        self.0.push(witness);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VkeyWitness> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<VkeyWitness> {
        self.0
    }
}

impl From<Vec<VkeyWitness>> for VkeyWitnessSet {
    fn from(witnesses: Vec<VkeyWitness>) -> Self {
        Self(witnesses)
    }
}

impl IntoIterator for VkeyWitnessSet {
    type Item = VkeyWitness;
    type IntoIter = std::vec::IntoIter<VkeyWitness>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vkey_witnesses: Vec<VkeyWitness>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_scripts: Vec<NativeScript>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plutus_scripts: Vec<Script>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plutus_data: Vec<PlutusData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redeemers: Vec<Redeemer>,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

fn default_is_valid() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub body: TransactionBody,
    #[serde(default)]
    pub witness_set: WitnessSet,
    #[serde(default = "default_is_valid")]
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_data: Option<Bytes>,
}

impl Transaction {
    pub fn new(body: TransactionBody) -> Self {
        Self {
            body,
            witness_set: WitnessSet::default(),
            is_valid: true,
            auxiliary_data: None,
        }
    }

    /// BLAKE3 digest of the canonical body encoding. This is the message
    /// every vkey witness signs.
    pub fn body_hash(&self) -> Result<TransactionId, CodecError> {
        let bytes = codec::to_canonical_bytes(&self.body)?;
        Ok(TransactionId::new(blake3_hash(&bytes)))
    }

    pub fn redeemers(&self) -> &[Redeemer] {
        &self.witness_set.redeemers
    }

    pub fn has_scripts(&self) -> bool {
        !self.witness_set.redeemers.is_empty()
    }

    /// Appends witnesses, skipping any whose vkey is already present.
    /// Returns how many were added.
    pub fn add_vkey_witnesses(&mut self, witnesses: VkeyWitnessSet) -> usize {
        let mut added = 0;
        for witness in witnesses {
            let present = self
                .witness_set
                .vkey_witnesses
                .iter()
                .any(|w| w.vkey == witness.vkey);
            if !present {
                self.witness_set.vkey_witnesses.push(witness);
                added += 1;
            }
        }
        added
    }
}
