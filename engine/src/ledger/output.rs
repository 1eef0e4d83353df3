//! Inputs, outputs, scripts and datums.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::bytes::{Bytes, DataHash, KeyHash, PolicyId, TransactionId};
use super::value::Value;
use crate::codec::{self, CodecError};
use crate::crypto::hash::blake3_224;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transaction_id: TransactionId,
    pub index: u32,
}

impl TransactionInput {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

impl fmt::Display for TransactionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.transaction_id, self.index)
    }
}

// ---------------------------------------------------------------------------
// Plutus data and datums
// ---------------------------------------------------------------------------

/// Structured data passed to Plutus scripts as datum or redeemer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Integer(i64),
    Bytes(Bytes),
}

impl PlutusData {
    /// The conventional "unit" value, `Constr 0 []`.
    pub fn unit() -> Self {
        Self::Constr {
            tag: 0,
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datum {
    Hash(DataHash),
    Inline(PlutusData),
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Multi-signature and timelock scripts evaluated by the ledger itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeScript {
    Pubkey(KeyHash),
    All(Vec<NativeScript>),
    Any(Vec<NativeScript>),
    AtLeast { required: u32, scripts: Vec<NativeScript> },
    InvalidBefore(u64),
    InvalidHereafter(u64),
}

impl NativeScript {
    /// Upper bound on distinct key hashes that could sign for this script.
    pub fn key_hashes(&self) -> Vec<KeyHash> {
        let mut out = Vec::new();
        self.collect_key_hashes(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_key_hashes(&self, out: &mut Vec<KeyHash>) {
        match self {
            Self::Pubkey(hash) => out.push(*hash),
            Self::All(scripts) | Self::Any(scripts) | Self::AtLeast { scripts, .. } => {
                for script in scripts {
                    script.collect_key_hashes(out);
                }
            }
            Self::InvalidBefore(_) | Self::InvalidHereafter(_) => {}
        }
    }
}

/// A script attached to a witness set or carried by an output as a
/// reference script. Plutus scripts are opaque flat-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Script {
    Native(NativeScript),
    PlutusV1(Bytes),
    PlutusV2(Bytes),
    PlutusV3(Bytes),
}

impl Script {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    fn language_tag(&self) -> u8 {
        match self {
            Self::Native(_) => 0,
            Self::PlutusV1(_) => 1,
            Self::PlutusV2(_) => 2,
            Self::PlutusV3(_) => 3,
        }
    }

    /// Script hash: 28-byte BLAKE3 digest of the language tag followed by
    /// the script body. Also used as the policy id of minting scripts.
    pub fn hash(&self) -> Result<PolicyId, CodecError> {
        let mut preimage = vec![self.language_tag()];
        match self {
            Self::Native(native) => preimage.extend(codec::to_canonical_bytes(native)?),
            Self::PlutusV1(b) | Self::PlutusV2(b) | Self::PlutusV3(b) => {
                preimage.extend_from_slice(b.as_slice())
            }
        }
        Ok(PolicyId::new(blake3_224(&preimage)))
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub address: Address,
    pub amount: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<Datum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_ref: Option<Script>,
}

impl TransactionOutput {
    pub fn new(address: Address, amount: Value) -> Self {
        Self {
            address,
            amount,
            datum: None,
            script_ref: None,
        }
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = Some(datum);
        self
    }

    pub fn with_script_ref(mut self, script: Script) -> Self {
        self.script_ref = Some(script);
        self
    }
}

// ---------------------------------------------------------------------------
// Utxo
// ---------------------------------------------------------------------------

/// An unspent output together with the input that spends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub input: TransactionInput,
    pub output: TransactionOutput,
}

impl Utxo {
    pub fn new(input: TransactionInput, output: TransactionOutput) -> Self {
        Self { input, output }
    }

    pub fn amount(&self) -> &Value {
        &self.output.amount
    }

    pub fn coin(&self) -> u64 {
        self.output.amount.coin
    }
}
