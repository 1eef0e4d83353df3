//! # Ledger Data Model
//!
//! Plain data types for a Cardano-style UTXO ledger. Nothing in here knows
//! about fees, selection or signing; those stages take these types by
//! reference and, where they must, mutate exactly one field of a
//! transaction.
//!
//! - **bytes**: fixed and variable length byte strings (ids, hashes, keys).
//! - **value**: lovelace plus multi-asset bundles with checked arithmetic.
//! - **address**: header-tagged addresses and their bech32 text form.
//! - **output**: inputs, outputs, datums, scripts, UTXOs.
//! - **transaction**: body, witnesses, redeemers.
//! - **params**: protocol parameters and their JSON loader.

pub mod address;
pub mod bytes;
pub mod output;
pub mod params;
pub mod transaction;
pub mod value;

pub use address::{Address, AddressError, AddressKind};
pub use bytes::{Bytes, DataHash, FixedBytes, KeyHash, PolicyId, SignatureBytes, TransactionId, Vkey};
pub use output::{Datum, NativeScript, PlutusData, Script, TransactionInput, TransactionOutput, Utxo};
pub use params::{ExUnitPrices, ParamsError, ProtocolParameters, UnitInterval};
pub use transaction::{
    Certificate, Credential, ExUnits, Redeemer, RedeemerTag, Transaction, TransactionBody,
    VkeyWitness, VkeyWitnessSet, WitnessSet,
};
pub use value::{AssetName, MultiAsset, Value, ValueError};
