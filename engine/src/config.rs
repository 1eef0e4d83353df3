//! # Engine Configuration & Constants
//!
//! Every magic number in txforge lives here. The fee-schedule constants below
//! encode external ledger rules, not tuning knobs: changing any of them makes
//! the engine disagree with the chain about what a transaction costs.

// ---------------------------------------------------------------------------
// Fee Schedule
// ---------------------------------------------------------------------------

/// Width of one pricing tier for reference-script bytes.
///
/// Reference scripts are priced per byte, but every full tier of this many
/// bytes makes the next tier more expensive.
pub const REF_SCRIPT_TIER_SIZE: u64 = 25_600;

/// Multiplier applied to the per-byte reference-script price after each tier.
pub const REF_SCRIPT_TIER_MULTIPLIER: f64 = 1.2;

/// Fixed per-entry bookkeeping cost the ledger charges on top of an output's
/// serialized size when computing its minimum lovelace.
pub const UTXO_ENTRY_OVERHEAD: u64 = 160;

/// Upper bound on the min-ADA fixed-point loop.
///
/// A CBOR unsigned integer takes one of five encoded lengths (1, 2, 3, 5 or 9
/// bytes), so convergence needs at most that many re-measurements.
pub const MAX_MIN_ADA_ITERATIONS: usize = 8;

/// Upper bound on select → evaluate → fee rounds in the balancing helper.
pub const MAX_BALANCE_ATTEMPTS: usize = 16;

// ---------------------------------------------------------------------------
// Ledger Encoding
// ---------------------------------------------------------------------------

/// Length of a transaction id (body hash).
pub const TRANSACTION_ID_LENGTH: usize = 32;

/// Length of key hashes, script hashes and policy ids.
pub const KEY_HASH_LENGTH: usize = 28;

/// Maximum length of an asset name in bytes.
pub const MAX_ASSET_NAME_LENGTH: usize = 32;

/// Human-readable prefixes for the bech32 form of addresses.
pub const MAINNET_ADDRESS_HRP: &str = "addr";
pub const TESTNET_ADDRESS_HRP: &str = "addr_test";
pub const MAINNET_STAKE_HRP: &str = "stake";
pub const TESTNET_STAKE_HRP: &str = "stake_test";

/// Network id carried in the low nibble of a mainnet address header.
pub const MAINNET_NETWORK_ID: u8 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret key (seed) length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// BIP32-Ed25519 chain code length.
pub const CHAIN_CODE_LENGTH: usize = 32;

/// BIP32-Ed25519 extended private key: `kL || kR || chain code`.
pub const BIP32_PRIVATE_KEY_LENGTH: usize = 96;

/// BIP32-Ed25519 extended public key: `A || chain code`.
pub const BIP32_PUBLIC_KEY_LENGTH: usize = 64;

/// Indices at or above this value are hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// CIP-1852 purpose index (unhardened form).
pub const CIP1852_PURPOSE: u32 = 1852;

/// SLIP-44 coin type for Cardano (unhardened form).
pub const CARDANO_COIN_TYPE: u32 = 1815;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes.
pub const AES_NONCE_LENGTH: usize = 12;

/// Salt length for the passphrase KDF.
pub const KDF_SALT_LENGTH: usize = 16;

/// Default Argon2id memory cost in KiB.
pub const DEFAULT_KDF_MEMORY_KIB: u32 = 19_456;

/// Default Argon2id iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 2;

/// Default Argon2id lane count.
pub const DEFAULT_KDF_PARALLELISM: u32 = 1;

/// Largest Argon2id memory cost accepted from a state blob (1 GiB).
pub const MAX_KDF_MEMORY_KIB: u32 = 1 << 20;

/// Largest Argon2id iteration count accepted from a state blob.
pub const MAX_KDF_ITERATIONS: u32 = 64;

/// Largest Argon2id lane count accepted from a state blob.
pub const MAX_KDF_PARALLELISM: u32 = 16;

// ---------------------------------------------------------------------------
// Key Handler State
// ---------------------------------------------------------------------------

/// Magic prefix of a serialized key-handler state blob ("TXKH").
pub const HANDLER_STATE_MAGIC: u32 = 0x5458_4B48;

/// Current version of the key-handler state envelope.
pub const HANDLER_STATE_VERSION: u16 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_multiplier_escalates() {
        assert!(REF_SCRIPT_TIER_MULTIPLIER > 1.0);
        assert!(REF_SCRIPT_TIER_SIZE > 0);
    }

    #[test]
    fn key_lengths_are_consistent() {
        assert_eq!(
            BIP32_PRIVATE_KEY_LENGTH,
            2 * SIGNING_KEY_LENGTH + CHAIN_CODE_LENGTH
        );
        assert_eq!(
            BIP32_PUBLIC_KEY_LENGTH,
            VERIFYING_KEY_LENGTH + CHAIN_CODE_LENGTH
        );
        assert_eq!(SIGNATURE_LENGTH, 64);
    }

    #[test]
    fn handler_magic_is_ascii() {
        let bytes = HANDLER_STATE_MAGIC.to_be_bytes();
        assert!(bytes.iter().all(|b| b.is_ascii_uppercase()));
    }
}
