//! # Hashing Utilities
//!
//! Hash functions used by txforge, and nothing else:
//!
//! - **BLAKE3**: body hashes (transaction ids), key hashes, script hashes.
//!   Key and script hashes are the first 28 bytes of the 32-byte digest.
//! - **HMAC-SHA512**: the PRF behind BIP32-Ed25519 child key derivation.
//! - **SHA-512**: expands a BIP32 root key from seed material.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};

use crate::config::KEY_HASH_LENGTH;

type HmacSha512 = Hmac<Sha512>;

/// 32-byte BLAKE3 digest.
///
/// # Example
///
/// ```
/// use txforge::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"txforge");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// BLAKE3 truncated to 224 bits, the width of key and script hashes.
pub fn blake3_224(data: &[u8]) -> [u8; KEY_HASH_LENGTH] {
    let full = blake3_hash(data);
    let mut out = [0u8; KEY_HASH_LENGTH];
    out.copy_from_slice(&full[..KEY_HASH_LENGTH]);
    out
}

/// SHA-512 of the input.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA512 over the concatenation of `parts`.
///
/// Taking the message in pieces keeps secret key bytes out of temporary
/// concatenation buffers.
pub fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    // HMAC accepts keys of any length; new_from_slice cannot fail.
    let mut mac = match HmacSha512::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts any key length"),
    };
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_is_deterministic() {
        assert_eq!(blake3_hash(b"abc"), blake3_hash(b"abc"));
        assert_ne!(blake3_hash(b"abc"), blake3_hash(b"abd"));
    }

    #[test]
    fn blake3_224_is_a_prefix() {
        let full = blake3_hash(b"key");
        let short = blake3_224(b"key");
        assert_eq!(&full[..28], &short[..]);
    }

    #[test]
    fn sha512_known_vector() {
        // SHA-512("abc") from FIPS 180-2
        let digest = sha512(b"abc");
        assert_eq!(
            hex::encode(&digest[..8]),
            "ddaf35a193617aba"
        );
    }

    #[test]
    fn hmac_sha512_rfc4231_case_2() {
        let mac = hmac_sha512(b"Jefe", &[b"what do ya want ", b"for nothing?"]);
        assert_eq!(
            hex::encode(&mac[..16]),
            "164b7a7bfcf819e2e395fbe73b56e0a3"
        );
    }
}
