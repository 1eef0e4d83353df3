//! Byte-string newtypes shared by the ledger model.
//!
//! Human-readable formats (JSON) see lowercase hex; binary formats (CBOR,
//! bincode) see raw byte strings. The switch is made on
//! `Serializer::is_human_readable`, so the same type gives readable
//! parameter files and compact wire encodings.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::value::ValueError;
use crate::config::{KEY_HASH_LENGTH, SIGNATURE_LENGTH, TRANSACTION_ID_LENGTH, VERIFYING_KEY_LENGTH};

// ---------------------------------------------------------------------------
// FixedBytes
// ---------------------------------------------------------------------------

/// A fixed-length byte array with hex text form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedBytes<const N: usize>([u8; N]);

/// Hash of a transaction body.
pub type TransactionId = FixedBytes<TRANSACTION_ID_LENGTH>;
/// Hash of a minting policy script.
pub type PolicyId = FixedBytes<KEY_HASH_LENGTH>;
/// Truncated hash of a verification key.
pub type KeyHash = FixedBytes<KEY_HASH_LENGTH>;
/// Hash of a datum or of the script-integrity data.
pub type DataHash = FixedBytes<32>;
/// Raw Ed25519 verification key.
pub type Vkey = FixedBytes<VERIFYING_KEY_LENGTH>;
/// Raw Ed25519 signature.
pub type SignatureBytes = FixedBytes<SIGNATURE_LENGTH>;

impl<const N: usize> FixedBytes<N> {
    pub const LEN: usize = N;

    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValueError> {
        let array: [u8; N] = bytes.try_into().map_err(|_| ValueError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    pub fn from_hex(s: &str) -> Result<Self, ValueError> {
        let bytes = hex::decode(s).map_err(|e| ValueError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn into_inner(self) -> [u8; N] {
        self.0
    }
}

impl<const N: usize> Default for FixedBytes<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> From<[u8; N]> for FixedBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl<const N: usize> fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> std::str::FromStr for FixedBytes<N> {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl<const N: usize> Serialize for FixedBytes<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedBytes<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            deserializer.deserialize_str(ByteVisitor)?
        } else {
            deserializer.deserialize_bytes(ByteVisitor)?
        };
        Self::from_slice(&bytes).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

/// A variable-length byte string with hex text form.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, ValueError> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| ValueError::InvalidHex(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", self.to_hex())
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = if deserializer.is_human_readable() {
            deserializer.deserialize_str(ByteVisitor)?
        } else {
            deserializer.deserialize_bytes(ByteVisitor)?
        };
        Ok(Self(bytes))
    }
}

/// Accepts hex text, raw byte strings, or a sequence of `u8`.
pub(crate) struct ByteVisitor;

impl<'de> Visitor<'de> for ByteVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a hex string or a byte string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        hex::decode(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            out.push(byte);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_bytes_rejects_wrong_length() {
        let err = PolicyId::from_slice(&[0u8; 27]).unwrap_err();
        assert!(matches!(
            err,
            ValueError::InvalidLength {
                expected: 28,
                actual: 27
            }
        ));
    }

    #[test]
    fn json_form_is_hex() {
        let id = TransactionId::new([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: TransactionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn cbor_form_is_a_byte_string() {
        let hash = KeyHash::new([7u8; 28]);
        let mut buf = Vec::new();
        ciborium::into_writer(&hash, &mut buf).unwrap();
        // major type 2, one-byte length follows, 28 payload bytes
        assert_eq!(buf[0], 0x58);
        assert_eq!(buf[1], 28);
        assert_eq!(buf.len(), 30);
    }

    #[test]
    fn bad_hex_is_reported() {
        assert!(matches!(
            Bytes::from_hex("zz"),
            Err(ValueError::InvalidHex(_))
        ));
    }
}
