//! Shelley-era addresses.
//!
//! The engine treats an address as an opaque byte string whose first byte is
//! a header: the high nibble is the address type, the low nibble the network
//! id. Only what fee and witness computation need is interpreted: the bech32
//! prefix, the network, and the payment key hash of key-payment addresses.

use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::bytes::{ByteVisitor, KeyHash};
use crate::config::{
    KEY_HASH_LENGTH, MAINNET_ADDRESS_HRP, MAINNET_NETWORK_ID, MAINNET_STAKE_HRP,
    TESTNET_ADDRESS_HRP, TESTNET_STAKE_HRP,
};
use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("bech32 decoding failed: {0}")]
    Bech32(String),

    #[error("unexpected bech32 prefix: expected {expected}, got {got}")]
    UnexpectedPrefix { expected: String, got: String },
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty => ErrorKind::InvalidArgument,
            Self::Bech32(_) | Self::UnexpectedPrefix { .. } => ErrorKind::Decoding,
        }
    }
}

/// Shelley address type, taken from the header's high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Payment and stake parts (types 0-3).
    Base,
    /// Payment part plus a chain pointer (types 4-5).
    Pointer,
    /// Payment part only (types 6-7).
    Enterprise,
    /// Legacy bootstrap address (type 8).
    Byron,
    /// Reward account (types 14-15).
    Reward,
    Unknown(u8),
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Vec<u8>);

impl Address {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AddressError> {
        if bytes.is_empty() {
            return Err(AddressError::Empty);
        }
        Ok(Self(bytes))
    }

    /// Enterprise address paying to a key hash.
    pub fn enterprise(network_id: u8, payment: &KeyHash) -> Self {
        let mut bytes = Vec::with_capacity(1 + KEY_HASH_LENGTH);
        bytes.push(0x60 | (network_id & 0x0f));
        bytes.extend_from_slice(payment.as_bytes());
        Self(bytes)
    }

    /// Base address with key payment and key stake credentials.
    pub fn base(network_id: u8, payment: &KeyHash, stake: &KeyHash) -> Self {
        let mut bytes = Vec::with_capacity(1 + 2 * KEY_HASH_LENGTH);
        bytes.push(network_id & 0x0f);
        bytes.extend_from_slice(payment.as_bytes());
        bytes.extend_from_slice(stake.as_bytes());
        Self(bytes)
    }

    /// Reward account for a stake key hash.
    pub fn reward(network_id: u8, stake: &KeyHash) -> Self {
        let mut bytes = Vec::with_capacity(1 + KEY_HASH_LENGTH);
        bytes.push(0xe0 | (network_id & 0x0f));
        bytes.extend_from_slice(stake.as_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn header(&self) -> u8 {
        self.0[0]
    }

    pub fn kind(&self) -> AddressKind {
        match self.header() >> 4 {
            0..=3 => AddressKind::Base,
            4 | 5 => AddressKind::Pointer,
            6 | 7 => AddressKind::Enterprise,
            8 => AddressKind::Byron,
            14 | 15 => AddressKind::Reward,
            other => AddressKind::Unknown(other),
        }
    }

    /// Network id from the header; `None` for bootstrap addresses, which
    /// carry it elsewhere.
    pub fn network_id(&self) -> Option<u8> {
        match self.kind() {
            AddressKind::Byron => None,
            _ => Some(self.header() & 0x0f),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id() == Some(MAINNET_NETWORK_ID)
    }

    /// Payment key hash, when the payment credential is a key (even
    /// address types) rather than a script.
    pub fn payment_key_hash(&self) -> Option<KeyHash> {
        let ty = self.header() >> 4;
        let key_payment = matches!(ty, 0 | 2 | 4 | 6);
        if !key_payment || self.0.len() < 1 + KEY_HASH_LENGTH {
            return None;
        }
        KeyHash::from_slice(&self.0[1..1 + KEY_HASH_LENGTH]).ok()
    }

    /// Human-readable prefix for this address's bech32 form.
    pub fn hrp(&self) -> &'static str {
        match (self.kind(), self.is_mainnet()) {
            (AddressKind::Reward, true) => MAINNET_STAKE_HRP,
            (AddressKind::Reward, false) => TESTNET_STAKE_HRP,
            (_, true) => MAINNET_ADDRESS_HRP,
            (_, false) => TESTNET_ADDRESS_HRP,
        }
    }

    pub fn to_bech32(&self) -> Result<String, AddressError> {
        let hrp = Hrp::parse(self.hrp()).map_err(|e| AddressError::Bech32(e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.0).map_err(|e| AddressError::Bech32(e.to_string()))
    }

    /// Parse a bech32 address and check that the prefix matches the header.
    pub fn from_bech32(s: &str) -> Result<Self, AddressError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| AddressError::Bech32(e.to_string()))?;
        let address = Self::from_bytes(data)?;
        if hrp.as_str() != address.hrp() {
            return Err(AddressError::UnexpectedPrefix {
                expected: address.hrp().to_string(),
                got: hrp.to_string(),
            });
        }
        Ok(address)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bech32(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32() {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(&hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let text = self.to_bech32().map_err(serde::ser::Error::custom)?;
            serializer.serialize_str(&text)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            Self::from_bech32(&text).map_err(de::Error::custom)
        } else {
            let bytes = deserializer.deserialize_bytes(ByteVisitor)?;
            Self::from_bytes(bytes).map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enterprise_address_round_trips_through_bech32() {
        let addr = Address::enterprise(0, &KeyHash::new([9u8; 28]));
        let text = addr.to_bech32().unwrap();
        assert!(text.starts_with("addr_test1"));
        assert_eq!(Address::from_bech32(&text).unwrap(), addr);
    }

    #[test]
    fn reward_address_uses_stake_prefix() {
        let addr = Address::reward(1, &KeyHash::new([1u8; 28]));
        assert_eq!(addr.kind(), AddressKind::Reward);
        assert!(addr.to_bech32().unwrap().starts_with("stake1"));
    }

    #[test]
    fn payment_key_hash_only_for_key_credentials() {
        let pkh = KeyHash::new([3u8; 28]);
        let base = Address::base(1, &pkh, &KeyHash::new([4u8; 28]));
        assert_eq!(base.payment_key_hash(), Some(pkh));
        assert_eq!(base.network_id(), Some(1));

        // type 7: enterprise address with a script payment credential
        let mut bytes = vec![0x71];
        bytes.extend_from_slice(&[5u8; 28]);
        let script = Address::from_bytes(bytes).unwrap();
        assert_eq!(script.payment_key_hash(), None);
    }

    #[test]
    fn prefix_must_match_header() {
        let addr = Address::enterprise(1, &KeyHash::new([2u8; 28]));
        let hrp = Hrp::parse("addr_test").unwrap();
        let wrong = bech32::encode::<Bech32>(hrp, addr.as_bytes()).unwrap();
        assert!(matches!(
            Address::from_bech32(&wrong),
            Err(AddressError::UnexpectedPrefix { .. })
        ));
    }

    #[test]
    fn empty_address_is_rejected() {
        assert_eq!(Address::from_bytes(vec![]).unwrap_err(), AddressError::Empty);
    }
}
