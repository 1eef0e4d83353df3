//! Multi-asset values.
//!
//! A [`Value`] is an amount of the native coin (lovelace) plus a bundle of
//! native tokens keyed by `(policy id, asset name)`. All arithmetic is
//! checked: overflow is an error, never a wrap. Zero-quantity entries and
//! empty policies are removed by [`Value::normalize`], and every operation
//! that returns a new value returns it normalized.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeStruct, SerializeTuple};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::bytes::{Bytes, PolicyId};
use crate::config::MAX_ASSET_NAME_LENGTH;
use crate::error::ErrorKind;

/// Errors raised by value arithmetic and byte-string parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value arithmetic overflowed")]
    Overflow,

    #[error("coin underflow: cannot subtract {subtrahend} from {minuend}")]
    CoinUnderflow { minuend: u64, subtrahend: u64 },

    #[error("asset name is {0} bytes, maximum is {MAX_ASSET_NAME_LENGTH}")]
    AssetNameTooLong(usize),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl ValueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Overflow | Self::CoinUnderflow { .. } => ErrorKind::IntegerOverflow,
            Self::AssetNameTooLong(_) | Self::InvalidLength { .. } => ErrorKind::InvalidArgument,
            Self::InvalidHex(_) => ErrorKind::Decoding,
        }
    }
}

// ---------------------------------------------------------------------------
// AssetName
// ---------------------------------------------------------------------------

/// Name of a token under a policy; at most 32 bytes, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AssetName(Bytes);

impl AssetName {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValueError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_ASSET_NAME_LENGTH {
            return Err(ValueError::AssetNameTooLong(bytes.len()));
        }
        Ok(Self(Bytes::new(bytes)))
    }

    pub fn from_hex(s: &str) -> Result<Self, ValueError> {
        Self::new(Bytes::from_hex(s)?.into_inner())
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = Bytes::deserialize(deserializer)?;
        Self::new(bytes.into_inner()).map_err(de::Error::custom)
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

// ---------------------------------------------------------------------------
// MultiAsset
// ---------------------------------------------------------------------------

/// Token quantities keyed by policy, then asset name.
///
/// Quantities are signed so the same type serves outputs (always positive)
/// and mint fields (negative means burn).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiAsset(BTreeMap<PolicyId, BTreeMap<AssetName, i64>>);

impl MultiAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` to the entry, creating it if absent.
    pub fn insert(
        &mut self,
        policy: PolicyId,
        name: AssetName,
        quantity: i64,
    ) -> Result<(), ValueError> {
        let slot = self.0.entry(policy).or_default().entry(name).or_insert(0);
        *slot = slot.checked_add(quantity).ok_or(ValueError::Overflow)?;
        Ok(())
    }

    pub fn get(&self, policy: &PolicyId, name: &AssetName) -> i64 {
        self.0
            .get(policy)
            .and_then(|assets| assets.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &AssetName, i64)> + '_ {
        self.0
            .iter()
            .flat_map(|(policy, assets)| assets.iter().map(move |(name, q)| (policy, name, *q)))
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> + '_ {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|assets| assets.values().all(|q| *q == 0))
    }

    /// Number of distinct non-zero assets.
    pub fn len(&self) -> usize {
        self.iter().filter(|(_, _, q)| *q != 0).count()
    }

    /// Splits into (positive part, magnitude of the negative part).
    ///
    /// For a mint field this yields (minted, burned).
    pub fn split_signs(&self) -> (MultiAsset, MultiAsset) {
        let mut positive = MultiAsset::new();
        let mut negative = MultiAsset::new();
        for (policy, name, q) in self.iter() {
            if q > 0 {
                positive.set(*policy, name.clone(), q);
            } else if q < 0 {
                // i64::MIN has no positive counterpart; clamp to MAX.
                negative.set(*policy, name.clone(), q.checked_neg().unwrap_or(i64::MAX));
            }
        }
        (positive, negative)
    }

    pub fn normalize(&mut self) {
        for assets in self.0.values_mut() {
            assets.retain(|_, q| *q != 0);
        }
        self.0.retain(|_, assets| !assets.is_empty());
    }

    fn set(&mut self, policy: PolicyId, name: AssetName, quantity: i64) {
        self.0.entry(policy).or_default().insert(name, quantity);
    }

    fn checked_combine(
        &self,
        other: &MultiAsset,
        op: fn(i64, i64) -> Option<i64>,
    ) -> Result<MultiAsset, ValueError> {
        let mut out = self.clone();
        for (policy, name, q) in other.iter() {
            let current = out.get(policy, name);
            let next = op(current, q).ok_or(ValueError::Overflow)?;
            out.set(*policy, name.clone(), next);
        }
        out.normalize();
        Ok(out)
    }

    pub fn checked_add(&self, other: &MultiAsset) -> Result<MultiAsset, ValueError> {
        self.checked_combine(other, i64::checked_add)
    }

    pub fn checked_sub(&self, other: &MultiAsset) -> Result<MultiAsset, ValueError> {
        self.checked_combine(other, i64::checked_sub)
    }
}

impl FromIterator<(PolicyId, AssetName, i64)> for MultiAsset {
    /// Collects entries; quantities for repeated keys saturate rather than
    /// fail, so use [`MultiAsset::insert`] when overflow must be detected.
    fn from_iter<I: IntoIterator<Item = (PolicyId, AssetName, i64)>>(iter: I) -> Self {
        let mut out = MultiAsset::new();
        for (policy, name, q) in iter {
            let current = out.get(&policy, &name);
            out.set(policy, name, current.saturating_add(q));
        }
        out.normalize();
        out
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Lovelace plus native tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: u64,
    pub assets: MultiAsset,
}

impl Value {
    pub fn new(coin: u64, assets: MultiAsset) -> Self {
        let mut value = Self { coin, assets };
        value.normalize();
        value
    }

    pub fn from_coin(coin: u64) -> Self {
        Self {
            coin,
            assets: MultiAsset::new(),
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.coin == 0 && self.assets.is_empty()
    }

    pub fn has_assets(&self) -> bool {
        !self.assets.is_empty()
    }

    pub fn normalize(&mut self) {
        self.assets.normalize();
    }

    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        let coin = self.coin.checked_add(other.coin).ok_or(ValueError::Overflow)?;
        let assets = self.assets.checked_add(&other.assets)?;
        Ok(Value { coin, assets })
    }

    /// Component-wise subtraction. Coin must not go below zero; token
    /// quantities may, which is how a mint field records a burn.
    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        let coin = self
            .coin
            .checked_sub(other.coin)
            .ok_or(ValueError::CoinUnderflow {
                minuend: self.coin,
                subtrahend: other.coin,
            })?;
        let assets = self.assets.checked_sub(&other.assets)?;
        Ok(Value { coin, assets })
    }

    /// Component-wise subtraction clamped at zero. Entries that would become
    /// non-positive are dropped.
    pub fn saturating_sub(&self, other: &Value) -> Value {
        let coin = self.coin.saturating_sub(other.coin);
        let assets = self
            .assets
            .iter()
            .map(|(policy, name, q)| {
                let rest = q.saturating_sub(other.assets.get(policy, name)).max(0);
                (*policy, name.clone(), rest)
            })
            .collect();
        Value { coin, assets }
    }

    /// True when `self ⊒ target` for the coin and every positive asset of
    /// the target.
    pub fn covers(&self, target: &Value) -> bool {
        self.coin >= target.coin
            && target
                .assets
                .iter()
                .filter(|(_, _, q)| *q > 0)
                .all(|(policy, name, q)| self.assets.get(policy, name) >= q)
    }

    /// Checked sum of many values.
    pub fn sum<'a, I>(values: I) -> Result<Value, ValueError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        values
            .into_iter()
            .try_fold(Value::zero(), |acc, v| acc.checked_add(v))
    }
}

impl From<u64> for Value {
    fn from(coin: u64) -> Self {
        Value::from_coin(coin)
    }
}

// A coin-only value is encoded as a bare unsigned integer, a multi-asset
// value as `[coin, multiasset]`. Text formats get `{ "coin": .., "assets": .. }`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let fields = if self.has_assets() { 2 } else { 1 };
            let mut state = serializer.serialize_struct("Value", fields)?;
            state.serialize_field("coin", &self.coin)?;
            if self.has_assets() {
                state.serialize_field("assets", &self.assets)?;
            }
            state.end()
        } else if self.has_assets() {
            let mut tuple = serializer.serialize_tuple(2)?;
            tuple.serialize_element(&self.coin)?;
            tuple.serialize_element(&self.assets)?;
            tuple.end()
        } else {
            serializer.serialize_u64(self.coin)
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a coin amount, a [coin, assets] pair, or a {coin, assets} map")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from_coin(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        u64::try_from(v)
            .map(Value::from_coin)
            .map_err(|_| E::custom("coin must be non-negative"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let coin: u64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let assets: MultiAsset = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        Ok(Value::new(coin, assets))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut coin = None;
        let mut assets = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "coin" => coin = Some(map.next_value::<u64>()?),
                "assets" => assets = Some(map.next_value::<MultiAsset>()?),
                other => return Err(de::Error::unknown_field(other, &["coin", "assets"])),
            }
        }
        let coin = coin.ok_or_else(|| de::Error::missing_field("coin"))?;
        Ok(Value::new(coin, assets.unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(b: u8) -> PolicyId {
        PolicyId::new([b; 28])
    }

    fn name(s: &str) -> AssetName {
        AssetName::new(s.as_bytes().to_vec()).unwrap()
    }

    fn tokens(entries: &[(u8, &str, i64)]) -> MultiAsset {
        entries
            .iter()
            .map(|(p, n, q)| (policy(*p), name(n), *q))
            .collect()
    }

    #[test]
    fn add_merges_assets() {
        let a = Value::new(10, tokens(&[(1, "A", 5)]));
        let b = Value::new(3, tokens(&[(1, "A", 2), (2, "B", 1)]));
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.coin, 13);
        assert_eq!(sum.assets.get(&policy(1), &name("A")), 7);
        assert_eq!(sum.assets.get(&policy(2), &name("B")), 1);
    }

    #[test]
    fn coin_overflow_is_an_error() {
        let a = Value::from_coin(u64::MAX);
        assert_eq!(
            a.checked_add(&Value::from_coin(1)).unwrap_err(),
            ValueError::Overflow
        );
    }

    #[test]
    fn sub_removes_exhausted_assets() {
        let a = Value::new(10, tokens(&[(1, "A", 5)]));
        let b = Value::new(4, tokens(&[(1, "A", 5)]));
        let diff = a.checked_sub(&b).unwrap();
        assert_eq!(diff, Value::from_coin(6));
        assert!(!diff.has_assets());
    }

    #[test]
    fn coin_underflow_reports_operands() {
        let err = Value::from_coin(1).checked_sub(&Value::from_coin(2)).unwrap_err();
        assert_eq!(
            err,
            ValueError::CoinUnderflow {
                minuend: 1,
                subtrahend: 2
            }
        );
        assert_eq!(err.kind(), ErrorKind::IntegerOverflow);
    }

    #[test]
    fn covers_checks_every_asset() {
        let have = Value::new(100, tokens(&[(1, "A", 5)]));
        assert!(have.covers(&Value::new(100, tokens(&[(1, "A", 5)]))));
        assert!(!have.covers(&Value::new(100, tokens(&[(1, "A", 6)]))));
        assert!(!have.covers(&Value::new(50, tokens(&[(2, "A", 1)]))));
        assert!(!have.covers(&Value::from_coin(101)));
    }

    #[test]
    fn saturating_sub_clamps() {
        let have = Value::new(5, tokens(&[(1, "A", 3), (2, "B", 9)]));
        let take = Value::new(8, tokens(&[(1, "A", 4), (2, "B", 2)]));
        let rest = have.saturating_sub(&take);
        assert_eq!(rest.coin, 0);
        assert_eq!(rest.assets.get(&policy(1), &name("A")), 0);
        assert_eq!(rest.assets.get(&policy(2), &name("B")), 7);
        assert_eq!(rest.assets.len(), 1);
    }

    #[test]
    fn split_signs_separates_mint_and_burn() {
        let mint = tokens(&[(1, "A", 5), (1, "B", -3)]);
        let (minted, burned) = mint.split_signs();
        assert_eq!(minted.get(&policy(1), &name("A")), 5);
        assert_eq!(burned.get(&policy(1), &name("B")), 3);
        assert_eq!(minted.len(), 1);
        assert_eq!(burned.len(), 1);
    }

    #[test]
    fn normalize_drops_empty_policies() {
        let mut assets = MultiAsset::new();
        assets.insert(policy(1), name("A"), 2).unwrap();
        assets.insert(policy(1), name("A"), -2).unwrap();
        assets.normalize();
        assert_eq!(assets.policies().count(), 0);
    }

    #[test]
    fn asset_name_length_is_bounded() {
        assert!(AssetName::new(vec![0u8; 32]).is_ok());
        assert_eq!(
            AssetName::new(vec![0u8; 33]).unwrap_err(),
            ValueError::AssetNameTooLong(33)
        );
    }

    #[test]
    fn coin_only_value_encodes_as_integer() {
        let mut buf = Vec::new();
        ciborium::into_writer(&Value::from_coin(1_000_000), &mut buf).unwrap();
        // 0x1a: unsigned int, four-byte argument
        assert_eq!(buf, vec![0x1a, 0x00, 0x0f, 0x42, 0x40]);
    }

    #[test]
    fn value_decodes_from_both_cbor_shapes() {
        let v = Value::new(7, tokens(&[(3, "tok", 11)]));
        let mut buf = Vec::new();
        ciborium::into_writer(&v, &mut buf).unwrap();
        let back: Value = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn value_json_accepts_bare_number() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::from_coin(42));
        let v: Value = serde_json::from_str(r#"{"coin": 3}"#).unwrap();
        assert_eq!(v, Value::from_coin(3));
    }
}
