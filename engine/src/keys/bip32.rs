//! # BIP32-Ed25519 Keys
//!
//! Hierarchical Ed25519 keys with the V2 derivation scheme used by Cardano
//! wallets. An extended private key is 96 bytes:
//!
//! ```text
//! kL (32, little-endian scalar) ‖ kR (32, nonce prefix) ‖ chain code (32)
//! ```
//!
//! and the matching extended public key is `A = kL·B` followed by the same
//! chain code. For a child index `i` (little-endian in the MAC input):
//!
//! | index | Z                                   | chain code source           |
//! |-------|-------------------------------------|-----------------------------|
//! | hard  | `HMAC(cc, 0x00 ‖ kL ‖ kR ‖ i)`      | `HMAC(cc, 0x01 ‖ kL ‖ kR ‖ i)` |
//! | soft  | `HMAC(cc, 0x02 ‖ A ‖ i)`            | `HMAC(cc, 0x03 ‖ A ‖ i)`    |
//!
//! `kL' = kL + 8·Z[0..28]`, `kR' = kR + Z[32..64] mod 2^256`, and the new
//! chain code is the right half of the second MAC. Soft children can also
//! be derived from the public key alone: `A' = A + (8·Z[0..28])·B`.
//!
//! Root keys are clamped so that kL is a multiple of 8 and its top three
//! bits are `010`; additions in derivation then never overflow 256 bits for
//! any realistic depth.

use std::fmt;

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::Scalar;
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::derivation::is_hardened;
use super::KeyHandlerError;
use crate::config::{
    BIP32_PRIVATE_KEY_LENGTH, BIP32_PUBLIC_KEY_LENGTH, CHAIN_CODE_LENGTH, SIGNATURE_LENGTH,
    VERIFYING_KEY_LENGTH,
};
use crate::crypto::hash::{hmac_sha512, sha512};

const SEED_CHAIN_CODE_KEY: &[u8] = b"ed25519 seed";

fn clamp(kl: &mut [u8]) {
    kl[0] &= 0b1111_1000;
    kl[31] &= 0b0001_1111;
    kl[31] |= 0b0100_0000;
}

/// `x + 8·y` over 256-bit little-endian integers, `y` being 28 bytes.
fn add_28_mul8(x: &[u8], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let yi = if i < 28 { (y[i] as u16) << 3 } else { 0 };
        let r = x[i] as u16 + yi + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}

/// `x + y mod 2^256`, little-endian.
fn add_256(x: &[u8], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry: u16 = 0;
    for i in 0..32 {
        let r = x[i] as u16 + y[i] as u16 + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}

fn public_from_kl(kl: &[u8]) -> [u8; VERIFYING_KEY_LENGTH] {
    let mut bytes = Zeroizing::new([0u8; 32]);
    bytes.copy_from_slice(kl);
    let scalar = Scalar::from_bytes_mod_order(*bytes);
    EdwardsPoint::mul_base(&scalar).compress().to_bytes()
}

/// 96-byte extended private key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Bip32PrivateKey([u8; BIP32_PRIVATE_KEY_LENGTH]);

impl Bip32PrivateKey {
    /// Fresh random root key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; BIP32_PRIVATE_KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        clamp(&mut bytes[..32]);
        Self(bytes)
    }

    /// Deterministic root key from seed material.
    ///
    /// `kL ‖ kR = SHA-512(seed)` with kL clamped; the chain code is the first
    /// half of `HMAC-SHA512("ed25519 seed", seed)`.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyHandlerError> {
        if seed.len() < 16 {
            return Err(KeyHandlerError::InvalidKey(format!(
                "seed must be at least 16 bytes, got {}",
                seed.len()
            )));
        }
        let expanded = Zeroizing::new(sha512(seed));
        let mac = Zeroizing::new(hmac_sha512(SEED_CHAIN_CODE_KEY, &[seed]));

        let mut bytes = [0u8; BIP32_PRIVATE_KEY_LENGTH];
        bytes[..64].copy_from_slice(&expanded[..]);
        bytes[64..].copy_from_slice(&mac[..CHAIN_CODE_LENGTH]);
        clamp(&mut bytes[..32]);
        Ok(Self(bytes))
    }

    /// Restores a key from its 96-byte form, rejecting unclamped roots.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyHandlerError> {
        let arr: [u8; BIP32_PRIVATE_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            KeyHandlerError::InvalidKey(format!(
                "extended private key must be {BIP32_PRIVATE_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let key = Self(arr);
        if key.0[0] & 0b0000_0111 != 0 || key.0[31] & 0b1000_0000 != 0 {
            return Err(KeyHandlerError::InvalidKey(
                "extended private key scalar is not clamped".into(),
            ));
        }
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; BIP32_PRIVATE_KEY_LENGTH] {
        &self.0
    }

    fn kl(&self) -> &[u8] {
        &self.0[..32]
    }

    fn kr(&self) -> &[u8] {
        &self.0[32..64]
    }

    pub fn chain_code(&self) -> &[u8] {
        &self.0[64..]
    }

    pub fn public_key_bytes(&self) -> [u8; VERIFYING_KEY_LENGTH] {
        public_from_kl(self.kl())
    }

    pub fn to_public(&self) -> Bip32PublicKey {
        let mut bytes = [0u8; BIP32_PUBLIC_KEY_LENGTH];
        bytes[..32].copy_from_slice(&self.public_key_bytes());
        bytes[32..].copy_from_slice(self.chain_code());
        Bip32PublicKey(bytes)
    }

    /// Child key at `index`; hardened when the top bit is set.
    pub fn derive(&self, index: u32) -> Self {
        let idx = index.to_le_bytes();
        let cc = self.chain_code();
        let (z, i) = if is_hardened(index) {
            (
                Zeroizing::new(hmac_sha512(cc, &[&[0x00], self.kl(), self.kr(), &idx])),
                hmac_sha512(cc, &[&[0x01], self.kl(), self.kr(), &idx]),
            )
        } else {
            let a = self.public_key_bytes();
            (
                Zeroizing::new(hmac_sha512(cc, &[&[0x02], &a, &idx])),
                hmac_sha512(cc, &[&[0x03], &a, &idx]),
            )
        };

        let kl = Zeroizing::new(add_28_mul8(self.kl(), &z[..28]));
        let kr = Zeroizing::new(add_256(self.kr(), &z[32..]));

        let mut bytes = [0u8; BIP32_PRIVATE_KEY_LENGTH];
        bytes[..32].copy_from_slice(&kl[..]);
        bytes[32..64].copy_from_slice(&kr[..]);
        bytes[64..].copy_from_slice(&i[32..]);
        Self(bytes)
    }

    pub fn derive_path(&self, indices: &[u32]) -> Self {
        indices
            .iter()
            .fold(self.clone(), |key, &index| key.derive(index))
    }

    /// Ed25519 signature using kL as the scalar and kR as the nonce prefix.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let mut scalar_bytes = Zeroizing::new([0u8; 32]);
        scalar_bytes.copy_from_slice(self.kl());
        let mut hash_prefix = [0u8; 32];
        hash_prefix.copy_from_slice(self.kr());

        let esk = ExpandedSecretKey {
            scalar: Scalar::from_bytes_mod_order(*scalar_bytes),
            hash_prefix,
        };
        hash_prefix.zeroize();
        let verifying_key = VerifyingKey::from(&esk);
        raw_sign::<Sha512>(&esk, message, &verifying_key).to_bytes()
    }
}

impl fmt::Debug for Bip32PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bip32PrivateKey(pub={})", hex::encode(self.public_key_bytes()))
    }
}

/// 64-byte extended public key: `A ‖ chain code`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bip32PublicKey([u8; BIP32_PUBLIC_KEY_LENGTH]);

impl Bip32PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyHandlerError> {
        let arr: [u8; BIP32_PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            KeyHandlerError::InvalidKey(format!(
                "extended public key must be {BIP32_PUBLIC_KEY_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        let key = Self(arr);
        key.point()?;
        Ok(key)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyHandlerError> {
        let bytes = hex::decode(s).map_err(|e| KeyHandlerError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; BIP32_PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn public_key_bytes(&self) -> [u8; VERIFYING_KEY_LENGTH] {
        let mut out = [0u8; VERIFYING_KEY_LENGTH];
        out.copy_from_slice(&self.0[..32]);
        out
    }

    pub fn chain_code(&self) -> &[u8] {
        &self.0[32..]
    }

    fn point(&self) -> Result<EdwardsPoint, KeyHandlerError> {
        CompressedEdwardsY(self.public_key_bytes())
            .decompress()
            .ok_or_else(|| KeyHandlerError::InvalidKey("not a curve point".into()))
    }

    /// Soft child at `index`. Hardened indices need the private key.
    pub fn derive(&self, index: u32) -> Result<Self, KeyHandlerError> {
        if is_hardened(index) {
            return Err(KeyHandlerError::InvalidDerivationPath(format!(
                "cannot derive hardened index {index:#x} from a public key"
            )));
        }
        let idx = index.to_le_bytes();
        let a = self.public_key_bytes();
        let cc = self.chain_code();
        let z = hmac_sha512(cc, &[&[0x02], &a, &idx]);
        let i = hmac_sha512(cc, &[&[0x03], &a, &idx]);

        let tweak = add_28_mul8(&[0u8; 32], &z[..28]);
        let child = self.point()? + EdwardsPoint::mul_base(&Scalar::from_bytes_mod_order(tweak));

        let mut bytes = [0u8; BIP32_PUBLIC_KEY_LENGTH];
        bytes[..32].copy_from_slice(&child.compress().to_bytes());
        bytes[32..].copy_from_slice(&i[32..]);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Bip32PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bip32PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for Bip32PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
