//! CIP-1852 derivation paths.
//!
//! A full path is `m / purpose' / coin_type' / account' / role / index`.
//! Indices are stored as raw `u32`, so a hardened index carries the
//! `0x8000_0000` bit. Text form marks hardened components with `'` (and
//! also accepts `h` when parsing).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::KeyHandlerError;
use crate::config::{CARDANO_COIN_TYPE, CIP1852_PURPOSE, HARDENED_OFFSET};

pub const fn harden(index: u32) -> u32 {
    index | HARDENED_OFFSET
}

pub const fn is_hardened(index: u32) -> bool {
    index & HARDENED_OFFSET != 0
}

/// Path down to an account key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountDerivationPath {
    pub purpose: u32,
    pub coin_type: u32,
    pub account: u32,
}

impl AccountDerivationPath {
    /// `m/1852'/1815'/account'`.
    pub const fn cip1852(account: u32) -> Self {
        Self {
            purpose: harden(CIP1852_PURPOSE),
            coin_type: harden(CARDANO_COIN_TYPE),
            account: harden(account),
        }
    }

    pub fn indices(&self) -> [u32; 3] {
        [self.purpose, self.coin_type, self.account]
    }
}

/// Path down to a single signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationPath {
    pub purpose: u32,
    pub coin_type: u32,
    pub account: u32,
    pub role: u32,
    pub index: u32,
}

impl DerivationPath {
    /// Role of payment addresses handed out to others.
    pub const ROLE_EXTERNAL: u32 = 0;
    /// Role of change addresses.
    pub const ROLE_INTERNAL: u32 = 1;
    /// Role of the stake key.
    pub const ROLE_STAKING: u32 = 2;

    /// `m/1852'/1815'/account'/role/index`.
    pub const fn cip1852(account: u32, role: u32, index: u32) -> Self {
        Self {
            purpose: harden(CIP1852_PURPOSE),
            coin_type: harden(CARDANO_COIN_TYPE),
            account: harden(account),
            role,
            index,
        }
    }

    pub fn indices(&self) -> [u32; 5] {
        [
            self.purpose,
            self.coin_type,
            self.account,
            self.role,
            self.index,
        ]
    }

    pub fn account_path(&self) -> AccountDerivationPath {
        AccountDerivationPath {
            purpose: self.purpose,
            coin_type: self.coin_type,
            account: self.account,
        }
    }
}

fn write_components(f: &mut fmt::Formatter<'_>, indices: &[u32]) -> fmt::Result {
    f.write_str("m")?;
    for &i in indices {
        if is_hardened(i) {
            write!(f, "/{}'", i & !HARDENED_OFFSET)?;
        } else {
            write!(f, "/{i}")?;
        }
    }
    Ok(())
}

fn parse_components<const N: usize>(s: &str) -> Result<[u32; N], KeyHandlerError> {
    let invalid = |why: &str| KeyHandlerError::InvalidDerivationPath(format!("{s:?}: {why}"));

    let mut parts = s.split('/');
    if parts.next() != Some("m") {
        return Err(invalid("must start with \"m\""));
    }

    let mut out = [0u32; N];
    let mut count = 0;
    for part in parts {
        if count == N {
            return Err(invalid(&format!("expected {N} components")));
        }
        let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
            Some(d) => (d, true),
            None => (part, false),
        };
        let value: u32 = digits
            .parse()
            .map_err(|_| invalid(&format!("bad component {part:?}")))?;
        if is_hardened(value) {
            return Err(invalid(&format!("component {value} out of range")));
        }
        out[count] = if hardened { harden(value) } else { value };
        count += 1;
    }
    if count != N {
        return Err(invalid(&format!("expected {N} components")));
    }
    Ok(out)
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.indices())
    }
}

impl fmt::Display for AccountDerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_components(f, &self.indices())
    }
}

impl FromStr for DerivationPath {
    type Err = KeyHandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [purpose, coin_type, account, role, index] = parse_components::<5>(s)?;
        Ok(Self {
            purpose,
            coin_type,
            account,
            role,
            index,
        })
    }
}

impl FromStr for AccountDerivationPath {
    type Err = KeyHandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [purpose, coin_type, account] = parse_components::<3>(s)?;
        Ok(Self {
            purpose,
            coin_type,
            account,
        })
    }
}
