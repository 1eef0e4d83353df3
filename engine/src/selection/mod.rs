//! # Coin Selection
//!
//! Given a pool of spendable UTXOs and a target value, a [`CoinSelector`]
//! partitions the pool into `selected` and `remaining` so that the selected
//! UTXOs, together with any pre-selected ones, cover the target in coin and
//! in every asset.
//!
//! Guarantees every strategy upholds:
//!
//! - `value(selected) + value(pre_selected) ⊒ target` on success;
//! - `selected ⊎ remaining = available`, with `remaining` in pool order;
//! - the pool is borrowed immutably and never reordered;
//! - a UTXO that is both pre-selected and in the pool is never selected
//!   again and lands in `remaining`;
//! - an uncoverable target fails with [`SelectionError::InsufficientFunds`],
//!   before anything is selected.
//!
//! Two strategies ship with the engine:
//!
//! - [`LargestFirst`]: deterministic, fewest inputs for the target.
//! - [`RandomImprove`]: randomized, aims for change outputs close to the
//!   payment amount, which keeps the UTXO set healthy over time.

pub mod largest_first;
pub mod random_improve;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::ledger::{AssetName, PolicyId, TransactionInput, Utxo, Value, ValueError};

pub use largest_first::LargestFirst;
pub use random_improve::RandomImprove;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("insufficient funds: missing {missing:?}")]
    InsufficientFunds { missing: Value },

    #[error("invalid selection target: {0}")]
    InvalidTarget(String),

    #[error("unknown selection strategy {0:?}; expected largest-first or random-improve")]
    UnknownStrategy(String),

    #[error("selection arithmetic overflowed")]
    Overflow,
}

impl SelectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidTarget(_) | Self::UnknownStrategy(_) => ErrorKind::InvalidArgument,
            Self::Overflow => ErrorKind::IntegerOverflow,
        }
    }
}

impl From<ValueError> for SelectionError {
    fn from(_: ValueError) -> Self {
        Self::Overflow
    }
}

/// Result of a successful selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoinSelection {
    pub selected: Vec<Utxo>,
    pub remaining: Vec<Utxo>,
}

impl CoinSelection {
    /// Sum of the selected UTXOs.
    pub fn selected_value(&self) -> Result<Value, ValueError> {
        Value::sum(self.selected.iter().map(Utxo::amount))
    }
}

/// A coin-selection strategy.
///
/// `select` takes `&mut self` so strategies can own mutable state such as
/// an RNG.
pub trait CoinSelector {
    fn select(
        &mut self,
        pre_selected: Option<&[Utxo]>,
        available: &[Utxo],
        target: &Value,
    ) -> Result<CoinSelection, SelectionError>;
}

impl<S: CoinSelector + ?Sized> CoinSelector for Box<S> {
    fn select(
        &mut self,
        pre_selected: Option<&[Utxo]>,
        available: &[Utxo],
        target: &Value,
    ) -> Result<CoinSelection, SelectionError> {
        (**self).select(pre_selected, available, target)
    }
}

/// Named strategy, for configuration surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    LargestFirst,
    RandomImprove,
}

impl SelectionStrategy {
    /// Instantiate the strategy. `seed` only affects [`RandomImprove`].
    pub fn selector(&self, seed: Option<u64>) -> Box<dyn CoinSelector + Send> {
        match self {
            Self::LargestFirst => Box::new(LargestFirst::new()),
            Self::RandomImprove => Box::new(match seed {
                Some(seed) => RandomImprove::with_seed(seed),
                None => RandomImprove::new(),
            }),
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargestFirst => write!(f, "largest-first"),
            Self::RandomImprove => write!(f, "random-improve"),
        }
    }
}

impl FromStr for SelectionStrategy {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "largest-first" => Ok(Self::LargestFirst),
            "random-improve" => Ok(Self::RandomImprove),
            other => Err(SelectionError::UnknownStrategy(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared bookkeeping
// ---------------------------------------------------------------------------

/// What a strategy must cover, one dimension at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dimension<'a> {
    Asset(&'a PolicyId, &'a AssetName),
    Coin,
}

impl Dimension<'_> {
    pub(crate) fn quantity(&self, value: &Value) -> u128 {
        match self {
            Self::Asset(policy, name) => value.assets.get(policy, name).max(0) as u128,
            Self::Coin => value.coin as u128,
        }
    }
}

/// Target dimensions in processing order: assets (policy, then name), then
/// coin. Zero quantities are skipped.
pub(crate) fn dimensions(target: &Value) -> Vec<Dimension<'_>> {
    let mut dims: Vec<Dimension<'_>> = target
        .assets
        .iter()
        .filter(|(_, _, q)| *q > 0)
        .map(|(policy, name, _)| Dimension::Asset(policy, name))
        .collect();
    if target.coin > 0 {
        dims.push(Dimension::Coin);
    }
    dims
}

/// Partition state shared by the strategies.
pub(crate) struct Pool<'a> {
    available: &'a [Utxo],
    /// Indices into `available` still eligible for selection.
    pub(crate) candidates: Vec<usize>,
    /// Indices into `available`, in selection order.
    pub(crate) selected: Vec<usize>,
    /// Pre-selected plus selected value.
    pub(crate) accumulated: Value,
}

impl<'a> Pool<'a> {
    /// Validates the target, excludes pre-selected UTXOs from the candidates
    /// and fails early if even the whole pool cannot cover the target.
    pub(crate) fn new(
        pre_selected: Option<&[Utxo]>,
        available: &'a [Utxo],
        target: &Value,
    ) -> Result<Self, SelectionError> {
        if let Some((policy, name, q)) = target.assets.iter().find(|(_, _, q)| *q < 0) {
            return Err(SelectionError::InvalidTarget(format!(
                "negative quantity {q} for {policy}.{name}"
            )));
        }

        let pre_selected = pre_selected.unwrap_or(&[]);
        let pre_inputs: BTreeSet<&TransactionInput> = pre_selected.iter().map(|u| &u.input).collect();
        let accumulated = Value::sum(pre_selected.iter().map(Utxo::amount))?;

        let candidates: Vec<usize> = available
            .iter()
            .enumerate()
            .filter(|(_, u)| !pre_inputs.contains(&u.input))
            .map(|(i, _)| i)
            .collect();

        let reachable = candidates
            .iter()
            .try_fold(accumulated.clone(), |acc, &i| acc.checked_add(available[i].amount()))?;
        if !reachable.covers(target) {
            return Err(SelectionError::InsufficientFunds {
                missing: target.saturating_sub(&reachable),
            });
        }

        Ok(Self {
            available,
            candidates,
            selected: Vec::new(),
            accumulated,
        })
    }

    pub(crate) fn utxo(&self, index: usize) -> &'a Utxo {
        &self.available[index]
    }

    /// Moves the candidate at `position` (an index into `candidates`) into
    /// the selection.
    pub(crate) fn take(&mut self, position: usize) -> Result<(), SelectionError> {
        let index = self.candidates.remove(position);
        self.accumulated = self.accumulated.checked_add(self.available[index].amount())?;
        self.selected.push(index);
        Ok(())
    }

    pub(crate) fn finish(self, strategy: &str) -> CoinSelection {
        let chosen: BTreeSet<usize> = self.selected.iter().copied().collect();
        let selected: Vec<Utxo> = self.selected.iter().map(|&i| self.available[i].clone()).collect();
        let remaining: Vec<Utxo> = self
            .available
            .iter()
            .enumerate()
            .filter(|(i, _)| !chosen.contains(i))
            .map(|(_, u)| u.clone())
            .collect();
        debug!(
            strategy,
            selected = selected.len(),
            remaining = remaining.len(),
            "coin selection complete"
        );
        CoinSelection {
            selected,
            remaining,
        }
    }
}
