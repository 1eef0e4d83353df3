//! CIP-2 random-improve selection.
//!
//! Phase one covers each target dimension (assets first, then coin) by
//! drawing random candidates that hold some of it. Phase two revisits each
//! dimension and keeps drawing while a draw moves the selected amount closer
//! to twice the target without exceeding three times the target. The first
//! draw that fails either condition ends improvement for that dimension.
//!
//! The effect is change outputs of roughly the payment's size, which keeps
//! a wallet's UTXO set spread over useful denominations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{dimensions, CoinSelection, CoinSelector, Dimension, Pool, SelectionError};
use crate::ledger::{Utxo, Value};

/// Improvement aims for `IDEAL_FACTOR × target` in each dimension.
const IDEAL_FACTOR: u128 = 2;
/// Improvement never exceeds `MAX_FACTOR × target` in a dimension.
const MAX_FACTOR: u128 = 3;

#[derive(Debug, Clone)]
pub struct RandomImprove {
    rng: StdRng,
}

impl RandomImprove {
    /// Seeded from the operating system's entropy source.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible selection for tests and simulations.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Positions in `pool.candidates` holding some of `dim`.
    fn holders(pool: &Pool<'_>, dim: &Dimension<'_>) -> Vec<usize> {
        pool.candidates
            .iter()
            .enumerate()
            .filter(|(_, idx)| dim.quantity(pool.utxo(**idx).amount()) > 0)
            .map(|(pos, _)| pos)
            .collect()
    }

    fn random_holder(&mut self, pool: &Pool<'_>, dim: &Dimension<'_>) -> Option<usize> {
        let holders = Self::holders(pool, dim);
        if holders.is_empty() {
            return None;
        }
        Some(holders[self.rng.gen_range(0..holders.len())])
    }

    fn improve(
        &mut self,
        pool: &mut Pool<'_>,
        dim: &Dimension<'_>,
        wanted: u128,
    ) -> Result<(), SelectionError> {
        let ideal = wanted * IDEAL_FACTOR;
        let max = wanted * MAX_FACTOR;
        while let Some(pos) = self.random_holder(pool, dim) {
            let current = dim.quantity(&pool.accumulated);
            let extra = dim.quantity(pool.utxo(pool.candidates[pos]).amount());
            let next = current + extra;
            if next > max || ideal.abs_diff(next) >= ideal.abs_diff(current) {
                break;
            }
            pool.take(pos)?;
        }
        Ok(())
    }
}

impl Default for RandomImprove {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinSelector for RandomImprove {
    fn select(
        &mut self,
        pre_selected: Option<&[Utxo]>,
        available: &[Utxo],
        target: &Value,
    ) -> Result<CoinSelection, SelectionError> {
        let mut pool = Pool::new(pre_selected, available, target)?;
        let dims = dimensions(target);

        for dim in &dims {
            let wanted = dim.quantity(target);
            while dim.quantity(&pool.accumulated) < wanted {
                match self.random_holder(&pool, dim) {
                    Some(pos) => pool.take(pos)?,
                    None => {
                        return Err(SelectionError::InsufficientFunds {
                            missing: target.saturating_sub(&pool.accumulated),
                        })
                    }
                }
            }
        }

        for dim in &dims {
            self.improve(&mut pool, dim, dim.quantity(target))?;
        }

        Ok(pool.finish("random-improve"))
    }
}
