//! CIP-2 largest-first selection.
//!
//! Each target dimension is covered in turn, assets first and coin last, by
//! repeatedly taking the candidate holding the most of that dimension. Ties
//! go to the earlier UTXO in the pool, so the result is fully deterministic.

use super::{dimensions, CoinSelection, CoinSelector, Pool, SelectionError};
use crate::ledger::{Utxo, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirst;

impl LargestFirst {
    pub fn new() -> Self {
        Self
    }
}

impl CoinSelector for LargestFirst {
    fn select(
        &mut self,
        pre_selected: Option<&[Utxo]>,
        available: &[Utxo],
        target: &Value,
    ) -> Result<CoinSelection, SelectionError> {
        let mut pool = Pool::new(pre_selected, available, target)?;

        for dim in dimensions(target) {
            let wanted = dim.quantity(target);
            while dim.quantity(&pool.accumulated) < wanted {
                // max_by_key keeps the last maximum; reverse to prefer the first.
                let best = pool
                    .candidates
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(pos, &idx)| (pos, dim.quantity(pool.utxo(idx).amount())))
                    .filter(|(_, q)| *q > 0)
                    .max_by_key(|(_, q)| *q)
                    .map(|(pos, _)| pos);

                match best {
                    Some(pos) => pool.take(pos)?,
                    // Pool::new verified coverage up front.
                    None => {
                        return Err(SelectionError::InsufficientFunds {
                            missing: target.saturating_sub(&pool.accumulated),
                        })
                    }
                }
            }
        }

        Ok(pool.finish("largest-first"))
    }
}
