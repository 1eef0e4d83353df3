//! # Fee Estimation
//!
//! A transaction's minimum fee has three parts:
//!
//! 1. a linear size fee, `min_fee_b + min_fee_a * size`;
//! 2. a script execution fee, the redeemers' summed ExUnits priced by the
//!    protocol's memory and step prices;
//! 3. a reference-script fee over the bytes of every non-native script that
//!    the transaction's reference inputs carry, priced per byte in tiers
//!    that grow geometrically.
//!
//! Because the fee is part of the body, the size fee depends on itself.
//! This module does not iterate: each function prices the transaction it is
//! given. Callers re-run selection and pricing until the fee stops moving,
//! or use [`crate::balancing`], which does exactly that with a bound.
//!
//! The same self-reference appears per output: an output must hold at least
//! `(size + UTXO_ENTRY_OVERHEAD) * coins_per_utxo_byte` lovelace, and its
//! size includes that lovelace amount. [`compute_min_ada_required`] solves
//! it as a bounded fixed point.

use thiserror::Error;
use tracing::{debug, trace};

use crate::codec::{self, CodecError};
use crate::config::{
    MAX_MIN_ADA_ITERATIONS, REF_SCRIPT_TIER_MULTIPLIER, REF_SCRIPT_TIER_SIZE, UTXO_ENTRY_OVERHEAD,
};
use crate::error::ErrorKind;
use crate::ledger::{
    ExUnitPrices, ExUnits, ProtocolParameters, Redeemer, Transaction, TransactionOutput,
    UnitInterval, Utxo,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("invalid fee argument: {0}")]
    InvalidArgument(String),

    #[error("fee arithmetic overflowed")]
    Overflow,

    #[error("minimum ADA did not converge after {0} iterations")]
    MinAdaDidNotConverge(usize),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl FeeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::MinAdaDidNotConverge(_) => ErrorKind::InvalidArgument,
            Self::Overflow => ErrorKind::IntegerOverflow,
            Self::Codec(e) => e.kind(),
        }
    }
}

/// Every component of a computed fee, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FeeBreakdown {
    pub size: u64,
    pub size_fee: u64,
    pub ex_units: ExUnits,
    pub execution_fee: u64,
    pub reference_script_bytes: u64,
    pub reference_script_fee: u64,
    pub total: u64,
}

/// `constant + coefficient * size`, checked.
pub fn linear_fee(size: u64, constant: u64, coefficient: u64) -> Result<u64, FeeError> {
    coefficient
        .checked_mul(size)
        .and_then(|variable| variable.checked_add(constant))
        .ok_or(FeeError::Overflow)
}

/// Size fee of `tx` as encoded right now.
pub fn min_fee_without_scripts(
    tx: &Transaction,
    min_fee_constant: u64,
    min_fee_coefficient: u64,
) -> Result<u64, FeeError> {
    let size = codec::transaction_size(tx)? as u64;
    linear_fee(size, min_fee_constant, min_fee_coefficient)
}

/// Sum of all redeemer budgets.
pub fn total_ex_units(redeemers: &[Redeemer]) -> Result<ExUnits, FeeError> {
    redeemers
        .iter()
        .try_fold(ExUnits::default(), |acc, r| acc.checked_add(&r.ex_units))
        .ok_or(FeeError::Overflow)
}

/// Total encoded bytes of non-native reference scripts among `utxos`.
pub fn reference_script_bytes(utxos: &[Utxo]) -> Result<u64, FeeError> {
    let mut total: u64 = 0;
    for script in utxos
        .iter()
        .filter_map(|u| u.output.script_ref.as_ref())
        .filter(|s| !s.is_native())
    {
        let size = codec::script_size(script)? as u64;
        total = total.checked_add(size).ok_or(FeeError::Overflow)?;
    }
    Ok(total)
}

fn checked_price(price: &UnitInterval, what: &str) -> Result<f64, FeeError> {
    if price.denominator == 0 {
        return Err(FeeError::InvalidArgument(format!(
            "{what}: zero denominator"
        )));
    }
    let value = price.to_f64();
    if !value.is_finite() || value < 0.0 {
        return Err(FeeError::InvalidArgument(format!("{what}: {price}")));
    }
    Ok(value)
}

fn ceil_to_u64(x: f64) -> Result<u64, FeeError> {
    let c = x.ceil();
    if !c.is_finite() || c >= u64::MAX as f64 {
        return Err(FeeError::Overflow);
    }
    Ok(c as u64)
}

/// Tiered fee for reference-script bytes.
///
/// Bytes are charged in tiers of [`REF_SCRIPT_TIER_SIZE`]; each tier costs
/// `ceil(tier_bytes * price)` and multiplies the price by
/// [`REF_SCRIPT_TIER_MULTIPLIER`] for the next tier.
pub fn compute_script_ref_fee(
    resolved_reference_inputs: &[Utxo],
    coins_per_ref_script_byte: &UnitInterval,
) -> Result<u64, FeeError> {
    let total_bytes = reference_script_bytes(resolved_reference_inputs)?;
    tiered_ref_script_fee(total_bytes, coins_per_ref_script_byte)
}

fn tiered_ref_script_fee(total_bytes: u64, price: &UnitInterval) -> Result<u64, FeeError> {
    if total_bytes == 0 {
        return Ok(0);
    }
    let mut base = checked_price(price, "ref_script_cost_per_byte")?;
    let mut remaining = total_bytes;
    let mut fee: u64 = 0;
    while remaining > 0 {
        let chunk = remaining.min(REF_SCRIPT_TIER_SIZE);
        let tier_fee = ceil_to_u64(chunk as f64 * base)?;
        fee = fee.checked_add(tier_fee).ok_or(FeeError::Overflow)?;
        remaining -= chunk;
        base *= REF_SCRIPT_TIER_MULTIPLIER;
    }
    trace!(total_bytes, fee, "reference script fee");
    Ok(fee)
}

/// `ceil(steps * steps_price + memory * memory_price)`, with both prices
/// converted to `f64` before multiplying.
fn execution_fee(units: &ExUnits, prices: &ExUnitPrices) -> Result<u64, FeeError> {
    let steps_price = checked_price(&prices.steps_price, "steps_price")?;
    let memory_price = checked_price(&prices.memory_price, "memory_price")?;
    ceil_to_u64(units.steps as f64 * steps_price + units.memory as f64 * memory_price)
}

/// Execution fee plus reference-script fee. Zero when the transaction has
/// no redeemers.
pub fn compute_min_script_fee(
    tx: &Transaction,
    prices: &ExUnitPrices,
    resolved_reference_inputs: &[Utxo],
    coins_per_ref_script_byte: &UnitInterval,
) -> Result<u64, FeeError> {
    let redeemers = tx.redeemers();
    if redeemers.is_empty() {
        return Ok(0);
    }
    let units = total_ex_units(redeemers)?;
    let exec = execution_fee(&units, prices)?;
    let refs = compute_script_ref_fee(resolved_reference_inputs, coins_per_ref_script_byte)?;
    exec.checked_add(refs).ok_or(FeeError::Overflow)
}

/// Minimum lovelace `output` must hold.
///
/// The output's coin is re-measured at the candidate amount until its
/// encoded length stops changing. The result is idempotent: feeding an
/// output that already holds the returned amount yields the same amount.
pub fn compute_min_ada_required(
    output: &TransactionOutput,
    coins_per_utxo_byte: u64,
) -> Result<u64, FeeError> {
    let mut coin_len = codec::coin_size(output.amount.coin);
    let without_coin = codec::output_size(output)? - coin_len;

    for _ in 0..MAX_MIN_ADA_ITERATIONS {
        let size = (without_coin + coin_len) as u64 + UTXO_ENTRY_OVERHEAD;
        let tentative = size
            .checked_mul(coins_per_utxo_byte)
            .ok_or(FeeError::Overflow)?;
        let tentative_len = codec::coin_size(tentative);
        if tentative_len == coin_len {
            return Ok(tentative);
        }
        coin_len = tentative_len;
    }
    Err(FeeError::MinAdaDidNotConverge(MAX_MIN_ADA_ITERATIONS))
}

/// Full fee breakdown for `tx` against `params`.
pub fn fee_breakdown(
    tx: &Transaction,
    resolved_reference_inputs: &[Utxo],
    params: &ProtocolParameters,
) -> Result<FeeBreakdown, FeeError> {
    let size = codec::transaction_size(tx)? as u64;
    let size_fee = linear_fee(size, params.min_fee_b, params.min_fee_a)?;

    let mut breakdown = FeeBreakdown {
        size,
        size_fee,
        ..FeeBreakdown::default()
    };

    if !tx.redeemers().is_empty() {
        breakdown.ex_units = total_ex_units(tx.redeemers())?;
        breakdown.execution_fee = execution_fee(&breakdown.ex_units, &params.execution_costs)?;
        breakdown.reference_script_bytes = reference_script_bytes(resolved_reference_inputs)?;
        breakdown.reference_script_fee = tiered_ref_script_fee(
            breakdown.reference_script_bytes,
            &params.ref_script_cost_per_byte,
        )?;
    }

    breakdown.total = [breakdown.execution_fee, breakdown.reference_script_fee]
        .iter()
        .try_fold(size_fee, |acc, x| acc.checked_add(*x))
        .ok_or(FeeError::Overflow)?;
    Ok(breakdown)
}

/// Minimum fee for `tx`: script fee plus size fee.
pub fn compute_transaction_fee(
    tx: &Transaction,
    resolved_reference_inputs: &[Utxo],
    params: &ProtocolParameters,
) -> Result<u64, FeeError> {
    let script_fee = compute_min_script_fee(
        tx,
        &params.execution_costs,
        resolved_reference_inputs,
        &params.ref_script_cost_per_byte,
    )?;
    let size_fee = min_fee_without_scripts(tx, params.min_fee_b, params.min_fee_a)?;
    let total = script_fee.checked_add(size_fee).ok_or(FeeError::Overflow)?;
    debug!(size_fee, script_fee, total, "computed transaction fee");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        Address, AssetName, Bytes, KeyHash, MultiAsset, PlutusData, PolicyId, RedeemerTag, Script,
        TransactionBody, TransactionId, TransactionInput, Value,
    };

    fn addr() -> Address {
        Address::enterprise(1, &KeyHash::new([1u8; 28]))
    }

    fn simple_tx() -> Transaction {
        let input = TransactionInput::new(TransactionId::new([2u8; 32]), 0);
        Transaction::new(TransactionBody::new(
            vec![input],
            vec![TransactionOutput::new(addr(), Value::from_coin(5_000_000))],
        ))
    }

    fn ref_utxo(script: Script) -> Utxo {
        Utxo::new(
            TransactionInput::new(TransactionId::new([3u8; 32]), 1),
            TransactionOutput::new(addr(), Value::from_coin(10_000_000)).with_script_ref(script),
        )
    }

    /// A Plutus script whose encoded size is exactly `encoded` bytes.
    fn plutus_script_of_encoded_size(encoded: usize) -> Script {
        let mut body = encoded;
        loop {
            let script = Script::PlutusV2(Bytes::new(vec![0u8; body]));
            let size = codec::script_size(&script).unwrap();
            if size == encoded {
                return script;
            }
            body -= size - encoded;
        }
    }

    #[test]
    fn linear_fee_matches_formula() {
        assert_eq!(linear_fee(200, 155_381, 44).unwrap(), 164_181);
        assert_eq!(linear_fee(0, 7, 1_000).unwrap(), 7);
    }

    #[test]
    fn linear_fee_overflow() {
        assert_eq!(linear_fee(u64::MAX, 1, 2), Err(FeeError::Overflow));
        assert_eq!(
            linear_fee(1, u64::MAX, 1).unwrap_err().kind(),
            ErrorKind::IntegerOverflow
        );
    }

    #[test]
    fn min_fee_tracks_encoded_size() {
        let tx = simple_tx();
        let size = codec::transaction_size(&tx).unwrap() as u64;
        assert_eq!(
            min_fee_without_scripts(&tx, 155_381, 44).unwrap(),
            155_381 + 44 * size
        );
    }

    #[test]
    fn no_redeemers_means_no_script_fee() {
        let tx = simple_tx();
        let params = ProtocolParameters::mainnet();
        let refs = vec![ref_utxo(plutus_script_of_encoded_size(1_000))];
        assert_eq!(
            compute_min_script_fee(
                &tx,
                &params.execution_costs,
                &refs,
                &params.ref_script_cost_per_byte
            )
            .unwrap(),
            0
        );
    }

    #[test]
    fn execution_fee_rounds_up() {
        let mut tx = simple_tx();
        tx.witness_set.redeemers.push(Redeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            data: PlutusData::unit(),
            ex_units: ExUnits::new(1_000_000, 500_000_000),
        });
        let params = ProtocolParameters::mainnet();
        // 1e6 * 577/1e4 = 57_700; 5e8 * 721/1e7 = 36_050
        let fee = compute_min_script_fee(
            &tx,
            &params.execution_costs,
            &[],
            &params.ref_script_cost_per_byte,
        )
        .unwrap();
        assert_eq!(fee, 93_750);

        tx.witness_set.redeemers[0].ex_units = ExUnits::new(1, 1);
        let fee = compute_min_script_fee(
            &tx,
            &params.execution_costs,
            &[],
            &params.ref_script_cost_per_byte,
        )
        .unwrap();
        assert_eq!(fee, 1);
    }

    #[test]
    fn execution_fee_uses_float_prices() {
        let mut tx = simple_tx();
        tx.witness_set.redeemers.push(Redeemer {
            tag: RedeemerTag::Spend,
            index: 0,
            data: PlutusData::unit(),
            ex_units: ExUnits::new(1, 53),
        });
        let prices = ExUnitPrices {
            memory_price: UnitInterval::new(7, 10).unwrap(),
            steps_price: UnitInterval::new(1, 10).unwrap(),
        };
        // 53 * 0.1 + 1 * 0.7 == 6.000000000000001 in f64; exact is 6.
        let fee = compute_min_script_fee(&tx, &prices, &[], &UnitInterval::integer(15)).unwrap();
        assert_eq!(fee, 7);
    }

    #[test]
    fn execution_fee_rejects_zero_denominator() {
        let mut tx = simple_tx();
        tx.witness_set.redeemers.push(Redeemer::placeholder(
            RedeemerTag::Spend,
            0,
            PlutusData::unit(),
        ));
        let prices = ExUnitPrices {
            memory_price: UnitInterval {
                numerator: 1,
                denominator: 0,
            },
            steps_price: UnitInterval::integer(1),
        };
        let err = compute_min_script_fee(&tx, &prices, &[], &UnitInterval::integer(15)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn total_ex_units_overflow() {
        let r = |mem| Redeemer {
            tag: RedeemerTag::Mint,
            index: 0,
            data: PlutusData::unit(),
            ex_units: ExUnits::new(mem, 0),
        };
        assert_eq!(
            total_ex_units(&[r(u64::MAX), r(1)]),
            Err(FeeError::Overflow)
        );
        assert_eq!(total_ex_units(&[]).unwrap(), ExUnits::default());
    }

    #[test]
    fn ref_script_fee_ignores_native_scripts() {
        let native = Script::Native(crate::ledger::NativeScript::InvalidBefore(10));
        let fee = compute_script_ref_fee(&[ref_utxo(native)], &UnitInterval::integer(15)).unwrap();
        assert_eq!(fee, 0);
        assert_eq!(
            compute_script_ref_fee(&[], &UnitInterval::integer(15)).unwrap(),
            0
        );
    }

    #[test]
    fn ref_script_fee_single_tier() {
        let script = plutus_script_of_encoded_size(1_000);
        let fee = compute_script_ref_fee(&[ref_utxo(script)], &UnitInterval::integer(15)).unwrap();
        assert_eq!(fee, 15_000);
    }

    #[test]
    fn ref_script_fee_escalates_across_tiers() {
        // 25_600 bytes at 15 plus 4_400 bytes at 18
        let script = plutus_script_of_encoded_size(30_000);
        let fee = compute_script_ref_fee(&[ref_utxo(script)], &UnitInterval::integer(15)).unwrap();
        assert_eq!(fee, 25_600 * 15 + 4_400 * 18);
    }

    #[test]
    fn ref_script_fee_rejects_zero_denominator() {
        let script = plutus_script_of_encoded_size(100);
        let bad = UnitInterval {
            numerator: 1,
            denominator: 0,
        };
        let err = compute_script_ref_fee(&[ref_utxo(script)], &bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn min_ada_for_plain_output() {
        let out = TransactionOutput::new(addr(), Value::from_coin(0));
        let min = compute_min_ada_required(&out, 4_310).unwrap();
        let resized = TransactionOutput::new(addr(), Value::from_coin(min));
        let size = codec::output_size(&resized).unwrap() as u64;
        assert_eq!(min, (size + UTXO_ENTRY_OVERHEAD) * 4_310);
    }

    #[test]
    fn min_ada_is_idempotent() {
        let mut assets = MultiAsset::new();
        assets
            .insert(
                PolicyId::new([4u8; 28]),
                AssetName::new(b"token".to_vec()).unwrap(),
                1,
            )
            .unwrap();
        let mut out = TransactionOutput::new(addr(), Value::new(1, assets));
        let first = compute_min_ada_required(&out, 4_310).unwrap();
        out.amount.coin = first;
        assert_eq!(compute_min_ada_required(&out, 4_310).unwrap(), first);
    }

    #[test]
    fn min_ada_grows_with_assets() {
        let plain = TransactionOutput::new(addr(), Value::from_coin(1_000_000));
        let mut assets = MultiAsset::new();
        assets
            .insert(PolicyId::new([5u8; 28]), AssetName::new(b"x".to_vec()).unwrap(), 3)
            .unwrap();
        let rich = TransactionOutput::new(addr(), Value::new(1_000_000, assets));
        assert!(
            compute_min_ada_required(&rich, 4_310).unwrap()
                > compute_min_ada_required(&plain, 4_310).unwrap()
        );
    }

    #[test]
    fn transaction_fee_combines_components() {
        let params = ProtocolParameters::mainnet();
        let mut tx = simple_tx();
        tx.witness_set.redeemers.push(Redeemer::placeholder(
            RedeemerTag::Spend,
            0,
            PlutusData::unit(),
        ));
        tx.witness_set.redeemers[0].ex_units = ExUnits::new(10_000, 10_000_000);
        let refs = vec![ref_utxo(plutus_script_of_encoded_size(500))];

        let total = compute_transaction_fee(&tx, &refs, &params).unwrap();
        let breakdown = fee_breakdown(&tx, &refs, &params).unwrap();
        assert_eq!(breakdown.total, total);
        assert_eq!(breakdown.reference_script_fee, 500 * 15);
        assert_eq!(
            total,
            breakdown.size_fee + breakdown.execution_fee + breakdown.reference_script_fee
        );
    }
}
