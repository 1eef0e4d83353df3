//! # Transaction Balancing
//!
//! Turns a draft (payment outputs, certificates, mint, withdrawals) into a
//! balanced transaction by running the three stages explicitly:
//!
//! 1. **select** inputs covering the outputs, deposits, burns and the
//!    current fee, net of implicit coin (withdrawals, deposit refunds, mint);
//! 2. **evaluate** redeemer budgets, when the draft has scripts and an
//!    evaluator is supplied;
//! 3. **fee**: measure the transaction with placeholder vkey witnesses for
//!    the expected signers and compare with the fee it pays.
//!
//! The loop ends when the paid fee covers the measured fee. Leftover value
//! goes to a change output at the caller's address. Change without tokens
//! that is below the minimum-ADA requirement is folded into the fee; change
//! carrying tokens instead raises the coin target until it can stand on its
//! own.
//!
//! A result whose signed size exceeds `max_tx_size`, or whose change value
//! exceeds `max_value_size`, is rejected.
//!
//! The balancer never signs and never returns the placeholder witnesses.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::codec;
use crate::config::MAX_BALANCE_ATTEMPTS;
use crate::error::ErrorKind;
use crate::evaluation::{self, EvaluationError, TransactionEvaluator};
use crate::fee::{self, FeeError};
use crate::ledger::{
    Address, Certificate, KeyHash, ProtocolParameters, SignatureBytes, Transaction,
    TransactionInput, TransactionOutput, Utxo, Value, ValueError, Vkey, VkeyWitness,
};
use crate::selection::{CoinSelector, SelectionError};

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("invalid draft transaction: {0}")]
    InvalidDraft(String),

    #[error("fee did not converge after {attempts} attempts")]
    FeeDidNotConverge { attempts: usize },

    #[error("signed transaction would be {size} bytes, limit is {max}")]
    TransactionTooLarge { size: u64, max: u64 },

    #[error("change value would be {size} bytes, limit is {max}")]
    ChangeValueTooLarge { size: u64, max: u64 },
}

impl BalanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Selection(e) => e.kind(),
            Self::Evaluation(e) => e.kind(),
            Self::Fee(e) => e.kind(),
            Self::Value(e) => e.kind(),
            Self::InvalidDraft(_)
            | Self::FeeDidNotConverge { .. }
            | Self::TransactionTooLarge { .. }
            | Self::ChangeValueTooLarge { .. } => ErrorKind::InvalidArgument,
        }
    }
}

/// Everything the balancer needs besides the draft.
pub struct BalanceContext<'a> {
    pub params: &'a ProtocolParameters,
    /// Wallet UTXOs the selector may draw from.
    pub available: &'a [Utxo],
    /// Resolved UTXOs for the draft's own inputs. Always spent.
    pub pre_selected: &'a [Utxo],
    /// Resolved reference inputs, for reference-script fees and evaluation.
    pub reference_utxos: &'a [Utxo],
    pub change_address: &'a Address,
    /// Number of vkey witnesses the signed transaction will carry. When
    /// unset it is estimated from input addresses, required signers and
    /// certificates.
    pub expected_signers: Option<usize>,
    pub selector: &'a mut dyn CoinSelector,
    pub evaluator: Option<&'a mut dyn TransactionEvaluator>,
}

impl<'a> BalanceContext<'a> {
    pub fn new(
        params: &'a ProtocolParameters,
        available: &'a [Utxo],
        change_address: &'a Address,
        selector: &'a mut dyn CoinSelector,
    ) -> Self {
        Self {
            params,
            available,
            pre_selected: &[],
            reference_utxos: &[],
            change_address,
            expected_signers: None,
            selector,
            evaluator: None,
        }
    }

    pub fn with_pre_selected(mut self, utxos: &'a [Utxo]) -> Self {
        self.pre_selected = utxos;
        self
    }

    pub fn with_reference_utxos(mut self, utxos: &'a [Utxo]) -> Self {
        self.reference_utxos = utxos;
        self
    }

    pub fn with_expected_signers(mut self, signers: usize) -> Self {
        self.expected_signers = Some(signers);
        self
    }

    pub fn with_evaluator(mut self, evaluator: &'a mut dyn TransactionEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedTransaction {
    /// Balanced, unsigned transaction.
    pub transaction: Transaction,
    /// Resolved inputs, in the transaction's input order.
    pub inputs: Vec<Utxo>,
    pub change: Option<TransactionOutput>,
    pub fee: u64,
    pub attempts: usize,
}

/// Value entering and leaving the transaction outside of inputs and outputs.
#[derive(Debug, Default)]
struct ImplicitFlows {
    /// Withdrawals and deposit refunds (coin), minted tokens.
    consumed: Value,
    /// Deposits (coin), burned tokens.
    produced: Value,
}

fn implicit_flows(tx: &Transaction, params: &ProtocolParameters) -> Result<ImplicitFlows, ValueError> {
    let body = &tx.body;
    let withdrawals = body
        .withdrawals
        .values()
        .try_fold(0u64, |acc, c| acc.checked_add(*c))
        .ok_or(ValueError::Overflow)?;

    let mut refunds = 0u64;
    let mut deposits = 0u64;
    for cert in &body.certificates {
        match cert {
            Certificate::StakeRegistration(_) => {
                deposits = deposits
                    .checked_add(params.key_deposit)
                    .ok_or(ValueError::Overflow)?;
            }
            Certificate::StakeDeregistration(_) => {
                refunds = refunds
                    .checked_add(params.key_deposit)
                    .ok_or(ValueError::Overflow)?;
            }
            Certificate::StakeDelegation { .. } => {}
        }
    }

    let (minted, burned) = body.mint.split_signs();
    let refund_coin = withdrawals.checked_add(refunds).ok_or(ValueError::Overflow)?;
    Ok(ImplicitFlows {
        consumed: Value::new(refund_coin, minted),
        produced: Value::new(deposits, burned),
    })
}

/// Distinct key hashes expected to witness `tx` spending `inputs`.
pub fn estimate_signers(tx: &Transaction, inputs: &[Utxo]) -> usize {
    let mut signers: BTreeSet<KeyHash> = inputs
        .iter()
        .filter_map(|u| u.output.address.payment_key_hash())
        .collect();
    signers.extend(tx.body.required_signers.iter().copied());
    signers.extend(tx.body.certificates.iter().filter_map(Certificate::required_signer));
    signers.len()
}

/// Dummy witnesses with distinct keys, sized like real ones.
fn placeholder_witnesses(count: usize) -> Vec<VkeyWitness> {
    (0..count)
        .map(|i| {
            let mut vkey = [0u8; 32];
            vkey[..8].copy_from_slice(&(i as u64).to_le_bytes());
            VkeyWitness::new(Vkey::new(vkey), SignatureBytes::new([0u8; 64]))
        })
        .collect()
}

/// Balances `draft`. See the module documentation for the procedure.
///
/// On error nothing is returned; the draft itself is never modified.
pub fn balance_transaction(
    draft: &Transaction,
    ctx: &mut BalanceContext<'_>,
) -> Result<BalancedTransaction, BalanceError> {
    for input in &draft.body.inputs {
        if !ctx.pre_selected.iter().any(|u| u.input == *input) {
            return Err(BalanceError::InvalidDraft(format!(
                "input {input} has no resolved UTXO"
            )));
        }
    }

    let implicit = implicit_flows(draft, ctx.params)?;
    let outputs_total = Value::sum(draft.body.outputs.iter().map(|o| &o.amount))?;
    let base_produced = outputs_total.checked_add(&implicit.produced)?;

    let mut estimate = 0u64;
    let mut reserve = 0u64;

    for attempt in 1..=MAX_BALANCE_ATTEMPTS {
        let produced = base_produced.checked_add(&Value::from_coin(estimate))?;
        let target = produced
            .checked_add(&Value::from_coin(reserve))?
            .saturating_sub(&implicit.consumed);

        let selection = ctx
            .selector
            .select(Some(ctx.pre_selected), ctx.available, &target)?;

        let mut seen: BTreeSet<TransactionInput> = BTreeSet::new();
        let mut inputs: Vec<Utxo> = ctx
            .pre_selected
            .iter()
            .chain(&selection.selected)
            .filter(|u| seen.insert(u.input))
            .cloned()
            .collect();
        inputs.sort_by(|a, b| a.input.cmp(&b.input));

        let consumed = Value::sum(inputs.iter().map(Utxo::amount))?.checked_add(&implicit.consumed)?;
        let leftover = consumed.checked_sub(&produced)?;
        if let Some((policy, name, q)) = leftover.assets.iter().find(|(_, _, q)| *q < 0) {
            return Err(BalanceError::InvalidDraft(format!(
                "outputs need {} more of {policy}.{name} than inputs and mint provide",
                -(q as i128)
            )));
        }

        let mut tx = draft.clone();
        tx.body.inputs = inputs.iter().map(|u| u.input).collect();

        let mut paid = estimate;
        let mut change = None;
        if !leftover.is_zero() {
            let candidate = TransactionOutput::new(ctx.change_address.clone(), leftover);
            let min_ada = fee::compute_min_ada_required(&candidate, ctx.params.coins_per_utxo_byte)?;
            if candidate.amount.coin >= min_ada {
                let size = codec::encoded_size(&candidate.amount).map_err(FeeError::from)? as u64;
                let max = u64::from(ctx.params.max_value_size);
                if size > max {
                    return Err(BalanceError::ChangeValueTooLarge { size, max });
                }
                tx.body.outputs.push(candidate.clone());
                change = Some(candidate);
            } else if candidate.amount.has_assets() {
                let deficit = min_ada - candidate.amount.coin;
                reserve = reserve.checked_add(deficit).ok_or(FeeError::Overflow)?;
                debug!(attempt, deficit, "change below minimum ada, widening selection");
                continue;
            } else {
                paid = paid
                    .checked_add(candidate.amount.coin)
                    .ok_or(FeeError::Overflow)?;
            }
        }
        tx.body.fee = paid;

        if let Some(evaluator) = ctx.evaluator.as_deref_mut() {
            let additional: Vec<Utxo> = inputs
                .iter()
                .chain(ctx.reference_utxos)
                .cloned()
                .collect();
            evaluation::evaluate_and_apply(evaluator, &mut tx, &additional)?;
        }

        let signers = ctx
            .expected_signers
            .unwrap_or_else(|| estimate_signers(&tx, &inputs));
        let mut sized = tx.clone();
        sized
            .witness_set
            .vkey_witnesses
            .extend(placeholder_witnesses(signers));
        let required = fee::compute_transaction_fee(&sized, ctx.reference_utxos, ctx.params)?;

        debug!(attempt, paid, required, inputs = inputs.len(), signers, "balancing attempt");
        if required <= paid {
            let size = codec::transaction_size(&sized).map_err(FeeError::from)? as u64;
            let max = u64::from(ctx.params.max_tx_size);
            if size > max {
                return Err(BalanceError::TransactionTooLarge { size, max });
            }
            return Ok(BalancedTransaction {
                transaction: tx,
                inputs,
                change,
                fee: paid,
                attempts: attempt,
            });
        }
        estimate = required;
    }

    Err(BalanceError::FeeDidNotConverge {
        attempts: MAX_BALANCE_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        AssetName, Credential, ExUnits, MultiAsset, PlutusData, PolicyId, Redeemer, RedeemerTag,
        TransactionBody, TransactionId,
    };
    use crate::selection::LargestFirst;

    fn key(b: u8) -> KeyHash {
        KeyHash::new([b; 28])
    }

    fn addr(b: u8) -> Address {
        Address::enterprise(1, &key(b))
    }

    fn utxo(id: u8, coin: u64, tokens: i64) -> Utxo {
        let mut assets = MultiAsset::new();
        if tokens > 0 {
            assets
                .insert(PolicyId::new([9; 28]), AssetName::new(b"TOK".to_vec()).unwrap(), tokens)
                .unwrap();
        }
        Utxo::new(
            TransactionInput::new(TransactionId::new([id; 32]), 0),
            TransactionOutput::new(addr(1), Value::new(coin, assets)),
        )
    }

    fn payment(coin: u64) -> Transaction {
        Transaction::new(TransactionBody::new(
            vec![],
            vec![TransactionOutput::new(addr(2), Value::from_coin(coin))],
        ))
    }

    /// inputs + implicit consumed == outputs + fee + implicit produced
    fn assert_balanced(result: &BalancedTransaction, params: &ProtocolParameters) {
        let tx = &result.transaction;
        let implicit = implicit_flows(tx, params).unwrap();
        let consumed = Value::sum(result.inputs.iter().map(Utxo::amount))
            .unwrap()
            .checked_add(&implicit.consumed)
            .unwrap();
        let produced = Value::sum(tx.body.outputs.iter().map(|o| &o.amount))
            .unwrap()
            .checked_add(&implicit.produced)
            .unwrap()
            .checked_add(&Value::from_coin(tx.body.fee))
            .unwrap();
        assert_eq!(consumed, produced);
    }

    #[test]
    fn simple_payment_gets_change() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 3_000_000, 0), utxo(2, 10_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let result = balance_transaction(&payment(2_000_000), &mut ctx).unwrap();
        assert_balanced(&result, &params);
        assert_eq!(result.inputs, vec![pool[1].clone()]);

        let change = result.change.clone().unwrap();
        assert_eq!(change.address, change_addr);
        assert_eq!(result.transaction.body.outputs.len(), 2);

        // The paid fee covers the fee of the transaction with one witness.
        let mut signed_size = result.transaction.clone();
        signed_size.witness_set.vkey_witnesses = placeholder_witnesses(1);
        let required = fee::compute_transaction_fee(&signed_size, &[], &params).unwrap();
        assert!(result.fee >= required);
        assert!(result.transaction.witness_set.vkey_witnesses.is_empty());
    }

    #[test]
    fn dust_change_is_folded_into_fee() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 2_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let result = balance_transaction(&payment(1_800_000), &mut ctx).unwrap();
        assert!(result.change.is_none());
        assert_eq!(result.fee, 200_000);
        assert_eq!(result.transaction.body.outputs.len(), 1);
        assert_balanced(&result, &params);
    }

    #[test]
    fn token_change_pulls_more_coin() {
        let params = ProtocolParameters::mainnet();
        let tokens = utxo(1, 1_300_000, 50);
        let pool = vec![tokens.clone(), utxo(2, 5_000_000, 0)];
        let pre = vec![tokens.clone()];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx =
            BalanceContext::new(&params, &pool, &change_addr, &mut selector).with_pre_selected(&pre);

        let mut draft = payment(1_000_000);
        draft.body.inputs = vec![tokens.input];
        let result = balance_transaction(&draft, &mut ctx).unwrap();

        assert_eq!(result.inputs.len(), 2);
        let change = result.change.clone().unwrap();
        assert!(change.amount.has_assets());
        let min = fee::compute_min_ada_required(&change, params.coins_per_utxo_byte).unwrap();
        assert!(change.amount.coin >= min);
        assert!(result.attempts >= 2);
        assert_balanced(&result, &params);
    }

    #[test]
    fn oversized_change_value_is_rejected() {
        let mut params = ProtocolParameters::mainnet();
        params.max_value_size = 8;
        let tokens = utxo(1, 5_000_000, 50);
        let pool = vec![tokens.clone()];
        let pre = vec![tokens.clone()];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx =
            BalanceContext::new(&params, &pool, &change_addr, &mut selector).with_pre_selected(&pre);

        let mut draft = payment(1_000_000);
        draft.body.inputs = vec![tokens.input];
        let err = balance_transaction(&draft, &mut ctx).unwrap_err();
        assert!(matches!(err, BalanceError::ChangeValueTooLarge { max: 8, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn registration_deposit_and_withdrawal_are_counted() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 4_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let mut draft = payment(3_000_000);
        draft
            .body
            .certificates
            .push(Certificate::StakeRegistration(Credential::Key(key(7))));
        draft
            .body
            .withdrawals
            .insert(Address::reward(1, &key(7)), 2_500_000);

        let result = balance_transaction(&draft, &mut ctx).unwrap();
        assert_balanced(&result, &params);
    }

    #[test]
    fn unresolved_draft_input_is_rejected() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 4_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let mut draft = payment(1_000_000);
        draft.body.inputs = vec![TransactionInput::new(TransactionId::new([8; 32]), 1)];
        let err = balance_transaction(&draft, &mut ctx).unwrap_err();
        assert!(matches!(err, BalanceError::InvalidDraft(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn oversized_result_is_rejected() {
        let mut params = ProtocolParameters::mainnet();
        params.max_tx_size = 150;
        let pool = vec![utxo(1, 10_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let err = balance_transaction(&payment(2_000_000), &mut ctx).unwrap_err();
        match err {
            BalanceError::TransactionTooLarge { size, max } => {
                assert_eq!(max, 150);
                assert!(size > 150);
            }
            other => panic!("unexpected error {other:?}"),
        }

        params.max_tx_size = 16_384;
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);
        assert!(balance_transaction(&payment(2_000_000), &mut ctx).is_ok());
    }

    #[test]
    fn insufficient_pool_is_insufficient_funds() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 1_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector);

        let err = balance_transaction(&payment(5_000_000), &mut ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn evaluator_budgets_are_paid_for() {
        let params = ProtocolParameters::mainnet();
        let pool = vec![utxo(1, 20_000_000, 0)];
        let change_addr = addr(3);
        let mut selector = LargestFirst::new();
        let mut calls = 0;
        let mut evaluator = |tx: &Transaction, _: &[Utxo]| -> Result<Vec<Redeemer>, EvaluationError> {
            calls += 1;
            Ok(tx
                .redeemers()
                .iter()
                .map(|r| Redeemer {
                    ex_units: ExUnits::new(1_000_000, 500_000_000),
                    ..r.clone()
                })
                .collect())
        };
        let mut draft = payment(2_000_000);
        draft.witness_set.redeemers = vec![Redeemer::placeholder(
            RedeemerTag::Spend,
            0,
            PlutusData::unit(),
        )];

        let result = {
            let mut ctx = BalanceContext::new(&params, &pool, &change_addr, &mut selector)
                .with_evaluator(&mut evaluator)
                .with_expected_signers(1);
            balance_transaction(&draft, &mut ctx).unwrap()
        };

        assert!(calls >= 1);
        let redeemer = &result.transaction.redeemers()[0];
        assert_eq!(redeemer.ex_units, ExUnits::new(1_000_000, 500_000_000));
        let size_only = fee::min_fee_without_scripts(
            &result.transaction,
            params.min_fee_b,
            params.min_fee_a,
        )
        .unwrap();
        assert!(result.fee > size_only);
        assert_balanced(&result, &params);
    }

    #[test]
    fn signer_estimate_counts_distinct_keys() {
        let inputs = vec![utxo(1, 1, 0), utxo(2, 1, 0)];
        let mut tx = payment(1);
        tx.body.required_signers.push(key(5));
        tx.body
            .certificates
            .push(Certificate::StakeDeregistration(Credential::Key(key(6))));
        // Both inputs share key 1.
        assert_eq!(estimate_signers(&tx, &inputs), 3);
    }

    #[test]
    fn placeholders_have_distinct_keys() {
        let w = placeholder_witnesses(300);
        let keys: BTreeSet<_> = w.iter().map(|w| w.vkey).collect();
        assert_eq!(keys.len(), 300);
    }
}
