//! # Script Evaluation
//!
//! txforge never runs Plutus scripts itself. A [`TransactionEvaluator`]
//! hands the transaction, plus any UTXOs it spends or references that the
//! evaluator cannot look up on its own, to an external oracle (a node, a
//! local script VM, a simulation service) and gets back the execution
//! budget of every redeemer.
//!
//! The contract is strict: the evaluator returns exactly one redeemer per
//! placeholder already in the witness set, matched on `(tag, index)`. It
//! must not invent or drop redeemers. [`ensure_redeemers_match`] checks
//! this, and [`apply_evaluation`] refuses to touch the transaction unless
//! the check passes.
//!
//! Script failures reported by the oracle and failures to talk to the oracle
//! at all are different errors: the first means the transaction is wrong,
//! the second that the caller may retry.

pub mod oracle;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::codec::CodecError;
use crate::error::ErrorKind;
use crate::ledger::{ExUnits, Redeemer, RedeemerTag, Transaction, Utxo};

pub use oracle::{
    EvaluatedRedeemer, EvaluationRequest, EvaluationResponse, EvaluationTransport, OracleEvaluator,
    TransportError,
};

/// One script rejected by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFailure {
    pub tag: RedeemerTag,
    pub index: u32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("script evaluation failed for {} redeemer(s): {}", .failures.len(), describe(.failures))]
    ScriptFailure { failures: Vec<ScriptFailure> },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed evaluator response: {0}")]
    MalformedResponse(String),

    #[error("evaluated redeemers do not match placeholders: {0}")]
    RedeemerMismatch(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn describe(failures: &[ScriptFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{:?}#{}: {}", f.tag, f.index, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl EvaluationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ScriptFailure { .. } | Self::Transport(_) => ErrorKind::ExternalOracle,
            Self::MalformedResponse(_) => ErrorKind::Decoding,
            Self::RedeemerMismatch(_) => ErrorKind::InvalidArgument,
            Self::Codec(e) => e.kind(),
        }
    }

    /// True for failures where asking again might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Obtains concrete execution budgets for a transaction's redeemers.
pub trait TransactionEvaluator {
    fn evaluate(
        &mut self,
        tx: &Transaction,
        additional_utxos: &[Utxo],
    ) -> Result<Vec<Redeemer>, EvaluationError>;
}

impl<F> TransactionEvaluator for F
where
    F: FnMut(&Transaction, &[Utxo]) -> Result<Vec<Redeemer>, EvaluationError>,
{
    fn evaluate(
        &mut self,
        tx: &Transaction,
        additional_utxos: &[Utxo],
    ) -> Result<Vec<Redeemer>, EvaluationError> {
        self(tx, additional_utxos)
    }
}

/// Checks that `evaluated` pairs one-to-one with `placeholders` on
/// `(tag, index)`.
pub fn ensure_redeemers_match(
    placeholders: &[Redeemer],
    evaluated: &[Redeemer],
) -> Result<(), EvaluationError> {
    if placeholders.len() != evaluated.len() {
        return Err(EvaluationError::RedeemerMismatch(format!(
            "expected {} redeemers, got {}",
            placeholders.len(),
            evaluated.len()
        )));
    }

    let mut expected: BTreeMap<(RedeemerTag, u32), usize> = BTreeMap::new();
    for r in placeholders {
        *expected.entry(r.pointer()).or_default() += 1;
    }
    for r in evaluated {
        match expected.get_mut(&r.pointer()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                return Err(EvaluationError::RedeemerMismatch(format!(
                    "unexpected redeemer {:?}#{}",
                    r.tag, r.index
                )))
            }
        }
    }
    Ok(())
}

/// Copies evaluated budgets into the transaction's placeholders.
///
/// Validation happens first; on error `tx` is unchanged.
pub fn apply_evaluation(tx: &mut Transaction, evaluated: &[Redeemer]) -> Result<(), EvaluationError> {
    ensure_redeemers_match(&tx.witness_set.redeemers, evaluated)?;

    let budgets: BTreeMap<(RedeemerTag, u32), ExUnits> =
        evaluated.iter().map(|r| (r.pointer(), r.ex_units)).collect();
    for redeemer in &mut tx.witness_set.redeemers {
        if let Some(units) = budgets.get(&redeemer.pointer()) {
            redeemer.ex_units = *units;
        }
    }
    debug!(redeemers = evaluated.len(), "applied script evaluation");
    Ok(())
}

/// Evaluates `tx` and writes the budgets back into it.
pub fn evaluate_and_apply<E: TransactionEvaluator + ?Sized>(
    evaluator: &mut E,
    tx: &mut Transaction,
    additional_utxos: &[Utxo],
) -> Result<(), EvaluationError> {
    if tx.witness_set.redeemers.is_empty() {
        return Ok(());
    }
    let evaluated = evaluator.evaluate(tx, additional_utxos)?;
    apply_evaluation(tx, &evaluated)
}
