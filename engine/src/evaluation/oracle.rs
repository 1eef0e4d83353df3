//! JSON request/response evaluator over a pluggable transport.
//!
//! The request carries the transaction as hex-encoded canonical CBOR plus
//! the extra UTXOs the oracle needs, deduplicated by input. The response
//! is either `{"result": [...]}` with one budget per redeemer, or
//! `{"failure": [...]}` listing the scripts that rejected the transaction.
//!
//! How the JSON travels (HTTP, a socket, a child process) is the
//! transport's business, including timeouts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{ensure_redeemers_match, EvaluationError, ScriptFailure, TransactionEvaluator};
use crate::codec;
use crate::ledger::{ExUnits, Redeemer, RedeemerTag, Transaction, TransactionInput, Utxo};

/// The oracle could not be reached or did not answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("evaluator transport failed: {0}")]
pub struct TransportError(pub String);

/// Moves one JSON request to the oracle and its JSON reply back.
pub trait EvaluationTransport {
    fn round_trip(&mut self, request: &str) -> Result<String, TransportError>;
}

impl<F> EvaluationTransport for F
where
    F: FnMut(&str) -> Result<String, TransportError>,
{
    fn round_trip(&mut self, request: &str) -> Result<String, TransportError> {
        self(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Hex-encoded canonical CBOR of the whole transaction.
    pub transaction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_utxos: Vec<Utxo>,
}

impl EvaluationRequest {
    pub fn new(tx: &Transaction, additional_utxos: &[Utxo]) -> Result<Self, EvaluationError> {
        let transaction = hex::encode(codec::to_canonical_bytes(tx)?);
        let unique: BTreeMap<&TransactionInput, &Utxo> =
            additional_utxos.iter().map(|u| (&u.input, u)).collect();
        Ok(Self {
            transaction,
            additional_utxos: unique.into_values().cloned().collect(),
        })
    }
}

/// Budget the oracle computed for one redeemer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatedRedeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub ex_units: ExUnits,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<EvaluatedRedeemer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Vec<ScriptFailure>>,
}

/// [`TransactionEvaluator`] speaking JSON to an external oracle.
#[derive(Debug)]
pub struct OracleEvaluator<T> {
    transport: T,
}

impl<T: EvaluationTransport> OracleEvaluator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn interpret(
        tx: &Transaction,
        response: EvaluationResponse,
    ) -> Result<Vec<Redeemer>, EvaluationError> {
        match (response.result, response.failure) {
            (_, Some(failures)) if !failures.is_empty() => {
                warn!(failures = failures.len(), "script evaluation rejected transaction");
                Err(EvaluationError::ScriptFailure { failures })
            }
            (Some(result), _) => {
                let placeholders = tx.redeemers();
                let mut redeemers = Vec::with_capacity(result.len());
                for evaluated in result {
                    let placeholder = placeholders
                        .iter()
                        .find(|p| p.pointer() == (evaluated.tag, evaluated.index))
                        .ok_or_else(|| {
                            EvaluationError::RedeemerMismatch(format!(
                                "oracle returned unknown redeemer {:?}#{}",
                                evaluated.tag, evaluated.index
                            ))
                        })?;
                    redeemers.push(Redeemer {
                        ex_units: evaluated.ex_units,
                        ..placeholder.clone()
                    });
                }
                ensure_redeemers_match(placeholders, &redeemers)?;
                Ok(redeemers)
            }
            _ => Err(EvaluationError::MalformedResponse(
                "response has neither result nor failure".into(),
            )),
        }
    }
}

impl<T: EvaluationTransport> TransactionEvaluator for OracleEvaluator<T> {
    fn evaluate(
        &mut self,
        tx: &Transaction,
        additional_utxos: &[Utxo],
    ) -> Result<Vec<Redeemer>, EvaluationError> {
        let request = EvaluationRequest::new(tx, additional_utxos)?;
        debug!(
            redeemers = tx.redeemers().len(),
            additional_utxos = request.additional_utxos.len(),
            "requesting script evaluation"
        );
        let body = serde_json::to_string(&request)
            .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))?;

        let reply = self.transport.round_trip(&body)?;
        let response: EvaluationResponse = serde_json::from_str(&reply)
            .map_err(|e| EvaluationError::MalformedResponse(e.to_string()))?;
        Self::interpret(tx, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ledger::{
        Address, KeyHash, PlutusData, TransactionBody, TransactionId, TransactionOutput, Value,
    };

    fn script_tx() -> Transaction {
        let mut tx = Transaction::new(TransactionBody::new(
            vec![TransactionInput::new(TransactionId::new([1u8; 32]), 0)],
            vec![],
        ));
        tx.witness_set.redeemers = vec![
            Redeemer::placeholder(RedeemerTag::Spend, 0, PlutusData::Integer(42)),
            Redeemer::placeholder(RedeemerTag::Mint, 0, PlutusData::unit()),
        ];
        tx
    }

    fn utxo(id: u8) -> Utxo {
        Utxo::new(
            TransactionInput::new(TransactionId::new([id; 32]), 0),
            TransactionOutput::new(
                Address::enterprise(0, &KeyHash::new([0u8; 28])),
                Value::from_coin(1),
            ),
        )
    }

    #[test]
    fn request_deduplicates_utxos() {
        let req = EvaluationRequest::new(&script_tx(), &[utxo(1), utxo(2), utxo(1)]).unwrap();
        assert_eq!(req.additional_utxos.len(), 2);
        let bytes = hex::decode(&req.transaction).unwrap();
        let back: Transaction = codec::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(back, script_tx());
    }

    #[test]
    fn result_is_merged_into_placeholders() {
        let transport = |_: &str| -> Result<String, TransportError> {
            Ok(r#"{"result":[
                {"tag":"mint","index":0,"ex_units":{"memory":5,"steps":6}},
                {"tag":"spend","index":0,"ex_units":{"memory":1,"steps":2}}
            ]}"#
            .to_string())
        };
        let mut evaluator = OracleEvaluator::new(transport);
        let redeemers = evaluator.evaluate(&script_tx(), &[]).unwrap();
        assert_eq!(redeemers.len(), 2);
        let spend = redeemers.iter().find(|r| r.tag == RedeemerTag::Spend).unwrap();
        assert_eq!(spend.ex_units, ExUnits::new(1, 2));
        assert_eq!(spend.data, PlutusData::Integer(42));
    }

    #[test]
    fn failure_is_a_script_failure() {
        let transport = |_: &str| -> Result<String, TransportError> {
            Ok(r#"{"failure":[{"tag":"spend","index":0,"message":"budget exceeded"}]}"#.to_string())
        };
        let err = OracleEvaluator::new(transport)
            .evaluate(&script_tx(), &[])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::ScriptFailure { .. }));
    }

    #[test]
    fn transport_error_is_distinct() {
        let transport =
            |_: &str| -> Result<String, TransportError> { Err(TransportError("connection refused".into())) };
        let err = OracleEvaluator::new(transport)
            .evaluate(&script_tx(), &[])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Transport(_)));
        assert!(err.is_transient());
        assert_eq!(err.kind(), ErrorKind::ExternalOracle);
    }

    #[test]
    fn garbage_response_is_malformed() {
        let transport = |_: &str| -> Result<String, TransportError> { Ok("<html>".into()) };
        let err = OracleEvaluator::new(transport)
            .evaluate(&script_tx(), &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);

        let empty = |_: &str| -> Result<String, TransportError> { Ok("{}".into()) };
        let err = OracleEvaluator::new(empty)
            .evaluate(&script_tx(), &[])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MalformedResponse(_)));
    }

    #[test]
    fn dropped_redeemer_is_a_mismatch() {
        let transport = |_: &str| -> Result<String, TransportError> {
            Ok(r#"{"result":[{"tag":"spend","index":0,"ex_units":{"memory":1,"steps":2}}]}"#.into())
        };
        let err = OracleEvaluator::new(transport)
            .evaluate(&script_tx(), &[])
            .unwrap_err();
        assert!(matches!(err, EvaluationError::RedeemerMismatch(_)));
    }

    #[test]
    fn request_json_shape() {
        let mut seen = String::new();
        let transport = |req: &str| -> Result<String, TransportError> {
            seen = req.to_string();
            Ok(r#"{"result":[
                {"tag":"spend","index":0,"ex_units":{"memory":0,"steps":0}},
                {"tag":"mint","index":0,"ex_units":{"memory":0,"steps":0}}
            ]}"#
            .into())
        };
        OracleEvaluator::new(transport)
            .evaluate(&script_tx(), &[utxo(3)])
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&seen).unwrap();
        assert!(json["transaction"].is_string());
        assert_eq!(json["additional_utxos"].as_array().unwrap().len(), 1);
    }
}
