//! Protocol parameters.
//!
//! Parameters are read-only for the duration of an engine run. They are
//! usually loaded from a JSON file exported by a node or an indexer; the
//! [`ProtocolParameters::mainnet`] preset exists for tests and for offline
//! estimates.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("{field}: denominator must be non-zero")]
    ZeroDenominator { field: &'static str },

    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed protocol parameters: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read protocol parameters: {0}")]
    Io(#[from] std::io::Error),
}

impl ParamsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroDenominator { .. } | Self::InvalidField { .. } => ErrorKind::InvalidArgument,
            Self::Json(_) => ErrorKind::Decoding,
            Self::Io(_) => ErrorKind::ExternalOracle,
        }
    }
}

/// A non-negative rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInterval {
    pub numerator: u64,
    pub denominator: u64,
}

impl UnitInterval {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, ParamsError> {
        let interval = Self {
            numerator,
            denominator,
        };
        interval.check("unit_interval")?;
        Ok(interval)
    }

    /// Whole-number interval `n/1`.
    pub const fn integer(n: u64) -> Self {
        Self {
            numerator: n,
            denominator: 1,
        }
    }

    fn check(&self, field: &'static str) -> Result<(), ParamsError> {
        if self.denominator == 0 {
            return Err(ParamsError::ZeroDenominator { field });
        }
        Ok(())
    }

    /// Floating-point value; infinite when the denominator is zero.
    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl fmt::Display for UnitInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Lovelace price of one unit of script memory and one CPU step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnitPrices {
    pub memory_price: UnitInterval,
    pub steps_price: UnitInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    /// Lovelace per byte of transaction (the linear coefficient).
    pub min_fee_a: u64,
    /// Flat lovelace per transaction (the linear constant).
    pub min_fee_b: u64,
    pub execution_costs: ExUnitPrices,
    pub coins_per_utxo_byte: u64,
    pub ref_script_cost_per_byte: UnitInterval,
    /// Upper bound on the signed size of a balanced transaction.
    pub max_tx_size: u32,
    /// Upper bound on the encoded size of a balancer-built change value.
    pub max_value_size: u32,
    /// Deposit taken by stake registration and refunded on deregistration.
    pub key_deposit: u64,
    // Carried for callers; pool certificates and collateral selection are
    // not built here.
    pub pool_deposit: u64,
    pub collateral_percentage: u32,
    pub max_collateral_inputs: u32,
}

impl ProtocolParameters {
    /// Mainnet values as of the Conway era.
    pub fn mainnet() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            execution_costs: ExUnitPrices {
                memory_price: UnitInterval {
                    numerator: 577,
                    denominator: 10_000,
                },
                steps_price: UnitInterval {
                    numerator: 721,
                    denominator: 10_000_000,
                },
            },
            coins_per_utxo_byte: 4_310,
            ref_script_cost_per_byte: UnitInterval::integer(15),
            max_tx_size: 16_384,
            max_value_size: 5_000,
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            collateral_percentage: 150,
            max_collateral_inputs: 3,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let params = Self::from_json_str(&json)?;
        debug!(path = %path.display(), "loaded protocol parameters");
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String, ParamsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects parameter sets no ledger would accept.
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.execution_costs
            .memory_price
            .check("execution_costs.memory_price")?;
        self.execution_costs
            .steps_price
            .check("execution_costs.steps_price")?;
        self.ref_script_cost_per_byte
            .check("ref_script_cost_per_byte")?;

        if self.max_tx_size == 0 {
            return Err(ParamsError::InvalidField {
                field: "max_tx_size",
                reason: "must be non-zero".into(),
            });
        }
        if self.max_value_size == 0 {
            return Err(ParamsError::InvalidField {
                field: "max_value_size",
                reason: "must be non-zero".into(),
            });
        }
        if self.coins_per_utxo_byte == 0 {
            return Err(ParamsError::InvalidField {
                field: "coins_per_utxo_byte",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }
}
