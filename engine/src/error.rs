//! # Error Surface
//!
//! Every module in txforge owns a `thiserror` enum describing what can go
//! wrong inside it. Callers that do not care which stage failed can funnel
//! everything into [`EngineError`], and callers that need to branch on the
//! *category* of failure use [`ErrorKind`] through `kind()`.
//!
//! Error identity is always checked via `kind()`. The `Display` text is for
//! humans and log files; it may change between releases without notice.

use std::fmt;

use thiserror::Error;

use crate::balancing::BalanceError;
use crate::codec::CodecError;
use crate::evaluation::EvaluationError;
use crate::fee::FeeError;
use crate::keys::KeyHandlerError;
use crate::ledger::{AddressError, ParamsError, ValueError};
use crate::selection::SelectionError;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required input was missing, malformed at the API level, or out of
    /// range.
    InvalidArgument,
    /// Coin selection could not cover the requested target.
    InsufficientFunds,
    /// A caller-provided output buffer is too small for the result.
    InsufficientBuffer,
    /// Serialized input could not be decoded.
    Decoding,
    /// The script evaluator, a transport, or a signing device failed.
    ExternalOracle,
    /// The operation is not supported by the key handler's mode.
    WrongCapability,
    /// Memory for an output could not be reserved.
    AllocationFailure,
    /// A checked 64-bit accumulation overflowed.
    IntegerOverflow,
}

impl ErrorKind {
    /// Stable snake_case name for logs and machine-readable reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InsufficientBuffer => "insufficient_buffer",
            Self::Decoding => "decoding",
            Self::ExternalOracle => "external_oracle",
            Self::WrongCapability => "wrong_capability",
            Self::AllocationFailure => "allocation_failure",
            Self::IntegerOverflow => "integer_overflow",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of every module error.
///
/// Conversions are transparent: the message of the wrapped error is the
/// message of the `EngineError`, and `kind()` forwards to the inner error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    KeyHandler(#[from] KeyHandlerError),

    #[error(transparent)]
    Balance(#[from] BalanceError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Value(e) => e.kind(),
            Self::Address(e) => e.kind(),
            Self::Params(e) => e.kind(),
            Self::Codec(e) => e.kind(),
            Self::Fee(e) => e.kind(),
            Self::Selection(e) => e.kind(),
            Self::Evaluation(e) => e.kind(),
            Self::KeyHandler(e) => e.kind(),
            Self::Balance(e) => e.kind(),
        }
    }
}

/// Convenience alias for engine-wide results.
pub type EngineResult<T> = Result<T, EngineError>;
