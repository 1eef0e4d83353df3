//! # Canonical Encoding & Size Oracle
//!
//! Every fee in txforge is a function of how many bytes something occupies
//! on the wire, so this module is the single authority on encoded length.
//! The wire format is CBOR produced by `ciborium` over the serde model in
//! [`crate::ledger`]. Two properties make it canonical:
//!
//! - every map in the model is a `BTreeMap`, so key order is fixed;
//! - optional fields are omitted when absent rather than encoded as null.
//!
//! Integers are always written in their shortest form, which is what makes
//! the min-ADA computation in [`crate::fee`] a fixed-point problem.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::ledger::{Script, Transaction, TransactionOutput};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("could not reserve {requested} bytes")]
    AllocationFailure { requested: usize },
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encode(_) => ErrorKind::InvalidArgument,
            Self::Decode(_) => ErrorKind::Decoding,
            Self::BufferTooSmall { .. } => ErrorKind::InsufficientBuffer,
            Self::AllocationFailure { .. } => ErrorKind::AllocationFailure,
        }
    }
}

/// `io::Write` sink that only counts bytes.
#[derive(Default)]
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Exact length of the canonical encoding of `value`, without allocating
/// the encoding itself.
pub fn encoded_size<T: Serialize + ?Sized>(value: &T) -> Result<usize, CodecError> {
    let mut counter = ByteCounter::default();
    ciborium::into_writer(value, &mut counter).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(counter.0)
}

/// Encoded length of an unsigned integer: 1, 2, 3, 5 or 9 bytes.
pub fn coin_size(coin: u64) -> usize {
    match coin {
        0..=23 => 1,
        24..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn output_size(output: &TransactionOutput) -> Result<usize, CodecError> {
    encoded_size(output)
}

pub fn script_size(script: &Script) -> Result<usize, CodecError> {
    encoded_size(script)
}

pub fn transaction_size(tx: &Transaction) -> Result<usize, CodecError> {
    encoded_size(tx)
}

/// Canonical encoding of `value` in a freshly reserved buffer.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let size = encoded_size(value)?;
    let mut out = Vec::new();
    out.try_reserve_exact(size)
        .map_err(|_| CodecError::AllocationFailure { requested: size })?;
    ciborium::into_writer(value, &mut out).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Writes the canonical encoding of `value` into the front of `buf` and
/// returns the number of bytes written. On error `buf` is left untouched.
pub fn encode_into<T: Serialize + ?Sized>(value: &T, buf: &mut [u8]) -> Result<usize, CodecError> {
    let needed = encoded_size(value)?;
    if needed > buf.len() {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }
    let bytes = to_canonical_bytes(value)?;
    buf[..needed].copy_from_slice(&bytes);
    Ok(needed)
}
