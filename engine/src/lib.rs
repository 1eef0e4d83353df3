// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # txforge: Transaction Construction Engine
//!
//! txforge builds UTxO ledger transactions: it measures them, prices them,
//! picks the inputs that pay for them, gets their scripts budgeted, and
//! signs them. Nothing here talks to a node. The outside world comes in
//! through three traits: a [`CoinSelector`](selection::CoinSelector), a
//! [`TransactionEvaluator`](evaluation::TransactionEvaluator), and the key
//! handler traits behind [`SecureKeyHandler`](keys::SecureKeyHandler).
//!
//! ## Architecture
//!
//! - **ledger**: Values, addresses, outputs, transactions, protocol
//!   parameters. Plain data with serde.
//! - **codec**: Canonical CBOR encoding and the size oracle every fee
//!   computation is based on.
//! - **fee**: Size fee, execution fee, tiered reference-script fee and the
//!   minimum-ADA fixed point.
//! - **selection**: CIP-2 largest-first and random-improve.
//! - **evaluation**: Redeemer budgeting through an external oracle.
//! - **keys**: Raw and BIP32-Ed25519 key handlers with sealed state.
//! - **balancing**: The select / evaluate / fee loop tying it together.
//! - **crypto**: Hashes, Ed25519, and the encryption under key handlers.
//! - **config**: Protocol constants.
//! - **error**: `ErrorKind` and the aggregate [`EngineError`].
//!
//! ## Ground rules
//!
//! 1. All lovelace and token arithmetic is checked. Overflow is an error,
//!    never a wrap.
//! 2. Encoding is canonical, so a size measured once is the size on the wire.
//! 3. Operations that fail leave their outputs untouched.
//! 4. Private keys never leave a key handler, and never hit a log.

pub mod balancing;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod evaluation;
pub mod fee;
pub mod keys;
pub mod ledger;
pub mod selection;

pub use balancing::{balance_transaction, BalanceContext, BalanceError, BalancedTransaction};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use fee::{
    compute_min_ada_required, compute_min_script_fee, compute_script_ref_fee,
    compute_transaction_fee, min_fee_without_scripts, FeeBreakdown, FeeError,
};
pub use keys::{KeyHandlerError, SecureKeyHandler};
pub use selection::{CoinSelection, CoinSelector, SelectionError, SelectionStrategy};
