//! # CLI Interface
//!
//! Defines the command-line argument structure for `txforge` using `clap`
//! derive. Subcommands: `fee`, `min-ada`, `select`, and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use txforge::selection::SelectionStrategy;

use crate::logging::LogFormat;

/// Offline transaction pricing and coin selection.
///
/// Every input is a JSON file (`-` reads stdin). Results are printed to
/// stdout as JSON; logs go to stderr.
#[derive(Parser, Debug)]
#[command(
    name = "txforge",
    about = "Transaction construction engine: fees, min-ADA, coin selection",
    version,
    propagate_version = true
)]
pub struct TxforgeCli {
    /// Protocol parameters JSON. Mainnet defaults when omitted.
    #[arg(long, short = 'p', env = "TXFORGE_PARAMS", global = true)]
    pub params: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, env = "TXFORGE_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the minimum fee of a transaction, broken down by component.
    Fee(FeeArgs),
    /// Compute the minimum lovelace a transaction output must hold.
    MinAda(MinAdaArgs),
    /// Select UTXOs covering a target value.
    Select(SelectArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct FeeArgs {
    /// Transaction JSON.
    #[arg(long, short = 't')]
    pub tx: PathBuf,

    /// JSON array of resolved reference-input UTXOs.
    #[arg(long, short = 'r')]
    pub reference_utxos: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MinAdaArgs {
    /// Transaction output JSON.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// JSON array of available UTXOs.
    #[arg(long, short = 'u')]
    pub utxos: PathBuf,

    /// Target value JSON.
    #[arg(long, short = 't')]
    pub target: PathBuf,

    /// JSON array of UTXOs that must be spent regardless.
    #[arg(long)]
    pub pre_selected: Option<PathBuf>,

    /// Selection strategy: largest-first or random-improve.
    #[arg(long, short = 's', default_value = "largest-first")]
    pub strategy: SelectionStrategy,

    /// RNG seed for random-improve, for reproducible selections.
    #[arg(long)]
    pub seed: Option<u64>,
}
