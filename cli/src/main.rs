// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # txforge
//!
//! Entry point for the `txforge` binary. Parses CLI arguments, initializes
//! logging, loads protocol parameters, and runs one offline computation:
//!
//! - `fee`: minimum fee of a transaction, by component
//! - `min-ada`: minimum lovelace of an output
//! - `select`: coin selection over a UTXO set
//! - `version`: print build version information

mod cli;
mod logging;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;

use txforge::fee::{compute_min_ada_required, fee_breakdown, FeeBreakdown};
use txforge::ledger::{ProtocolParameters, Transaction, TransactionOutput, Utxo, Value};
use txforge::selection::{CoinSelection, CoinSelector};

use cli::{Commands, TxforgeCli};

fn main() -> Result<()> {
    let cli = TxforgeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    let params = load_params(cli.params.as_deref())?;
    match cli.command {
        Commands::Fee(args) => print_json(&run_fee(&args, &params)?),
        Commands::MinAda(args) => print_json(&run_min_ada(&args, &params)?),
        Commands::Select(args) => print_json(&run_select(&args)?),
        Commands::Version => Ok(()),
    }
}

/// Reads a JSON document from `path`, or from stdin when `path` is `-`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_params(path: Option<&Path>) -> Result<ProtocolParameters> {
    let params = match path {
        Some(path) => ProtocolParameters::from_json_file(path)
            .with_context(|| format!("failed to load protocol parameters from {}", path.display()))?,
        None => {
            tracing::debug!("no parameters file given, using mainnet defaults");
            ProtocolParameters::mainnet()
        }
    };
    params.validate().context("invalid protocol parameters")?;
    Ok(params)
}

fn run_fee(args: &cli::FeeArgs, params: &ProtocolParameters) -> Result<FeeBreakdown> {
    let tx: Transaction = read_json(&args.tx)?;
    let references: Vec<Utxo> = match &args.reference_utxos {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let breakdown =
        fee_breakdown(&tx, &references, params).context("fee computation failed")?;
    tracing::info!(size = breakdown.size, total = breakdown.total, "fee computed");
    Ok(breakdown)
}

#[derive(Debug, Serialize)]
struct MinAdaReport {
    min_ada: u64,
    current: u64,
    sufficient: bool,
}

fn run_min_ada(args: &cli::MinAdaArgs, params: &ProtocolParameters) -> Result<MinAdaReport> {
    let output: TransactionOutput = read_json(&args.output)?;
    let min_ada = compute_min_ada_required(&output, params.coins_per_utxo_byte)
        .context("min-ADA computation failed")?;
    Ok(MinAdaReport {
        min_ada,
        current: output.amount.coin,
        sufficient: output.amount.coin >= min_ada,
    })
}

fn run_select(args: &cli::SelectArgs) -> Result<CoinSelection> {
    let available: Vec<Utxo> = read_json(&args.utxos)?;
    let target: Value = read_json(&args.target)?;
    let pre_selected: Option<Vec<Utxo>> = match &args.pre_selected {
        Some(path) => Some(read_json(path)?),
        None => None,
    };

    let mut selector = args.strategy.selector(args.seed);
    let selection = selector
        .select(pre_selected.as_deref(), &available, &target)
        .with_context(|| format!("{} selection failed", args.strategy))?;
    tracing::info!(
        strategy = %args.strategy,
        selected = selection.selected.len(),
        "selection complete"
    );
    Ok(selection)
}

/// Prints version information to stdout.
fn print_version() {
    println!("txforge {}", env!("CARGO_PKG_VERSION"));
    println!("rustc   {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use txforge::ledger::{Address, KeyHash, TransactionBody, TransactionId, TransactionInput};
    use txforge::selection::SelectionStrategy;

    fn write_json<T: Serialize>(dir: &tempfile::TempDir, name: &str, value: &T) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    fn output(coin: u64) -> TransactionOutput {
        TransactionOutput::new(
            Address::enterprise(1, &KeyHash::new([0x33; 28])),
            Value::from_coin(coin),
        )
    }

    #[test]
    fn fee_from_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let tx = Transaction::new(TransactionBody::new(
            vec![TransactionInput::new(TransactionId::new([1u8; 32]), 0)],
            vec![output(3_000_000)],
        ));
        let args = cli::FeeArgs {
            tx: write_json(&dir, "tx.json", &tx),
            reference_utxos: None,
        };

        let params = ProtocolParameters::mainnet();
        let breakdown = run_fee(&args, &params).unwrap();
        assert_eq!(breakdown.execution_fee, 0);
        assert_eq!(breakdown.total, breakdown.size_fee);
        assert_eq!(breakdown.size_fee, params.min_fee_b + params.min_fee_a * breakdown.size);
    }

    #[test]
    fn min_ada_reports_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let args = cli::MinAdaArgs {
            output: write_json(&dir, "out.json", &output(1)),
        };
        let report = run_min_ada(&args, &ProtocolParameters::mainnet()).unwrap();
        assert!(!report.sufficient);
        assert!(report.min_ada > 1);
    }

    #[test]
    fn select_from_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let utxos: Vec<Utxo> = [2_000_000u64, 9_000_000, 4_000_000]
            .iter()
            .zip(0u32..)
            .map(|(coin, i)| {
                Utxo::new(
                    TransactionInput::new(TransactionId::new([2u8; 32]), i),
                    output(*coin),
                )
            })
            .collect();
        let args = cli::SelectArgs {
            utxos: write_json(&dir, "utxos.json", &utxos),
            target: write_json(&dir, "target.json", &Value::from_coin(10_000_000)),
            pre_selected: None,
            strategy: SelectionStrategy::LargestFirst,
            seed: None,
        };

        let selection = run_select(&args).unwrap();
        assert_eq!(selection.selected, vec![utxos[1].clone(), utxos[2].clone()]);
        assert_eq!(selection.remaining, vec![utxos[0].clone()]);
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = read_json::<Value>(Path::new("/nonexistent/txforge.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/txforge.json"));
    }

    #[test]
    fn parameters_default_to_mainnet() {
        assert_eq!(load_params(None).unwrap(), ProtocolParameters::mainnet());
    }
}
