//! gridcalc CLI - evaluate spreadsheet formulas from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridcalc::prelude::*;
use gridcalc::{evaluate, parse_address, EvaluationOptions, OperatorPrecedence, SheetResolver};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(author, version, about = "Spreadsheet formula evaluation tool")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one formula against the given cells
    Eval {
        /// Formula to evaluate (the leading '=' is optional)
        formula: String,

        /// Cell contents as ADDRESS=TEXT, e.g. A1=10 or B2==A1*2
        #[arg(short, long = "cell", value_parser = parse_cell_arg)]
        cells: Vec<(String, String)>,

        /// Apply standard operator precedence instead of left-to-right folding
        #[arg(long)]
        standard_precedence: bool,

        /// Maximum nesting of sub-expressions and referenced formulas
        #[arg(long, default_value_t = EvaluationOptions::default().max_depth)]
        max_depth: usize,
    },

    /// Recalculate the given cells and print the grid tab-separated
    Grid {
        /// Cell contents as ADDRESS=TEXT, e.g. A1=10 or B2==A1*2
        #[arg(short, long = "cell", value_parser = parse_cell_arg)]
        cells: Vec<(String, String)>,

        /// Range to print, e.g. A1:C3 (default: the used area)
        #[arg(short, long)]
        range: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Eval {
            formula,
            cells,
            standard_precedence,
            max_depth,
        } => eval(&formula, &cells, standard_precedence, max_depth),
        Commands::Grid { cells, range } => grid(&cells, range.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Parse an `ADDRESS=TEXT` argument; only the first '=' separates
fn parse_cell_arg(arg: &str) -> std::result::Result<(String, String), String> {
    let (address, text) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=TEXT, got '{}'", arg))?;
    Ok((address.trim().to_string(), text.to_string()))
}

/// Build a sheet large enough for every given cell
fn build_sheet(cells: &[(String, String)]) -> Result<Sheet> {
    let mut positions = Vec::with_capacity(cells.len());
    for (address, text) in cells {
        let (row, col) = parse_address(address)
            .with_context(|| format!("Invalid cell address '{}'", address))?;
        positions.push((row, col, text.as_str()));
    }

    let rows = positions
        .iter()
        .map(|&(row, _, _)| row.saturating_add(1))
        .fold(gridcalc::DEFAULT_ROWS, u32::max);
    let cols = positions
        .iter()
        .map(|&(_, col, _)| col.saturating_add(1))
        .fold(gridcalc::DEFAULT_COLS, u32::max);

    let mut sheet = Sheet::with_bounds(rows, cols);
    for (row, col, text) in positions {
        sheet
            .set_input(row, col, text)
            .with_context(|| format!("Failed to set cell ({}, {})", row, col))?;
    }
    debug!(cells = sheet.cell_count(), rows, cols, "sheet built");
    Ok(sheet)
}

fn eval(
    formula: &str,
    cells: &[(String, String)],
    standard_precedence: bool,
    max_depth: usize,
) -> Result<ExitCode> {
    let sheet = build_sheet(cells)?;

    let options = EvaluationOptions {
        precedence: if standard_precedence {
            OperatorPrecedence::Standard
        } else {
            OperatorPrecedence::LeftToRight
        },
        max_depth,
        ..EvaluationOptions::default()
    };
    let resolver = SheetResolver::new(&sheet);
    let ctx = EvaluationContext::new(&resolver).with_options(options);

    match evaluate(formula, &ctx) {
        Ok(value) => {
            println!("{}", value);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", FormulaError::SENTINEL);
            eprintln!("{}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn grid(cells: &[(String, String)], range: Option<&str>) -> Result<ExitCode> {
    let mut sheet = build_sheet(cells)?;

    let stats = sheet.calculate();
    info!(
        "Calculated {} formulas ({} errors)",
        stats.cells_calculated, stats.errors
    );

    let rows: Vec<Vec<String>> = match range {
        Some(range) => {
            let range = CellRange::parse(range)
                .with_context(|| format!("Invalid range '{}'", range))?;
            sheet
                .get_range(range.start.row, range.start.col, range.end.row, range.end.col)
                .iter()
                .map(|row| row.iter().map(|cell| cell.display().into_owned()).collect())
                .collect()
        }
        None => sheet.to_list(),
    };

    let mut stdout = io::stdout().lock();
    for row in rows {
        writeln!(stdout, "{}", row.join("\t")).context("Failed to write to stdout")?;
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_arg_splits_on_first_equals() {
        assert_eq!(
            parse_cell_arg("B2==A1*2").unwrap(),
            ("B2".to_string(), "=A1*2".to_string())
        );
        assert_eq!(
            parse_cell_arg("a1=hello").unwrap(),
            ("a1".to_string(), "hello".to_string())
        );
        assert!(parse_cell_arg("A1").is_err());
    }

    #[test]
    fn test_build_sheet_grows_bounds() {
        let cells = vec![
            ("A1".to_string(), "1".to_string()),
            ("AD2000".to_string(), "=A1+1".to_string()),
        ];
        let sheet = build_sheet(&cells).unwrap();
        assert_eq!(sheet.rows(), 2000);
        assert_eq!(sheet.cols(), 30);
        assert_eq!(sheet.formula_at(1999, 29), Some("=A1+1"));

        assert!(build_sheet(&[("1A".to_string(), "x".to_string())]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
