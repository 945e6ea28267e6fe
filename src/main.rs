//! Loan summary application.
//!
//! This program reads a file of loan disbursements, groups them by month,
//! network and product, and writes the totals to a report file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- loans.csv                # writes Output.csv
//! cargo run -- loans.csv summary.csv
//! cargo run -- --log-level debug loans.csv
//! ```
//!
//! # Input Format
//!
//! One loan per line with five comma separated fields:
//! `msisdn,network,date,product,amount`, for example
//! `27729554427,'Network 1','12-Mar-2016','Loan Product 1',1000.00`.
//! Header lines starting with `MSISDN` may appear anywhere. Malformed lines are
//! logged and skipped.
//!
//! # Output Format
//!
//! ```text
//! Network,Product,Month,Amount,Count
//! 'Network 1','Loan Product 1','Mar-2016',2000.00,2
//! ```
//!
//! The output file must not exist yet; an existing report is never replaced.
//!
//! # Exit Status
//!
//! - `0`: the report was written
//! - `1`: the input file could not be read
//! - `2`: invalid command line
//! - `3`: the report could not be published (see the log for the kept temporary file)
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, error, info};

use loan_summary::engine::{self, Summary};
use loan_summary::io;

const EXIT_INPUT_FAILED: u8 = 1;
const EXIT_NOT_PUBLISHED: u8 = 3;

/// Summarise loan disbursements by month, network and product
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// The loans file to read
    input: PathBuf,

    /// Where to write the report; the file must not exist yet
    #[arg(default_value = "Output.csv")]
    output: PathBuf,

    /// Log level (off, error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

fn init_logging(level: Option<LevelFilter>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

/// Reads every line of `input` and folds the valid loans into a summary.
fn summarize(input: &Path) -> Result<Summary> {
    let mut loans = io::load_loans(io::read_loans_file(input)?);
    let summary = engine::summarize_loans(&mut loans)?;

    let stats = loans.stats();
    info!(
        "{}: {} lines, {} headers, {} rejected, {} loans in {} groups",
        input.display(),
        stats.lines,
        stats.headers,
        stats.rejected,
        stats.loans,
        summary.len()
    );

    Ok(summary)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    let summary = match summarize(&args.input) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{:#}", err);
            return ExitCode::from(EXIT_INPUT_FAILED);
        }
    };

    // write_report logs the cause itself.
    match io::write_report(&summary, &args.output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::from(EXIT_NOT_PUBLISHED),
    }
}
