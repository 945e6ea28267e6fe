//! Rendering of the monthly loan summary.
//!
//! The report is a CSV-like text with a fixed headline followed by one row per
//! group in [`Summary::sorted`] order:
//!
//! ```text
//! Network,Product,Month,Amount,Count
//! 'Network 1','Loan Product 1','Mar-2016',2000.00,2
//! ```
//!
//! The network, product and month columns carry literal single quotes; the
//! amount is the exact decimal sum and the count a plain integer. Nothing is
//! quoted or escaped by the writer.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::Summary;
use crate::types::{Amount, MonthIndex, SummaryKey, SummaryValue};

pub const HEADLINE: [&str; 5] = ["Network", "Product", "Month", "Amount", "Count"];

/// One rendered row of the report.
#[derive(Debug, Serialize)]
struct ReportRow {
    network: String,
    product: String,
    month: String,
    amount: Amount,
    count: u64,
}

impl ReportRow {
    fn new(key: SummaryKey, value: SummaryValue) -> Result<Self> {
        Ok(ReportRow {
            network: format!("'Network {}'", key.network_id),
            product: format!("'Loan Product {}'", key.product_id),
            month: format!("'{}'", format_month(key.month)?),
            amount: value.amount,
            count: value.count,
        })
    }
}

/// Renders a `YYYYMM` month index as `Mon-YYYY`, e.g. `201603` as `Mar-2016`.
pub fn format_month(month: MonthIndex) -> Result<String> {
    let date = NaiveDate::from_ymd_opt((month / 100) as i32, month % 100, 1)
        .with_context(|| format!("Invalid month index: {}", month))?;
    Ok(date.format("%b-%Y").to_string())
}

/// Writes the headline and every group of `summary` to `writer`.
pub fn render_report<W: Write>(summary: &Summary, writer: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    writer
        .write_record(HEADLINE)
        .context("Failed to write report headline")?;

    for (key, value) in summary.sorted() {
        writer
            .serialize(ReportRow::new(key, value)?)
            .context("Failed to write report row")?;
    }

    writer.flush().context("Failed to flush report")?;

    Ok(())
}
