//! Record normalization for raw loan lines.
//!
//! A raw line holds five comma separated fields:
//!
//! ```text
//! msisdn,network,date,product,amount
//! 27729554427,'Network 1','12-Mar-2016','Loan Product 1',1000.00
//! ```
//!
//! Each field is loosely formatted free text. Normalization turns a line into a
//! typed [`Loan`] or rejects the whole line. Checks run in a fixed order
//! (subscriber id, network, date, product, amount) and stop at the first
//! failure, so only one cause is reported per line.
//!
//! Header rows (first field `msisdn`, any case) may recur anywhere in an export
//! and are skipped without being treated as errors.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use log::{debug, error};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Amount, Loan, NetworkId, ProductId, SubscriberId};

/// Number of fields in a loan line.
pub const FIELD_COUNT: usize = 5;

/// First field of a header row, compared case-insensitively.
pub const HEADER_TOKEN: &str = "msisdn";

/// Day, abbreviated month name, four digit year, e.g. `12-Mar-2016`.
pub const DATE_FORMAT: &str = "%d-%b-%Y";

/// Why a line was rejected.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("expected 5 fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid Loan.msisdn: {0}")]
    SubscriberId(String),

    #[error("invalid Loan.network: {0}")]
    Network(String),

    #[error("invalid Loan.date: {0}")]
    Date(String),

    #[error("invalid Loan.date: {raw}: {source}")]
    DateFormat {
        raw: String,
        source: chrono::ParseError,
    },

    #[error("invalid Loan.date: {raw}: year {year} is not a four digit year")]
    DateYear { raw: String, year: i32 },

    #[error("invalid Loan.product: {0}")]
    Product(String),

    #[error("invalid Loan.amount: {raw}: {source}")]
    Amount {
        raw: String,
        source: rust_decimal::Error,
    },

    #[error("invalid Loan.amount: {0}: cannot be held exactly")]
    AmountInexact(String),
}

/// Outcome of parsing one line.
#[derive(Debug)]
pub enum ParsedLine {
    Loan(Loan),
    Header,
    Rejected(NormalizeError),
}

impl ParsedLine {
    pub fn into_loan(self) -> Option<Loan> {
        match self {
            ParsedLine::Loan(loan) => Some(loan),
            ParsedLine::Header | ParsedLine::Rejected(_) => None,
        }
    }
}

fn network_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)network\s+(\d+)").expect("invalid network regex"))
}

fn product_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)loan product\s+(\d+)").expect("invalid product regex"))
}

fn date_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-\w]+").expect("invalid date token regex"))
}

/// Strips surrounding whitespace and quotes left over from the upstream export.
fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c: char| c == '\'' || c == '"').trim()
}

fn capture_id(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parses a line, logging why it was skipped if it does not yield a loan.
///
/// Never fails: rejected lines are logged at error level with the raw text,
/// repeated header rows at debug level.
pub fn parse_line(line: &str) -> ParsedLine {
    match normalize_line(line) {
        Ok(Some(loan)) => ParsedLine::Loan(loan),
        Ok(None) => {
            debug!("loan headline: {}", line);
            ParsedLine::Header
        }
        Err(err) => {
            error!("invalid loan line: {}: {}", line, err);
            ParsedLine::Rejected(err)
        }
    }
}

/// Normalizes one line into a loan.
///
/// Returns `Ok(None)` for header rows and the first failing check otherwise.
pub fn normalize_line(line: &str) -> Result<Option<Loan>, NormalizeError> {
    let fields: Vec<&str> = line.split(',').collect();
    let [subscriber_id, network, date, product, amount] = fields[..] else {
        return Err(NormalizeError::FieldCount {
            found: fields.len(),
        });
    };

    if unquote(subscriber_id).eq_ignore_ascii_case(HEADER_TOKEN) {
        return Ok(None);
    }

    // Struct fields are evaluated in the order written, which is the check order.
    Ok(Some(Loan {
        subscriber_id: parse_subscriber_id(subscriber_id)?,
        network_id: extract_network_id(network)
            .ok_or_else(|| NormalizeError::Network(network.to_string()))?,
        date: extract_date(date)?,
        product_id: extract_product_id(product)
            .ok_or_else(|| NormalizeError::Product(product.to_string()))?,
        amount: parse_amount(amount)?,
    }))
}

/// Accepts a subscriber id made only of ASCII digits.
pub fn parse_subscriber_id(text: &str) -> Result<SubscriberId, NormalizeError> {
    let digits = unquote(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::SubscriberId(text.to_string()));
    }
    digits
        .parse()
        .map_err(|_| NormalizeError::SubscriberId(text.to_string()))
}

/// Finds `Network <n>` anywhere in `text`, ignoring case.
pub fn extract_network_id(text: &str) -> Option<NetworkId> {
    capture_id(network_re(), text)
}

/// Finds `Loan Product <n>` anywhere in `text`, ignoring case.
pub fn extract_product_id(text: &str) -> Option<ProductId> {
    capture_id(product_re(), text)
}

/// Parses the first run of word characters and hyphens in `text` as a
/// [`DATE_FORMAT`] date.
pub fn extract_date(text: &str) -> Result<NaiveDate, NormalizeError> {
    let token = date_token_re()
        .find(text)
        .ok_or_else(|| NormalizeError::Date(text.to_string()))?
        .as_str();

    let date = NaiveDate::parse_from_str(token, DATE_FORMAT).map_err(|source| {
        NormalizeError::DateFormat {
            raw: text.to_string(),
            source,
        }
    })?;

    if !(1000..=9999).contains(&date.year()) {
        return Err(NormalizeError::DateYear {
            raw: text.to_string(),
            year: date.year(),
        });
    }

    Ok(date)
}

/// Parses an exact decimal amount. Negative amounts are valid.
///
/// Plain and scientific (`1.5e3`) notation are accepted. Amounts with more
/// digits than a [`Decimal`] holds are rejected rather than rounded.
pub fn parse_amount(text: &str) -> Result<Amount, NormalizeError> {
    let value = unquote(text);
    let amount_err = |source: rust_decimal::Error| NormalizeError::Amount {
        raw: text.to_string(),
        source,
    };

    let Some((mantissa, exponent)) = value.split_once(['e', 'E']) else {
        return Decimal::from_str_exact(value).map_err(amount_err);
    };

    let mantissa = Decimal::from_str_exact(mantissa).map_err(amount_err)?;
    let amount = Decimal::from_scientific(value).map_err(amount_err)?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| NormalizeError::AmountInexact(text.to_string()))?;

    if scaled_equals(mantissa, exponent, amount) {
        Ok(amount)
    } else {
        Err(NormalizeError::AmountInexact(text.to_string()))
    }
}

/// Checks `mantissa * 10^exponent == amount` without rounding.
fn scaled_equals(mantissa: Decimal, exponent: i32, amount: Decimal) -> bool {
    let mut power = Decimal::ONE;
    for _ in 0..exponent.unsigned_abs() {
        match power.checked_mul(Decimal::TEN) {
            Some(next) => power = next,
            None => return false,
        }
    }

    if exponent >= 0 {
        mantissa.checked_mul(power) == Some(amount)
    } else {
        amount.checked_mul(power) == Some(mantissa)
    }
}
