//! Core data types for loan summarisation.
//!
//! # Type Aliases
//!
//! - [`SubscriberId`]: Subscriber number (MSISDN) of the borrower (u64)
//! - [`NetworkId`]: Mobile network identifier extracted from `Network N` (u32)
//! - [`ProductId`]: Loan product identifier extracted from `Loan Product N` (u32)
//! - [`MonthIndex`]: Calendar month encoded as `YYYY * 100 + MM` (u32)
//! - [`Amount`]: Exact monetary amount (Decimal)
//!
//! # Core Types
//!
//! - [`Loan`]: A fully normalized loan disbursement record
//! - [`SummaryKey`]: The `(month, network, product)` grouping key
//! - [`SummaryValue`]: Running sum and count of one group
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use loan_summary::types::Loan;
//! use rust_decimal::Decimal;
//! use std::str::FromStr;
//!
//! let loan = Loan {
//!     subscriber_id: 27729554427,
//!     network_id: 1,
//!     date: NaiveDate::from_ymd_opt(2016, 3, 12).unwrap(),
//!     product_id: 1,
//!     amount: Decimal::from_str("1000.00").unwrap(),
//! };
//! assert_eq!(loan.month_index(), 201603);
//! ```

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

pub type SubscriberId = u64;
pub type NetworkId = u32;
pub type ProductId = u32;
pub type MonthIndex = u32;
pub type Amount = Decimal;

/// A loan disbursement whose five fields have all been normalized.
///
/// A `Loan` only exists in a fully valid state; lines that fail any check are
/// rejected by [`crate::normalize`] before a `Loan` is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub subscriber_id: SubscriberId,
    pub network_id: NetworkId,
    pub date: NaiveDate,
    pub product_id: ProductId,
    pub amount: Amount,
}

impl Loan {
    /// Returns the disbursement month as `YYYYMM`, e.g. `201603` for March 2016.
    pub fn month_index(&self) -> MonthIndex {
        month_index(self.date)
    }

    /// Returns the key this loan is summed under.
    pub fn summary_key(&self) -> SummaryKey {
        SummaryKey {
            month: self.month_index(),
            network_id: self.network_id,
            product_id: self.product_id,
        }
    }
}

/// Encodes the month of `date` as `YYYY * 100 + MM`.
pub fn month_index(date: NaiveDate) -> MonthIndex {
    date.year() as MonthIndex * 100 + date.month()
}

/// Grouping key of the summary.
///
/// Field order matters: the derived `Ord` compares month first, then network,
/// then product, which is the order of the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SummaryKey {
    pub month: MonthIndex,
    pub network_id: NetworkId,
    pub product_id: ProductId,
}

/// Running total of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryValue {
    pub amount: Amount,
    pub count: u64,
}

impl SummaryValue {
    /// Adds one amount to the group. Returns `None` if the sum overflows or
    /// can no longer be held exactly, or if the count overflows.
    pub fn accumulate(self, amount: Amount) -> Option<Self> {
        let sum = self.amount.checked_add(amount)?;
        if sum.checked_sub(self.amount)? != amount {
            return None;
        }
        Some(SummaryValue {
            amount: sum,
            count: self.count.checked_add(1)?,
        })
    }
}
