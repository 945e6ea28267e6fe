//! Aggregation of loans into a monthly summary.
//!
//! Loans are grouped by [`SummaryKey`] (month, network, product) and each group
//! keeps a running amount and count. The table is built in a single pass and
//! then read back once, in key order, to render the report.

use std::collections::HashMap;

use anyhow::Result;
use log::error;
use thiserror::Error;

use crate::types::{Amount, Loan, SummaryKey, SummaryValue};

/// A loan that could not be added to its group.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error(
        "total of {}/Network {}/Loan Product {} cannot hold {amount} exactly",
        .key.month,
        .key.network_id,
        .key.product_id
    )]
    Overflow { key: SummaryKey, amount: Amount },
}

/// Running totals keyed by `(month, network, product)`.
///
/// Groups are only ever added to; nothing is removed or merged.
#[derive(Debug, Default)]
pub struct Summary {
    summing: HashMap<SummaryKey, SummaryValue>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one loan to the group of its key, creating the group at `(0, 0)`.
    ///
    /// If the group total would overflow or lose digits, the loan is not added
    /// and the group keeps its previous value.
    pub fn add_loan(&mut self, loan: &Loan) -> Result<(), AggregateError> {
        let key = loan.summary_key();
        let current = self.summing.get(&key).copied().unwrap_or_default();
        let updated = current
            .accumulate(loan.amount)
            .ok_or(AggregateError::Overflow {
                key,
                amount: loan.amount,
            })?;
        self.summing.insert(key, updated);
        Ok(())
    }

    pub fn get(&self, key: &SummaryKey) -> Option<&SummaryValue> {
        self.summing.get(key)
    }

    pub fn len(&self) -> usize {
        self.summing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summing.is_empty()
    }

    /// Returns all groups sorted ascending by month, then network, then product.
    ///
    /// Keys are unique, so the order is total and independent of the order in
    /// which loans were added.
    pub fn sorted(&self) -> Vec<(SummaryKey, SummaryValue)> {
        let mut groups: Vec<(SummaryKey, SummaryValue)> =
            self.summing.iter().map(|(key, value)| (*key, *value)).collect();
        groups.sort_unstable_by_key(|(key, _)| *key);
        groups
    }
}

/// Folds a stream of loans into a [`Summary`].
///
/// # Arguments
///
/// * `loans` - Loans to add, as produced by [`crate::io::load_loans`]
///
/// # Returns
///
/// The summary of every loan in the stream. A loan that would overflow its
/// group total is logged and left out. If the stream yields an error (the
/// input could not be read), folding stops and the error is returned.
pub fn summarize_loans<I>(loans: I) -> Result<Summary>
where
    I: IntoIterator<Item = Result<Loan>>,
{
    let mut summary = Summary::new();
    for loan in loans {
        let loan = loan?;
        if let Err(err) = summary.add_loan(&loan) {
            error!("invalid loan: {:?}: {}", loan, err);
        }
    }
    Ok(summary)
}

/// Convenience function for tests that summarizes already parsed lines.
#[cfg(test)]
fn summarize_lines(lines: &[&str]) -> Summary {
    let loans = lines
        .iter()
        .filter_map(|line| crate::normalize::parse_line(line).into_loan())
        .map(Ok);
    summarize_loans(loans).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn key(month: u32, network_id: u32, product_id: u32) -> SummaryKey {
        SummaryKey {
            month,
            network_id,
            product_id,
        }
    }

    fn value(amount: &str, count: u64) -> SummaryValue {
        SummaryValue {
            amount: Decimal::from_str(amount).unwrap(),
            count,
        }
    }

    #[test]
    fn loans_are_grouped_by_month_network_and_product() {
        let summary = summarize_lines(&[
            "27729554427,'Network 1','12-Mar-2016','Loan Product 1',1000.00",
            "27729554427,'Network 1','15-Mar-2016','Loan Product 1',1000.00",
            "27729554427,'Network 1','12-Feb-2016','Loan Product 1',1000.00",
            "27729554427,'Network 1','15-Feb-2016','Loan Product 1',1122.00",
            "27722342551,'Network 1','16-Mar-2016','Loan Product 2',1122.00",
            "27725544272,'Network 3','17-Mar-2016','Loan Product 3',2084.00",
            "27725544272,'Network 3','18-Mar-2016','Loan Product 3',-84.00",
        ]);

        assert_eq!(summary.len(), 4);
        assert_eq!(summary.get(&key(201603, 1, 1)), Some(&value("2000.00", 2)));
        assert_eq!(summary.get(&key(201602, 1, 1)), Some(&value("2122.00", 2)));
        assert_eq!(summary.get(&key(201603, 1, 2)), Some(&value("1122.00", 1)));
        assert_eq!(summary.get(&key(201603, 3, 3)), Some(&value("2000.00", 2)));
    }

    #[test]
    fn rejected_lines_contribute_nothing() {
        let summary = summarize_lines(&[
            "27722342551,'Network 3','17-Mar-2016','Loan Product 2',a",
            "27722342551,'Network 3','17-Mar-2016','Loan Product 3',,2084.00",
            "MSISDN,Network,Date,Product,Amount",
        ]);

        assert!(summary.is_empty());
        assert!(summary.sorted().is_empty());
    }

    #[test]
    fn sum_keeps_exact_decimal_text() {
        let summary = summarize_lines(&[
            "27729554427,'Network 1','12-Mar-2016','Loan Product 1',1000.00",
            "27729554427,'Network 1','15-Mar-2016','Loan Product 1',1000.00",
        ]);

        let total = summary.get(&key(201603, 1, 1)).unwrap();
        assert_eq!(total.amount.to_string(), "2000.00");
        assert_eq!(total.count, 2);
    }

    #[test]
    fn sorted_orders_by_month_then_network_then_product() {
        let summary = summarize_lines(&[
            "1,'Network 2','01-Mar-2016','Loan Product 1',1",
            "1,'Network 1','01-Mar-2016','Loan Product 2',1",
            "1,'Network 9','01-Jan-2016','Loan Product 9',1",
            "1,'Network 1','01-Mar-2016','Loan Product 1',1",
            "1,'Network 1','01-Dec-2015','Loan Product 3',1",
        ]);

        let keys: Vec<SummaryKey> = summary.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                key(201512, 1, 3),
                key(201601, 9, 9),
                key(201603, 1, 1),
                key(201603, 1, 2),
                key(201603, 2, 1),
            ]
        );
    }

    #[test]
    fn overflowing_loan_is_left_out_of_its_group() {
        let line = "27729554427,'Network 1','12-Mar-2016','Loan Product 1',79228162514264337593543950335";
        let summary = summarize_lines(&[
            line,
            line,
            "27729554427,'Network 1','12-Mar-2016','Loan Product 2',1.00",
        ]);

        assert_eq!(summary.len(), 2);
        assert_eq!(
            summary.get(&key(201603, 1, 1)),
            Some(&SummaryValue {
                amount: Decimal::MAX,
                count: 1,
            })
        );
        assert_eq!(summary.get(&key(201603, 1, 2)), Some(&value("1.00", 1)));
    }

    #[test]
    fn add_loan_reports_overflow_and_keeps_total() {
        let loan = Loan {
            subscriber_id: 27729554427,
            network_id: 1,
            date: chrono::NaiveDate::from_ymd_opt(2016, 3, 12).unwrap(),
            product_id: 1,
            amount: Decimal::MAX,
        };
        let mut summary = Summary::new();

        assert_eq!(summary.add_loan(&loan), Ok(()));
        assert_eq!(
            summary.add_loan(&loan),
            Err(AggregateError::Overflow {
                key: key(201603, 1, 1),
                amount: Decimal::MAX,
            })
        );
        assert_eq!(summary.get(&key(201603, 1, 1)).unwrap().count, 1);
    }

    #[test]
    fn read_error_stops_the_fold() {
        let loans = vec![Err(anyhow::anyhow!("disk went away"))];
        assert!(summarize_loans(loans).is_err());
    }
}
