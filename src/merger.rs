use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::models::{CategorizedTransaction, LedgerTable, Table, Transaction, TransactionTable};

/// Source whose export restates events that another source already records.
pub const REDUNDANT_SOURCE: &str = "WF Checking";

/// Salary deposits, also present in the pay stub exports.
const PAYSTUB_RESTATEMENTS: &[&str] = &["GENERAL ELECTRIC REG.SALARY", "GE HEALTHCARE TE REG.SALARY"];

/// Peer payments, also present in the Venmo export.
const VENMO_RESTATEMENTS: &[&str] = &["VENMO PAYMENT"];

/// Inclusive `[start, end]` reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ReportWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Midnight of `start` through midnight of `end`. Entries timestamped
    /// later on the end date fall outside the window.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.and_time(NaiveTime::MIN),
            end: end.and_time(NaiveTime::MIN),
        }
    }

    pub fn contains(&self, datetime: NaiveDateTime) -> bool {
        self.start <= datetime && datetime <= self.end
    }
}

/// Whether `t` restates an event recorded by another source.
///
/// This is a description heuristic only. The dropped entries are not
/// reconciled against the entries they duplicate.
pub fn is_redundant(t: &Transaction) -> bool {
    t.source.contains(REDUNDANT_SOURCE)
        && PAYSTUB_RESTATEMENTS
            .iter()
            .chain(VENMO_RESTATEMENTS)
            .any(|pattern| t.official_name.contains(pattern))
}

/// Combine normalized tables into one time-ordered ledger.
///
/// Records are concatenated in input order and sorted stably by datetime, so
/// entries sharing a timestamp keep their concatenation order. Redundant
/// restatements are dropped, then everything outside `window` is.
pub fn merge(tables: Vec<TransactionTable>, window: &ReportWindow) -> LedgerTable {
    let mut records: Vec<Transaction> = tables.into_iter().flat_map(Table::into_records).collect();
    records.sort_by_key(|t| t.datetime);

    let total = records.len();
    records.retain(|t| !is_redundant(t));
    debug!("Dropped {} redundant entries out of {total}", total - records.len());

    records.retain(|t| window.contains(t.datetime));

    Table::new(
        records
            .into_iter()
            .map(CategorizedTransaction::uncategorized)
            .collect(),
    )
}
