//! Reports produced from the finished, categorized ledger.
//!
//! An analysis receives the report directory, the ledger and the run's
//! specification. It may write files below the report directory and may
//! return a status line for the log.

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::fmt::money;
use crate::models::{CategorizedTransaction, LedgerTable, Table};
use crate::settings::Specification;

pub type AnalysisFn = fn(&Path, &LedgerTable, &Specification) -> Result<Option<String>>;

pub const SALARY_CATEGORY: &str = "Income - Salary";
pub const TAX_CATEGORY: &str = "Income - Tax";
pub const INCOME_GROUP: &str = "INCOME";

/// Analyses by name, in registration order.
#[derive(Clone)]
pub struct AnalysisRegistry {
    analyses: IndexMap<String, AnalysisFn>,
}

impl Default for AnalysisRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AnalysisRegistry {
    pub fn empty() -> Self {
        Self {
            analyses: IndexMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("print_balance", print_balance);
        registry.register("write_csv_of_merged_data", write_csv_of_merged_data);
        registry.register("write_sorted_csv_of_merged_data", write_sorted_csv_of_merged_data);
        registry.register("write_csv_above_1k_of_merged_data", write_csv_above_1k_of_merged_data);
        registry.register("write_txt_category_spending_summary", write_txt_category_spending_summary);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, f: AnalysisFn) -> Option<AnalysisFn> {
        self.analyses.insert(name.into(), f)
    }

    pub fn get(&self, name: &str) -> Option<AnalysisFn> {
        self.analyses.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.analyses.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.analyses.keys().cloned().collect()
    }
}

fn balance(ledger: &LedgerTable) -> Decimal {
    ledger.iter().map(|r| r.transaction.amount).sum()
}

fn sum_where(ledger: &LedgerTable, pred: impl Fn(&CategorizedTransaction) -> bool) -> Decimal {
    ledger
        .iter()
        .filter(|&r| pred(r))
        .map(|r| r.transaction.amount)
        .sum()
}

fn write_rows(path: &Path, rows: Vec<CategorizedTransaction>) -> Result<Option<String>> {
    Table::new(rows).write_csv(path)?;
    Ok(Some(format!("Wrote {}", path.display())))
}

pub fn print_balance(_: &Path, ledger: &LedgerTable, _: &Specification) -> Result<Option<String>> {
    println!("Balance: {}", money(balance(ledger)));
    Ok(None)
}

pub fn write_csv_of_merged_data(dir: &Path, ledger: &LedgerTable, _: &Specification) -> Result<Option<String>> {
    let path = dir.join("merged.csv");
    ledger.write_csv(&path)?;
    Ok(Some(format!("Wrote {}", path.display())))
}

pub fn write_sorted_csv_of_merged_data(dir: &Path, ledger: &LedgerTable, _: &Specification) -> Result<Option<String>> {
    let mut rows = ledger.records().to_vec();
    rows.sort_by_key(|r| r.transaction.amount);
    write_rows(&dir.join("sorted.csv"), rows)
}

pub fn write_csv_above_1k_of_merged_data(
    dir: &Path,
    ledger: &LedgerTable,
    _: &Specification,
) -> Result<Option<String>> {
    let threshold = Decimal::new(1000, 0);
    let rows = ledger
        .iter()
        .filter(|r| r.transaction.amount.abs() >= threshold)
        .cloned()
        .collect();
    write_rows(&dir.join("merged_over_1k.csv"), rows)
}

/// Sums per group, supercategory and category in taxonomy order, with each
/// spending group's share of after-tax salary.
pub fn write_txt_category_spending_summary(
    dir: &Path,
    ledger: &LedgerTable,
    spec: &Specification,
) -> Result<Option<String>> {
    let path = dir.join("category_spending.txt");
    let mut out = String::new();

    let _ = writeln!(out, "Total Balance: {}", money(balance(ledger)));
    let after_tax_salary = sum_where(ledger, |r| {
        matches!(r.category.as_deref(), Some(SALARY_CATEGORY) | Some(TAX_CATEGORY))
    });
    let _ = writeln!(out, "After-Tax Salary: {}", money(after_tax_salary));

    for (group, supercategories) in &spec.categorization.groups {
        let group_sum = sum_where(ledger, |r| r.group.as_deref() == Some(group.as_str()));
        let share = match (group.as_str(), (-group_sum * Decimal::ONE_HUNDRED).checked_div(after_tax_salary)) {
            (INCOME_GROUP, _) | (_, None) => String::new(),
            (_, Some(pct)) => format!("({}% of after-tax salary)", pct.round_dp(3).normalize()),
        };
        let _ = writeln!(out, "{} --- {group} {share}", money(group_sum));

        for (supercategory, categories) in supercategories {
            let super_sum = sum_where(ledger, |r| r.supercategory.as_deref() == Some(supercategory.as_str()));
            let _ = writeln!(out, "\t{} --- {supercategory}", money(super_sum));
            for category in categories {
                let category_sum = sum_where(ledger, |r| r.category.as_deref() == Some(category.as_str()));
                let _ = writeln!(out, "\t\t{} --- {category}", money(category_sum));
            }
        }
    }

    std::fs::write(&path, out)?;
    Ok(Some(format!("Wrote {}", path.display())))
}
