use std::path::Path;

use colored::Colorize;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::error::{Result, TallyError};
use crate::models::{CategorizedTransaction, LedgerTable, Table};
use crate::taxonomy::Categorization;

/// Default location of the triage file for transactions no rule matched.
pub const UNCATEGORIZED_CSV: &str = "./uncategorized.csv";

pub struct CategorizeResult {
    pub categorized: usize,
    pub uncategorized: usize,
}

/// Assign category, supercategory and group to every transaction.
///
/// Keyword rules run first, then exact-match rules; within each pass rules
/// run in document order and a later match overwrites an earlier one, so an
/// exact match always beats a keyword match.
pub fn categorize(ledger: LedgerTable, categorization: &Categorization) -> Result<LedgerTable> {
    let mut records = ledger.into_records();
    let folded: Vec<String> = records
        .iter()
        .map(|r| r.transaction.official_name.to_uppercase())
        .collect();

    for (category, keywords) in &categorization.keyword {
        for keyword in keywords {
            let keyword = keyword.to_uppercase();
            for (record, name) in records.iter_mut().zip(&folded) {
                if name.contains(&keyword) {
                    record.category = Some(category.clone());
                }
            }
        }
    }

    for (category, exact_matches) in &categorization.exact {
        for exact in exact_matches {
            for record in records.iter_mut() {
                if record.transaction.official_name == *exact {
                    record.category = Some(category.clone());
                }
            }
        }
    }

    for record in &mut records {
        let category = record.category.as_deref();
        record.supercategory = category
            .and_then(|c| categorization.supercategory_of(c))
            .map(String::from);
        record.group = category
            .and_then(|c| categorization.group_of(c))
            .map(String::from);
    }

    let mut offending: Vec<String> = Vec::new();
    for record in records.iter().filter(|r| !is_consistent(r)) {
        let label = record.category.clone().unwrap_or_else(|| "<none>".to_string());
        if !offending.contains(&label) {
            offending.push(label);
        }
    }
    if !offending.is_empty() {
        error!("Offending categories: {}", offending.join(", "));
        return Err(TallyError::InconsistentCategories(offending));
    }

    Ok(Table::new(records))
}

fn is_consistent(record: &CategorizedTransaction) -> bool {
    let has_category = record.category.is_some();
    has_category == record.supercategory.is_some() && has_category == record.group.is_some()
}

/// Transactions no rule matched, ascending by amount.
pub fn uncategorized(ledger: &LedgerTable) -> Vec<&CategorizedTransaction> {
    let mut rows: Vec<&CategorizedTransaction> = ledger.iter().filter(|r| !r.is_categorized()).collect();
    rows.sort_by_key(|r| r.transaction.amount);
    rows
}

/// Write uncategorized transactions to `path` for manual triage, or remove a
/// leftover file from an earlier run when everything was categorized.
pub fn report_uncategorized(ledger: &LedgerTable, path: &Path) -> Result<CategorizeResult> {
    let rows = uncategorized(ledger);
    let result = CategorizeResult {
        categorized: ledger.len() - rows.len(),
        uncategorized: rows.len(),
    };

    if !rows.is_empty() {
        let total: Decimal = rows.iter().map(|r| r.transaction.amount).sum();
        warn!("Number of entries that were not autocategorized: {}", rows.len());
        warn!("Total value of entries not autocategorized: {total}");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Table::new(rows.into_iter().cloned().collect::<Vec<_>>()).write_csv(path)?;
        warn!(
            "{}",
            format!("Please look at {} and decide categories for its entries.", path.display()).bold()
        );
    } else if path.exists() {
        info!("Successfully autocategorized all expenses.");
        std::fs::remove_file(path)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use chrono::NaiveDate;
    use indexmap::IndexMap;

    fn record(name: &str, amount: i64) -> CategorizedTransaction {
        CategorizedTransaction::uncategorized(Transaction {
            datetime: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            source: "WF Checking".to_string(),
            official_name: name.to_string(),
            amount: Decimal::new(amount, 0),
            alt_source: None,
            alt_source_official_name: None,
        })
    }

    fn rules(pairs: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(c, v)| (c.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn categorization(exact: &[(&str, &[&str])], keyword: &[(&str, &[&str])]) -> Categorization {
        let yaml = "
LIVING:
  Food:
    - Food - Coffee
    - Food - Restaurants
  Shopping:
    - Shopping - General
INCOME:
  Income:
    - Income - Salary
";
        let groups = serde_yaml::from_str(yaml).unwrap();
        Categorization::new(rules(exact), rules(keyword), groups).unwrap()
    }

    fn categories(ledger: &LedgerTable) -> Vec<Option<&str>> {
        ledger.iter().map(|r| r.category.as_deref()).collect()
    }

    #[test]
    fn test_keyword_assigns_taxonomy() {
        let c = categorization(&[], &[("Food - Coffee", &["STARBUCKS"])]);
        let ledger = categorize(Table::new(vec![record("STARBUCKS #123", -5)]), &c).unwrap();
        let r = &ledger.records()[0];
        assert_eq!(r.category.as_deref(), Some("Food - Coffee"));
        assert_eq!(r.supercategory.as_deref(), Some("Food"));
        assert_eq!(r.group.as_deref(), Some("LIVING"));
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let c = categorization(&[], &[("Food - Coffee", &["starbucks"])]);
        let ledger = categorize(Table::new(vec![record("Starbucks Reserve", -7)]), &c).unwrap();
        assert_eq!(categories(&ledger), vec![Some("Food - Coffee")]);
    }

    #[test]
    fn test_exact_match_beats_keyword() {
        let c = categorization(
            &[("Food - Restaurants", &["STARBUCKS CATERING"])],
            &[("Food - Coffee", &["STARBUCKS"])],
        );
        let ledger = categorize(
            Table::new(vec![record("STARBUCKS CATERING", -300), record("STARBUCKS #9", -4)]),
            &c,
        )
        .unwrap();
        assert_eq!(
            categories(&ledger),
            vec![Some("Food - Restaurants"), Some("Food - Coffee")]
        );
    }

    #[test]
    fn test_exact_match_is_case_sensitive() {
        let c = categorization(&[("Income - Salary", &["GE PAYROLL"])], &[]);
        let ledger = categorize(Table::new(vec![record("ge payroll", 100)]), &c).unwrap();
        assert_eq!(categories(&ledger), vec![None]);
    }

    #[test]
    fn test_later_keyword_rule_wins() {
        let c = categorization(
            &[],
            &[
                ("Food - Coffee", &["TARGET CAFE"]),
                ("Shopping - General", &["TARGET"]),
            ],
        );
        let ledger = categorize(Table::new(vec![record("TARGET CAFE 0042", -12)]), &c).unwrap();
        assert_eq!(categories(&ledger), vec![Some("Shopping - General")]);
    }

    #[test]
    fn test_unmatched_stays_null_and_invariant_holds() {
        let c = categorization(&[], &[("Food - Coffee", &["STARBUCKS"])]);
        let ledger = categorize(
            Table::new(vec![record("STARBUCKS", -5), record("RANDOM VENDOR XYZ", -9)]),
            &c,
        )
        .unwrap();
        for r in ledger.iter() {
            assert!(is_consistent(r));
        }
        let r = &ledger.records()[1];
        assert_eq!((&r.category, &r.supercategory, &r.group), (&None, &None, &None));
    }

    #[test]
    fn test_category_outside_taxonomy_is_fatal() {
        let c = categorization(&[], &[]);
        let mut stray = record("OLD IMPORT", -1);
        stray.category = Some("Legacy".to_string());
        let err = categorize(Table::new(vec![stray, record("OTHER", 1)]), &c).unwrap_err();
        assert!(matches!(err, TallyError::InconsistentCategories(ref cats) if cats == &["Legacy"]));
    }

    #[test]
    fn test_uncategorized_sorted_by_amount() {
        let c = categorization(&[], &[("Food - Coffee", &["STARBUCKS"])]);
        let ledger = categorize(
            Table::new(vec![
                record("B", 20),
                record("STARBUCKS", -5),
                record("A", -100),
                record("C", 3),
            ]),
            &c,
        )
        .unwrap();
        let names: Vec<&str> = uncategorized(&ledger)
            .iter()
            .map(|r| r.transaction.official_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_report_writes_and_clears_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uncategorized.csv");
        let c = categorization(&[], &[("Food - Coffee", &["STARBUCKS"])]);

        let messy = categorize(Table::new(vec![record("B", 20), record("A", -100)]), &c).unwrap();
        let result = report_uncategorized(&messy, &path).unwrap();
        assert_eq!(result.uncategorized, 2);
        assert_eq!(result.categorized, 0);
        let written = LedgerTable::read_csv(&path).unwrap();
        let names: Vec<&str> = written
            .iter()
            .map(|r| r.transaction.official_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        let clean = categorize(Table::new(vec![record("STARBUCKS", -5)]), &c).unwrap();
        let result = report_uncategorized(&clean, &path).unwrap();
        assert_eq!(result.uncategorized, 0);
        assert_eq!(result.categorized, 1);
        assert!(!path.exists());
    }
}
