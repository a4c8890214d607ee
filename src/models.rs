use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::schema::{self, Cell, Frame, RecordKind, SchemaError};

/// One transaction in the canonical shape every source adapter produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub datetime: NaiveDateTime,
    pub source: String,
    pub official_name: String,
    /// Positive is an inflow.
    pub amount: Decimal,
    pub alt_source: Option<String>,
    pub alt_source_official_name: Option<String>,
}

/// A canonical transaction plus its categorization. The three category
/// fields start out empty and are filled in once by the categorizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedTransaction {
    pub transaction: Transaction,
    pub category: Option<String>,
    pub supercategory: Option<String>,
    pub group: Option<String>,
}

impl CategorizedTransaction {
    pub fn uncategorized(transaction: Transaction) -> Self {
        Self {
            transaction,
            category: None,
            supercategory: None,
            group: None,
        }
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }
}

/// A row type with a fixed column layout.
pub trait Record: Sized {
    const KIND: RecordKind;

    fn from_cells(cells: Vec<Cell>) -> std::result::Result<Self, SchemaError>;

    fn to_cells(&self) -> Vec<Cell>;
}

struct Cells {
    iter: std::vec::IntoIter<Cell>,
    kind: RecordKind,
    position: usize,
}

impl Cells {
    fn new(cells: Vec<Cell>, kind: RecordKind) -> Self {
        Self {
            iter: cells.into_iter(),
            kind,
            position: 0,
        }
    }

    fn next(&mut self) -> std::result::Result<Cell, SchemaError> {
        let fields = self.kind.fields();
        let cell = self.iter.next().ok_or(SchemaError::WrongColumnCount {
            kind: self.kind,
            expected: fields.len(),
            found: self.position,
        })?;
        self.position += 1;
        Ok(cell)
    }

    fn mismatch(&self, cell: &Cell) -> SchemaError {
        let f = self.kind.fields()[self.position - 1];
        SchemaError::WrongType {
            column: f.name.to_string(),
            expected: f.ty,
            found: cell.type_name(),
            row: 0,
        }
    }

    fn datetime(&mut self) -> std::result::Result<NaiveDateTime, SchemaError> {
        match self.next()? {
            Cell::Datetime(dt) => Ok(dt),
            other => Err(self.mismatch(&other)),
        }
    }

    fn decimal(&mut self) -> std::result::Result<Decimal, SchemaError> {
        match self.next()? {
            Cell::Decimal(d) => Ok(d),
            other => Err(self.mismatch(&other)),
        }
    }

    fn text(&mut self) -> std::result::Result<String, SchemaError> {
        match self.next()? {
            Cell::Text(s) => Ok(s),
            other => Err(self.mismatch(&other)),
        }
    }

    fn nullable_text(&mut self) -> std::result::Result<Option<String>, SchemaError> {
        match self.next()? {
            Cell::Text(s) => Ok(Some(s)),
            Cell::Null => Ok(None),
            other => Err(self.mismatch(&other)),
        }
    }
}

fn read_transaction(cells: &mut Cells) -> std::result::Result<Transaction, SchemaError> {
    Ok(Transaction {
        datetime: cells.datetime()?,
        source: cells.text()?,
        official_name: cells.text()?,
        amount: cells.decimal()?,
        alt_source: cells.nullable_text()?,
        alt_source_official_name: cells.nullable_text()?,
    })
}

impl Record for Transaction {
    const KIND: RecordKind = RecordKind::Transaction;

    fn from_cells(cells: Vec<Cell>) -> std::result::Result<Self, SchemaError> {
        read_transaction(&mut Cells::new(cells, Self::KIND))
    }

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::Datetime(self.datetime),
            Cell::Text(self.source.clone()),
            Cell::Text(self.official_name.clone()),
            Cell::Decimal(self.amount),
            Cell::from(self.alt_source.clone()),
            Cell::from(self.alt_source_official_name.clone()),
        ]
    }
}

impl Record for CategorizedTransaction {
    const KIND: RecordKind = RecordKind::Categorized;

    fn from_cells(cells: Vec<Cell>) -> std::result::Result<Self, SchemaError> {
        let mut cells = Cells::new(cells, Self::KIND);
        Ok(Self {
            transaction: read_transaction(&mut cells)?,
            category: cells.nullable_text()?,
            supercategory: cells.nullable_text()?,
            group: cells.nullable_text()?,
        })
    }

    fn to_cells(&self) -> Vec<Cell> {
        let mut cells = self.transaction.to_cells();
        cells.push(Cell::from(self.category.clone()));
        cells.push(Cell::from(self.supercategory.clone()));
        cells.push(Cell::from(self.group.clone()));
        cells
    }
}

/// An ordered sequence of records of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    records: Vec<R>,
}

/// Output of a source adapter.
pub type TransactionTable = Table<Transaction>;
/// The merged, categorizable ledger.
pub type LedgerTable = Table<CategorizedTransaction>;

impl<R> Table<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Record> Table<R> {
    /// Validate `frame` against `R`'s schema and convert its rows.
    pub fn from_frame(frame: Frame) -> std::result::Result<Self, SchemaError> {
        schema::validate(R::KIND, &frame)?;
        let records = frame
            .into_rows()
            .into_iter()
            .map(R::from_cells)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(R::KIND.header());
        for record in &self.records {
            // Row width comes from the same field list as the header.
            let _ = frame.push_row(record.to_cells());
        }
        frame
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let frame = Frame::read_csv(BufReader::new(file), R::KIND)?;
        Ok(Self::from_frame(frame)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.to_frame().write_csv(BufWriter::new(file))
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<R> IntoIterator for Table<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn txn(day: u32, micros: u32, amount: i64) -> Transaction {
        Transaction {
            datetime: NaiveDate::from_ymd_opt(2024, 2, day)
                .unwrap()
                .and_hms_micro_opt(9, 30, 15, micros)
                .unwrap(),
            source: "Venmo".to_string(),
            official_name: "(A->B) dinner, drinks".to_string(),
            amount: Decimal::new(amount, 2),
            alt_source: None,
            alt_source_official_name: Some("VENMO PAYMENT 1234".to_string()),
        }
    }

    #[test]
    fn test_csv_round_trip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let table = Table::new(vec![txn(1, 0, -4000), txn(2, 123_456, 150_000)]);
        table.write_csv(&path).unwrap();
        let back = TransactionTable::read_csv(&path).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.records()[1].datetime.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_csv_header_is_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        Table::new(vec![txn(1, 0, 100)]).write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "Datetime,Source,Official Name,Amount,Alt Source,Alt Source Official Name"
        );
    }

    #[test]
    fn test_categorized_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let mut rec = CategorizedTransaction::uncategorized(txn(3, 0, -550));
        rec.category = Some("Food - Coffee".to_string());
        rec.supercategory = Some("Food".to_string());
        rec.group = Some("LIVING".to_string());
        let table = Table::new(vec![rec, CategorizedTransaction::uncategorized(txn(4, 0, 10))]);
        table.write_csv(&path).unwrap();
        assert_eq!(LedgerTable::read_csv(&path).unwrap(), table);
    }

    #[test]
    fn test_read_csv_rejects_other_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        Table::new(vec![CategorizedTransaction::uncategorized(txn(1, 0, 1))])
            .write_csv(&path)
            .unwrap();
        assert!(TransactionTable::read_csv(&path).is_err());
    }

    #[test]
    fn test_from_frame_rejects_bad_frame() {
        let frame = Frame::new(["Datetime", "Amount"]);
        assert!(matches!(
            TransactionTable::from_frame(frame),
            Err(SchemaError::WrongColumnCount { .. })
        ));
    }
}
