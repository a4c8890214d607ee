//! Column schema for transaction tables.
//!
//! Adapters and the cache reader assemble an untyped [`Frame`] (named columns of
//! [`Cell`]s) the way a raw export is laid out, then hand it to
//! [`crate::models::Table::from_frame`], which runs [`validate`] against the
//! static field list of one [`RecordKind`]. Any deviation in column count,
//! names, cell types, or order is a hard failure.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::Result;

pub const DATETIME: &str = "Datetime";
pub const SOURCE: &str = "Source";
pub const OFFICIAL_NAME: &str = "Official Name";
pub const AMOUNT: &str = "Amount";
pub const ALT_SOURCE: &str = "Alt Source";
pub const ALT_SOURCE_OFFICIAL_NAME: &str = "Alt Source Official Name";
pub const CATEGORY: &str = "Category";
pub const SUPERCATEGORY: &str = "Supercategory";
pub const GROUP: &str = "Group";

/// Written to CSV with this format; `%.f` prints nothing for whole seconds.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Datetime,
    Text,
    Decimal,
    NullableText,
}

impl FieldType {
    pub fn accepts(self, cell: &Cell) -> bool {
        matches!(
            (self, cell),
            (Self::Datetime, Cell::Datetime(_))
                | (Self::Text, Cell::Text(_))
                | (Self::Decimal, Cell::Decimal(_))
                | (Self::NullableText, Cell::Text(_) | Cell::Null)
        )
    }

    /// Interpret a raw text field as this type. Text that does not parse is
    /// kept as [`Cell::Text`] so that validation reports the column.
    pub fn parse(self, raw: &str) -> Cell {
        match self {
            Self::Datetime => parse_datetime(raw)
                .map(Cell::Datetime)
                .unwrap_or_else(|| Cell::Text(raw.to_string())),
            Self::Decimal => Decimal::from_str(raw.trim())
                .map(Cell::Decimal)
                .unwrap_or_else(|_| Cell::Text(raw.to_string())),
            Self::Text => Cell::Text(raw.to_string()),
            Self::NullableText if raw.is_empty() => Cell::Null,
            Self::NullableText => Cell::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Datetime => "datetime",
            Self::Text => "text",
            Self::Decimal => "decimal",
            Self::NullableText => "nullable text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn field(name: &'static str, ty: FieldType) -> Field {
    Field { name, ty }
}

const TRANSACTION_FIELDS: &[Field] = &[
    field(DATETIME, FieldType::Datetime),
    field(SOURCE, FieldType::Text),
    field(OFFICIAL_NAME, FieldType::Text),
    field(AMOUNT, FieldType::Decimal),
    field(ALT_SOURCE, FieldType::NullableText),
    field(ALT_SOURCE_OFFICIAL_NAME, FieldType::NullableText),
];

const CATEGORIZED_FIELDS: &[Field] = &[
    field(DATETIME, FieldType::Datetime),
    field(SOURCE, FieldType::Text),
    field(OFFICIAL_NAME, FieldType::Text),
    field(AMOUNT, FieldType::Decimal),
    field(ALT_SOURCE, FieldType::NullableText),
    field(ALT_SOURCE_OFFICIAL_NAME, FieldType::NullableText),
    field(CATEGORY, FieldType::NullableText),
    field(SUPERCATEGORY, FieldType::NullableText),
    field(GROUP, FieldType::NullableText),
];

/// The closed set of table shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Canonical record produced by a source adapter.
    Transaction,
    /// Canonical record plus category, supercategory and group.
    Categorized,
}

impl RecordKind {
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::Transaction => TRANSACTION_FIELDS,
            Self::Categorized => CATEGORIZED_FIELDS,
        }
    }

    pub fn field(self, name: &str) -> Option<&'static Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn header(self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.name).collect()
    }

    /// Type used to read a column of this name; unknown columns read as text.
    fn column_type(self, name: &str) -> FieldType {
        self.field(name).map_or(FieldType::Text, |f| f.ty)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => f.write_str("transaction table"),
            Self::Categorized => f.write_str("categorized table"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cells and frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Decimal(Decimal),
    Datetime(NaiveDateTime),
}

impl Cell {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
            Self::Datetime(_) => "datetime",
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// An empty string is stored as [`Cell::Null`]; CSV cannot tell the two apart.
impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) if !s.is_empty() => Self::Text(s),
            _ => Self::Null,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Datetime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("wrong number of columns for {kind} (expected {expected}, found {found})")]
    WrongColumnCount {
        kind: RecordKind,
        expected: usize,
        found: usize,
    },

    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("wrong type {found} for {column} in row {row} (expected {expected})")]
    WrongType {
        column: String,
        expected: FieldType,
        found: &'static str,
        row: usize,
    },

    #[error("columns are in wrong order: got [{}], should be [{}]", found.join(", "), expected.join(", "))]
    WrongOrder {
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("row {row} has {found} cells but the table has {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Named columns of untyped cells, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> std::result::Result<(), SchemaError> {
        if row.len() != self.columns.len() {
            return Err(SchemaError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> std::result::Result<(), SchemaError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        Ok(())
    }

    /// Insert a column holding `fill` in every row.
    pub fn insert_column(&mut self, index: usize, name: &str, fill: Cell) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, name.to_string());
        for row in &mut self.rows {
            row.insert(index, fill.clone());
        }
    }

    pub fn push_column(&mut self, name: &str, fill: Cell) {
        self.insert_column(self.columns.len(), name, fill);
    }

    pub fn move_to_end(&mut self, name: &str) -> std::result::Result<(), SchemaError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
        let column = self.columns.remove(idx);
        self.columns.push(column);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.push(cell);
        }
        Ok(())
    }

    /// Read a CSV whose first record is the header. Columns named in `kind`
    /// are parsed as that field's type.
    pub fn read_csv<R: Read>(reader: R, kind: RecordKind) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        let mut records = rdr.records();
        let Some(header) = records.next().transpose()? else {
            return Ok(Self::new(Vec::<String>::new()));
        };
        let mut frame = Self::new(header.iter());
        let types: Vec<FieldType> = frame.columns.iter().map(|c| kind.column_type(c)).collect();
        for record in records {
            let record = record?;
            frame.push_row(
                record
                    .iter()
                    .zip(&types)
                    .map(|(raw, ty)| ty.parse(raw))
                    .collect(),
            )?;
        }
        Ok(frame)
    }

    /// Read a headerless CSV, naming its columns positionally.
    pub fn read_headerless_csv<R: Read>(reader: R, names: &[&str], kind: RecordKind) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        let mut frame = Self::new(names.iter().copied());
        let types: Vec<FieldType> = names.iter().map(|c| kind.column_type(c)).collect();
        for record in rdr.records() {
            let record = record?;
            if record.len() != names.len() {
                return Err(SchemaError::RaggedRow {
                    row: frame.len(),
                    expected: names.len(),
                    found: record.len(),
                }
                .into());
            }
            frame.push_row(
                record
                    .iter()
                    .zip(&types)
                    .map(|(raw, ty)| ty.parse(raw))
                    .collect(),
            )?;
        }
        Ok(frame)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Check `frame` against the static field list of `kind`.
pub fn validate(kind: RecordKind, frame: &Frame) -> std::result::Result<(), SchemaError> {
    let fields = kind.fields();
    if frame.columns.len() != fields.len() {
        return Err(SchemaError::WrongColumnCount {
            kind,
            expected: fields.len(),
            found: frame.columns.len(),
        });
    }

    for f in fields {
        let idx = frame
            .column_index(f.name)
            .ok_or_else(|| SchemaError::MissingColumn(f.name.to_string()))?;
        if let Some((row, cell)) = frame
            .rows
            .iter()
            .map(|r| &r[idx])
            .enumerate()
            .find(|(_, cell)| !f.ty.accepts(cell))
        {
            return Err(SchemaError::WrongType {
                column: f.name.to_string(),
                expected: f.ty,
                found: cell.type_name(),
                row,
            });
        }
    }

    if !frame.columns.iter().map(String::as_str).eq(fields.iter().map(|f| f.name)) {
        return Err(SchemaError::WrongOrder {
            found: frame.columns.clone(),
            expected: kind.header().into_iter().map(String::from).collect(),
        });
    }
    Ok(())
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
