use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use csv::StringRecord;
use indexmap::IndexMap;

use crate::error::{Result, TallyError};
use crate::models::TransactionTable;
use crate::schema::{
    Cell, FieldType, Frame, RecordKind, ALT_SOURCE, ALT_SOURCE_OFFICIAL_NAME, AMOUNT, DATETIME,
    OFFICIAL_NAME, SOURCE,
};

pub const VENMO_SOURCE: &str = "Venmo";
pub const VENMO_CASHOUT: &str = "Venmo Cashout";
const VENMO_HEADER_ROW: usize = 2;
const VENMO_CASHOUT_TYPE: &str = "Standard Transfer";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Strip currency formatting ("- $1,200.00" -> "-1200.00") before parsing.
pub fn parse_amount(raw: &str) -> Cell {
    let cleaned = raw.replace(['$', ' ', ','], "");
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    match FieldType::Decimal.parse(cleaned) {
        Cell::Decimal(d) => Cell::Decimal(d),
        _ => Cell::text(raw),
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

fn add_empty_alt_source(frame: &mut Frame) {
    frame.push_column(ALT_SOURCE, Cell::Null);
    frame.push_column(ALT_SOURCE_OFFICIAL_NAME, Cell::Null);
}

// ---------------------------------------------------------------------------
// Built-in formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterKind {
    Manual,
    WfChecking,
    WfActiveCash,
    Venmo,
}

impl ImporterKind {
    /// Type tag naming this format in the source directory layout.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::WfChecking => "WF Checking",
            Self::WfActiveCash => "WF Active Cash",
            Self::Venmo => "Venmo",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Manual => "Manually maintained ledger",
            Self::WfChecking => "Wells Fargo Checking",
            Self::WfActiveCash => "Wells Fargo Active Cash",
            Self::Venmo => "Venmo statement",
        }
    }

    pub fn parse(&self, file_path: &Path) -> Result<TransactionTable> {
        match self {
            Self::Manual => parse_manual(file_path),
            Self::WfChecking => parse_wells_fargo(file_path, "WF Checking"),
            Self::WfActiveCash => parse_wells_fargo(file_path, "WF Active Cash"),
            Self::Venmo => parse_venmo(file_path),
        }
    }
}

const ALL_IMPORTERS: &[ImporterKind] = &[
    ImporterKind::Manual,
    ImporterKind::WfChecking,
    ImporterKind::WfActiveCash,
    ImporterKind::Venmo,
];

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Signature for adapters registered from outside the crate.
pub type AdapterFn = fn(&Path) -> Result<TransactionTable>;

#[derive(Debug, Clone, Copy)]
pub enum Adapter {
    Builtin(ImporterKind),
    Custom(AdapterFn),
}

impl Adapter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Builtin(kind) => kind.name(),
            Self::Custom(_) => "registered adapter",
        }
    }

    pub fn normalize(&self, file_path: &Path) -> Result<TransactionTable> {
        match self {
            Self::Builtin(kind) => kind.parse(file_path),
            Self::Custom(f) => f(file_path),
        }
    }
}

/// Type tag -> adapter. Built once at startup and handed to the normalizer;
/// deployments with private export formats add their own entries through
/// [`AdapterRegistry::register`] or [`AdapterRegistry::with_extensions`].
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    adapters: IndexMap<String, Adapter>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: IndexMap::new(),
        }
    }

    pub fn builtin() -> Self {
        Self {
            adapters: ALL_IMPORTERS
                .iter()
                .map(|kind| (kind.key().to_string(), Adapter::Builtin(*kind)))
                .collect(),
        }
    }

    /// Built-in adapters plus `extensions`, which replace built-ins on a tag clash.
    pub fn with_extensions(extensions: impl IntoIterator<Item = (String, AdapterFn)>) -> Self {
        let mut registry = Self::builtin();
        for (tag, f) in extensions {
            registry.register(tag, f);
        }
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, f: AdapterFn) -> Option<Adapter> {
        self.adapters.insert(tag.into(), Adapter::Custom(f))
    }

    pub fn get(&self, tag: &str) -> Option<&Adapter> {
        self.adapters.get(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Manual ledger
// ---------------------------------------------------------------------------

/// Already in canonical order, minus the cross-reference columns.
fn parse_manual(file_path: &Path) -> Result<TransactionTable> {
    let mut frame = Frame::read_csv(open(file_path)?, RecordKind::Transaction)?;
    add_empty_alt_source(&mut frame);
    Ok(TransactionTable::from_frame(frame)?)
}

// ---------------------------------------------------------------------------
// Wells Fargo checking / credit card
// ---------------------------------------------------------------------------

const WF_COLUMNS: &[&str] = &[DATETIME, AMOUNT, "unknown0", "unknown1", OFFICIAL_NAME];

fn parse_wells_fargo(file_path: &Path, source: &str) -> Result<TransactionTable> {
    let mut frame = Frame::read_headerless_csv(open(file_path)?, WF_COLUMNS, RecordKind::Transaction)?;
    frame.move_to_end(AMOUNT)?;
    frame.drop_column("unknown0")?;
    frame.drop_column("unknown1")?;
    frame.insert_column(1, SOURCE, Cell::text(source));
    add_empty_alt_source(&mut frame);
    Ok(TransactionTable::from_frame(frame)?)
}

// ---------------------------------------------------------------------------
// Venmo statement
// ---------------------------------------------------------------------------

struct VenmoColumns {
    datetime: usize,
    kind: usize,
    note: usize,
    from: usize,
    to: usize,
    amount: usize,
}

impl VenmoColumns {
    fn locate(header: &StringRecord) -> std::result::Result<Self, String> {
        let find = |name: &str| {
            header
                .iter()
                .position(|f| f.trim() == name)
                .ok_or_else(|| format!("missing column '{name}'"))
        };
        Ok(Self {
            datetime: find("Datetime")?,
            kind: find("Type")?,
            note: find("Note")?,
            from: find("From")?,
            to: find("To")?,
            amount: find("Amount (total)")?,
        })
    }
}

fn parse_venmo(file_path: &Path) -> Result<TransactionTable> {
    let adapter_err = |reason: String| TallyError::Adapter {
        path: file_path.to_path_buf(),
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(open(file_path)?);
    let records = rdr.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let Some(header) = records.get(VENMO_HEADER_ROW) else {
        return Err(adapter_err(format!(
            "expected a header on row {}",
            VENMO_HEADER_ROW + 1
        )));
    };
    let cols = VenmoColumns::locate(header).map_err(adapter_err)?;

    // First data row carries the opening balance, last the closing balance.
    let mut rows = &records[VENMO_HEADER_ROW + 1..];
    if rows.len() < 2 {
        return Err(adapter_err("missing balance rows".to_string()));
    }
    rows = &rows[1..rows.len() - 1];

    let mut frame = Frame::new(RecordKind::Transaction.header());
    for row in rows {
        let field = |idx: usize| row.get(idx).unwrap_or_default();
        let official_name = if field(cols.kind) == VENMO_CASHOUT_TYPE {
            VENMO_CASHOUT.to_string()
        } else {
            format!("({}->{}) {}", field(cols.from), field(cols.to), field(cols.note))
        };
        frame.push_row(vec![
            FieldType::Datetime.parse(field(cols.datetime)),
            Cell::text(VENMO_SOURCE),
            Cell::Text(official_name),
            parse_amount(field(cols.amount)),
            Cell::Null,
            Cell::Null,
        ])?;
    }
    Ok(TransactionTable::from_frame(frame)?)
}
