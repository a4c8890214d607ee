use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Schema mismatch: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not find data source {}", .0.display())]
    MissingSourceDir(PathBuf),

    #[error("Analysis {0} provided in specification does not exist")]
    UnknownAnalysis(String),

    #[error("{rule} rule uses category '{category}', which is not in any group")]
    UnknownCategory { rule: &'static str, category: String },

    #[error("Invalid transaction file path {}: {reason}", path.display())]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("No adapter for type tag '{tag}' (known: {})", known.join(", "))]
    NoAdapter { tag: String, known: Vec<String> },

    #[error("Cannot normalize {}: {reason}", path.display())]
    Adapter { path: PathBuf, reason: String },

    #[error("Categories without a supercategory or group: {}", .0.join(", "))]
    InconsistentCategories(Vec<String>),
}

impl TallyError {
    /// Errors that only invalidate a single source file; the run continues.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoAdapter { .. })
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
