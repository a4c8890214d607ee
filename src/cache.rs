//! Write-through cache of adapter output, one CSV per source file.
//!
//! The cache path mirrors the source file's path below the source root with
//! its extension replaced by `.csv`. An existing cache file always wins: it
//! is not compared against the source file's modification time.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::descriptor::FileDescriptor;
use crate::error::{Result, TallyError};
use crate::importer::AdapterRegistry;
use crate::models::TransactionTable;

pub const CACHE_EXTENSION: &str = "csv";

pub struct Normalizer {
    source_root: PathBuf,
    /// `None` disables the cache.
    cache_root: Option<PathBuf>,
    adapters: AdapterRegistry,
}

impl Normalizer {
    pub fn new(source_root: PathBuf, cache_root: Option<PathBuf>, adapters: AdapterRegistry) -> Self {
        Self {
            source_root,
            cache_root,
            adapters,
        }
    }

    pub fn cache_path(&self, desc: &FileDescriptor) -> Option<PathBuf> {
        self.cache_root
            .as_ref()
            .map(|root| root.join(desc.relpath.with_extension(CACHE_EXTENSION)))
    }

    /// Normalize one source file, reading or filling the cache.
    ///
    /// An unregistered type tag yields [`TallyError::NoAdapter`] before the
    /// cache is consulted.
    pub fn get_or_compute(&self, desc: &FileDescriptor) -> Result<TransactionTable> {
        let adapter = self
            .adapters
            .get(&desc.type_tag)
            .ok_or_else(|| TallyError::NoAdapter {
                tag: desc.type_tag.clone(),
                known: self.adapters.tags(),
            })?;

        let source_path = self.source_root.join(&desc.relpath);
        let cache_path = self.cache_path(desc);

        if let Some(cached) = cache_path.as_deref().filter(|p| p.exists()) {
            debug!(
                "Found cache for {} at {}, will not reprocess",
                source_path.display(),
                cached.display()
            );
            return TransactionTable::read_csv(cached);
        }

        debug!(
            "Normalizing {} via {} ({})",
            source_path.display(),
            desc.type_tag,
            adapter.name()
        );
        // Same canonical form as a table read back from the cache.
        let table = TransactionTable::from_frame(adapter.normalize(&source_path)?.to_frame())?;

        if let Some(cache_path) = cache_path {
            write_cache(&cache_path, &table)?;
        }
        Ok(table)
    }
}

fn write_cache(path: &Path, table: &TransactionTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    table.write_csv(path)
}
