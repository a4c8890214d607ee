use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::analysis::AnalysisRegistry;
use crate::cache::Normalizer;
use crate::categorizer::{categorize, report_uncategorized};
use crate::descriptor::FileDescriptor;
use crate::error::{Result, TallyError};
use crate::importer::AdapterRegistry;
use crate::merger::merge;
use crate::settings::Specification;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_normalized: usize,
    pub files_skipped: usize,
    pub ledger_len: usize,
    pub uncategorized: usize,
}

/// Drives one report run: normalize, merge, categorize, analyze.
pub struct Analyst {
    spec: Specification,
    normalizer: Normalizer,
    analyses: AnalysisRegistry,
}

impl Analyst {
    /// Fails before any file is touched if the specification asks for an
    /// analysis that is not registered.
    pub fn new(spec: Specification, adapters: AdapterRegistry, analyses: AnalysisRegistry) -> Result<Self> {
        if let Some(name) = spec.analysis_names.iter().find(|n| !analyses.contains(n)) {
            return Err(TallyError::UnknownAnalysis(name.clone()));
        }
        let normalizer = Normalizer::new(spec.path_data_source.clone(), spec.cache_root(), adapters);
        Ok(Self {
            spec,
            normalizer,
            analyses,
        })
    }

    pub fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let years = self.spec.year_range();

        let mut tables = Vec::new();
        for relpath in list_files_relative(&self.spec.path_data_source)? {
            let Some(desc) = FileDescriptor::from_relpath(&relpath)? else {
                continue;
            };
            if !desc.in_years(years) {
                continue;
            }
            match self.normalizer.get_or_compute(&desc) {
                Ok(table) => {
                    summary.files_normalized += 1;
                    tables.push(table);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Cannot normalize {}; skipping it. {e}", relpath.display());
                    summary.files_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let ledger = merge(tables, &self.spec.window());
        let ledger = categorize(ledger, &self.spec.categorization)?;
        let categorized = report_uncategorized(&ledger, &self.spec.path_uncategorized)?;
        summary.ledger_len = ledger.len();
        summary.uncategorized = categorized.uncategorized;

        info!("Writing analyses...");
        for name in &self.spec.analysis_names {
            let Some(analysis) = self.analyses.get(name) else {
                return Err(TallyError::UnknownAnalysis(name.clone()));
            };
            if let Some(message) = analysis(&self.spec.path_data_report, &ledger, &self.spec)? {
                info!("{message}");
            }
        }

        info!(
            "Normalized {} files ({} skipped), {} transactions, {} uncategorized",
            summary.files_normalized, summary.files_skipped, summary.ledger_len, summary.uncategorized
        );
        Ok(summary)
    }
}

/// Every file below `root` as a path relative to it, sorted. Hidden entries
/// and files without an extension are left out.
pub fn list_files_relative(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || entry.path().extension().is_none() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
