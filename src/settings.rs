use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::categorizer::UNCATEGORIZED_CSV;
use crate::error::{Result, TallyError};
use crate::merger::ReportWindow;
use crate::taxonomy::Categorization;

pub const DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Deserialize)]
struct SpecificationFile {
    path_data_source: String,
    path_data_normalized: String,
    path_data_report: String,
    date_start: String,
    date_end: String,
    categorization: String,
    analyses: Vec<String>,
    #[serde(default = "default_cache")]
    cache: bool,
    #[serde(default = "default_path_uncategorized")]
    path_uncategorized: String,
}

fn default_cache() -> bool {
    true
}

fn default_path_uncategorized() -> String {
    UNCATEGORIZED_CSV.to_string()
}

/// Everything one report run needs: where data lives, the reporting dates,
/// the categorization rules and the analyses to produce.
#[derive(Debug, Clone)]
pub struct Specification {
    pub path_data_source: PathBuf,
    pub path_data_normalized: PathBuf,
    pub path_data_report: PathBuf,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub categorization: Categorization,
    pub analysis_names: Vec<String>,
    pub cache: bool,
    pub path_uncategorized: PathBuf,
}

impl Specification {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a specification and prepare the filesystem for it: the data
    /// source must exist, the normalized and report directories are created.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: SpecificationFile = serde_yaml::from_str(content)?;

        let path_data_source = expand_tilde(&file.path_data_source);
        if !path_data_source.is_dir() {
            return Err(TallyError::MissingSourceDir(path_data_source));
        }

        let path_data_normalized = expand_tilde(&file.path_data_normalized);
        std::fs::create_dir_all(&path_data_normalized)?;

        let path_data_report = expand_tilde(&file.path_data_report);
        std::fs::create_dir_all(&path_data_report)?;

        let date_start = parse_date("date_start", &file.date_start)?;
        let date_end = parse_date("date_end", &file.date_end)?;
        if date_end < date_start {
            return Err(TallyError::Config(format!(
                "date_end {} is before date_start {}",
                file.date_end, file.date_start
            )));
        }

        let categorization = Categorization::load(&expand_tilde(&file.categorization))?;

        Ok(Self {
            path_data_source,
            path_data_normalized,
            path_data_report,
            date_start,
            date_end,
            categorization,
            analysis_names: file.analyses,
            cache: file.cache,
            path_uncategorized: expand_tilde(&file.path_uncategorized),
        })
    }

    pub fn year_range(&self) -> (i32, i32) {
        (self.date_start.year(), self.date_end.year())
    }

    pub fn window(&self) -> ReportWindow {
        ReportWindow::from_dates(self.date_start, self.date_end)
    }

    /// Cache directory, or `None` when caching is turned off.
    pub fn cache_root(&self) -> Option<PathBuf> {
        self.cache.then(|| self.path_data_normalized.clone())
    }
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| TallyError::Config(format!("{key} '{raw}' is not a MM/DD/YYYY date: {e}")))
}

fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    match (raw.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "
categorizers:
  exact: {}
  keyword:
    Food - Coffee: [STARBUCKS]
groups:
  LIVING:
    Food: [Food - Coffee]
";

    fn write_spec(dir: &Path, extra: &str, dates: (&str, &str)) -> String {
        std::fs::create_dir_all(dir.join("source")).unwrap();
        std::fs::write(dir.join("rules.yaml"), RULES).unwrap();
        format!(
            "path_data_source: {src}\n\
             path_data_normalized: {norm}\n\
             path_data_report: {report}\n\
             date_start: {start}\n\
             date_end: {end}\n\
             categorization: {rules}\n\
             analyses: [print_balance]\n{extra}",
            src = dir.join("source").display(),
            norm = dir.join("out/normalized").display(),
            report = dir.join("out/report").display(),
            start = dates.0,
            end = dates.1,
            rules = dir.join("rules.yaml").display(),
        )
    }

    #[test]
    fn test_load_creates_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "", ("01/01/2023", "06/30/2024"));
        let spec = Specification::from_yaml(&yaml).unwrap();

        assert!(dir.path().join("out/normalized").is_dir());
        assert!(dir.path().join("out/report").is_dir());
        assert_eq!(spec.year_range(), (2023, 2024));
        assert_eq!(spec.analysis_names, vec!["print_balance"]);
        assert!(spec.cache);
        assert_eq!(spec.path_uncategorized, PathBuf::from(UNCATEGORIZED_CSV));
        assert_eq!(spec.cache_root(), Some(dir.path().join("out/normalized")));
        assert_eq!(spec.categorization.group_of("Food - Coffee"), Some("LIVING"));
    }

    #[test]
    fn test_window_is_inclusive_at_midnight_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "", ("01/01/2024", "12/31/2024"));
        let window = Specification::from_yaml(&yaml).unwrap().window();
        let micro = chrono::Duration::microseconds(1);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - micro));
        assert!(!window.contains(end + micro));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "owner: alice\n", ("01/01/2024", "12/31/2024"));
        assert!(Specification::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn test_cache_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "cache: false\n", ("01/01/2024", "12/31/2024"));
        let spec = Specification::from_yaml(&yaml).unwrap();
        assert_eq!(spec.cache_root(), None);
    }

    #[test]
    fn test_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "", ("01/01/2024", "12/31/2024"));
        std::fs::remove_dir(dir.path().join("source")).unwrap();
        let err = Specification::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, TallyError::MissingSourceDir(_)));
    }

    #[test]
    fn test_bad_date_format() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "", ("2024-01-01", "12/31/2024"));
        let err = Specification::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, TallyError::Config(ref msg) if msg.contains("date_start")));
    }

    #[test]
    fn test_reversed_dates() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_spec(dir.path(), "", ("12/31/2024", "01/01/2024"));
        assert!(matches!(Specification::from_yaml(&yaml), Err(TallyError::Config(_))));
    }

    #[test]
    fn test_missing_field() {
        let err = Specification::from_yaml("path_data_source: /tmp\n").unwrap_err();
        assert!(matches!(err, TallyError::Yaml(_)));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("data/src"), PathBuf::from("data/src"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/books"), home.join("books"));
        }
    }
}
