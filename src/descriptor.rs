use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TallyError};

/// Type tag marking a directory of files to skip on purpose.
pub const IGNORE_TAG: &str = "IGNORE";

/// Where a source file lives and which adapter reads it, derived from its
/// path relative to the source root: `<year>/<type-tag>/.../<file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub relpath: PathBuf,
    pub year: i32,
    pub type_tag: String,
}

impl FileDescriptor {
    /// Returns `Ok(None)` for files under an [`IGNORE_TAG`] directory.
    pub fn from_relpath(relpath: &Path) -> Result<Option<Self>> {
        let invalid = |reason: String| TallyError::InvalidDescriptor {
            path: relpath.to_path_buf(),
            reason,
        };

        let mut parts: Vec<&str> = Vec::new();
        for component in relpath.components() {
            if let Component::Normal(s) = component {
                let part = s
                    .to_str()
                    .ok_or_else(|| invalid(format!("'{}' is not valid UTF-8", s.to_string_lossy())))?;
                parts.push(part);
            }
        }
        // Two directories plus the file itself.
        if parts.len() < 3 {
            return Err(invalid(
                "expected at least <year>/<type-tag>/ below the source directory".to_string(),
            ));
        }

        let year: i32 = parts[0]
            .parse()
            .map_err(|_| invalid(format!("'{}' is not a year", parts[0])))?;

        let type_tag = parts[1];
        if type_tag == IGNORE_TAG {
            return Ok(None);
        }

        Ok(Some(Self {
            relpath: relpath.to_path_buf(),
            year,
            type_tag: type_tag.to_string(),
        }))
    }

    pub fn in_years(&self, (start, end): (i32, i32)) -> bool {
        start <= self.year && self.year <= end
    }
}
