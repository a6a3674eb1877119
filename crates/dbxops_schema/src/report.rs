//! Aggregated validation outcome.

use crate::SchemaError;
use std::fmt;
use std::path::{Path, PathBuf};

/// One rule violation in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub file_path: PathBuf,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">>>Error in {}: {}", self.file_path.display(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Valid,
    /// Accepted without validation, e.g. no schema for the file name.
    Warning(String),
    /// The file has at least one entry in [`ValidationReport::errors`].
    Invalid,
}

/// All files checked in one pass, and every error found.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub files: Vec<(PathBuf, FileStatus)>,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one file. An empty `messages` means valid.
    pub fn record(&mut self, path: &Path, messages: Vec<String>) {
        if messages.is_empty() {
            self.files.push((path.to_path_buf(), FileStatus::Valid));
            return;
        }
        self.files.push((path.to_path_buf(), FileStatus::Invalid));
        self.errors.extend(messages.into_iter().map(|message| ValidationError {
            file_path: path.to_path_buf(),
            message,
        }));
    }

    pub fn warn(&mut self, path: &Path, message: impl Into<String>) {
        self.files
            .push((path.to_path_buf(), FileStatus::Warning(message.into())));
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn render_errors(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Fail once with every collected message.
    pub fn into_result(self) -> Result<ValidationReport, SchemaError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(SchemaError::Invalid(self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_fail_once() {
        let mut report = ValidationReport::new();
        report.record(Path::new("config/a/databricks_cluster.yml"), vec![]);
        report.record(
            Path::new("config/b/databricks_cluster.yml"),
            vec!["first".into(), "second".into()],
        );
        report.warn(Path::new("config/other.yml"), "Warning - No schema found for this file");

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.error_count(), 2);
        let err = report.into_result().unwrap_err();
        let text = err.to_string();
        assert!(text.contains(">>>Error in config/b/databricks_cluster.yml: first"));
        assert!(text.contains("second"));
    }
}
