//! File-name dispatch and the directory walk.

use crate::report::ValidationReport;
use crate::{ClustersConfig, JobsConfig, Result, SchemaError, SqlWarehousesConfig, Validate};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const NO_SCHEMA_WARNING: &str = "Warning - No schema found for this file";

/// Which schema validates a file, chosen by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Clusters,
    Jobs,
    SqlWarehouses,
}

impl SchemaKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "databricks_cluster.yml" => Some(SchemaKind::Clusters),
            "databricks_dbt_job.yml" => Some(SchemaKind::Jobs),
            "databricks_sql_warehouse.yml" => Some(SchemaKind::SqlWarehouses),
            _ => None,
        }
    }

    /// Decode `text` and run the rule checks. Every field decodes on its own,
    /// so all structural and rule errors of the file come back together. Only
    /// text that is not a YAML mapping yields a single parse error.
    pub fn check(self, text: &str) -> Vec<String> {
        match self {
            SchemaKind::Clusters => check_as::<ClustersConfig>(text),
            SchemaKind::Jobs => check_as::<JobsConfig>(text),
            SchemaKind::SqlWarehouses => check_as::<SqlWarehousesConfig>(text),
        }
    }
}

fn check_as<T: DeserializeOwned + Validate>(text: &str) -> Vec<String> {
    match serde_yaml::from_str::<T>(text) {
        Ok(config) => {
            let mut errors = Vec::new();
            config.validate("", &mut errors);
            errors
        }
        Err(e) => vec![e.to_string()],
    }
}

/// Validate one file into `report`.
pub fn validate_file(path: &Path, report: &mut ValidationReport) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let Some(kind) = SchemaKind::from_file_name(file_name) else {
        debug!(path = %path.display(), "no schema for file");
        report.warn(path, NO_SCHEMA_WARNING);
        return Ok(());
    };

    let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    report.record(path, kind.check(&text));
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Validate every `*.yml` / `*.yaml` file under `config_dir`, in path order.
///
/// Only I/O failures return `Err`; schema violations are in the report.
pub fn validate_all(config_dir: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::new();

    for entry in WalkDir::new(config_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| SchemaError::Walk {
            path: config_dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !is_yaml(entry.path()) {
            continue;
        }
        validate_file(entry.path(), &mut report)?;
    }

    info!(
        dir = %config_dir.display(),
        files = report.files.len(),
        errors = report.error_count(),
        "config validation finished"
    );
    Ok(report)
}
