//! Configuration Schema Validation
//!
//! The `config/` tree of a dbt project describes Databricks resources in YAML.
//! Each file name maps to one schema:
//!
//! | File | Schema |
//! |------|--------|
//! | `databricks_cluster.yml` | [`ClustersConfig`] |
//! | `databricks_dbt_job.yml` | [`JobsConfig`] |
//! | `databricks_sql_warehouse.yml` | [`SqlWarehousesConfig`] |
//!
//! Files with any other name pass with a warning.
//!
//! Validation runs in two phases per file:
//!
//! 1. **Structure**: every field is decoded on its own ([`fields::Field`]),
//!    so unknown keys, missing required keys, literal enumerations and
//!    positive/non-negative integers are each reported per field.
//! 2. **Rules**: name patterns, e-mail addresses, webhook ids, quartz cron
//!    expressions, mutually exclusive field groups and the task union.
//!
//! Every message from every file lands in one [`ValidationReport`]; the caller
//! fails once, after all files were checked.
//!
//! # Modules
//!
//! - [`cluster`], [`job`], [`warehouse`]: the schemas
//! - [`registry`]: file-name dispatch and the directory walk
//! - [`terraform`]: `variables.tf` vs `TF_VAR_*` cross-check

pub mod cluster;
mod cron;
pub mod fields;
pub mod job;
pub mod registry;
pub mod report;
pub mod terraform;
pub mod warehouse;

pub use cluster::{ClusterConfig, ClustersConfig};
pub use fields::Field;
pub use job::{JobConfig, JobsConfig, TaskConfig, TaskKind};
pub use registry::{validate_all, validate_file, SchemaKind};
pub use report::{FileStatus, ValidationError, ValidationReport};
pub use terraform::{check_terraform_vars, TerraformCheck};
pub use warehouse::{SqlWarehouseConfig, SqlWarehousesConfig};

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{}", .0.render_errors())]
    Invalid(ValidationReport),

    #[error("{}", .0.join("\n"))]
    MissingTerraformVars(Vec<String>),
}

/// Walks a decoded document and reports every violation.
pub trait Validate {
    /// Push one message per violation; `path` locates `self` in the document.
    fn validate(&self, path: &str, errors: &mut Vec<String>);
}

/// Checks of a schema struct beyond the structure of its fields, run by the
/// `Validate` impl that `schema_struct!` generates.
pub(crate) trait Rules {
    fn rules(&self, _path: &str, _errors: &mut Vec<String>) {}
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self, path: &str, errors: &mut Vec<String>) {
        for (i, item) in self.iter().enumerate() {
            item.validate(&format!("{}[{}]", path, i), errors);
        }
    }
}

impl<V> Validate for BTreeMap<String, V> {
    fn validate(&self, _path: &str, _errors: &mut Vec<String>) {}
}

/// Types whose decoding is their only check.
macro_rules! no_rules {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Validate for $ty {
                fn validate(&self, _path: &str, _errors: &mut Vec<String>) {}
            }
        )*
    };
}

pub(crate) use no_rules;

no_rules!(
    String,
    bool,
    i64,
    serde_yaml::Value,
    chrono::NaiveDate,
    fields::PositiveInt,
    fields::NonNegativeInt,
    fields::PauseStatus,
);

/// `parent.child`, or just `child` at the document root.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}
