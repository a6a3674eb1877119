//! Error types for the benchmark store.

use thiserror::Error;

/// Store operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row that does not map back onto the data model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Invalid benchmark plan: {0}")]
    InvalidPlan(String),

    #[error("Failed to parse benchmark plan: {0}")]
    PlanYaml(#[from] serde_yaml::Error),
}

impl DbError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }
}
