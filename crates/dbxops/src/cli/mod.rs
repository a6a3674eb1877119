//! Command-line interface of the `dbxops` binary.
//!
//! Each command lives in its own module with an `Args` struct and a
//! synchronous `run` that owns its tokio runtime.

pub mod benchmark;
pub mod cleanup;
pub mod config;
pub mod deploy;
pub mod error;
pub mod output;
pub mod publish;
pub mod schema;
pub mod token;
pub mod workflows;
