//! `dbxops validate-config` and `dbxops check-terraform-vars`.

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

use crate::cli::config::workspace_path;
use crate::cli::error::HelpfulError;
use dbxops_schema::{check_terraform_vars, validate_all, FileStatus};

#[derive(Debug, Args)]
pub struct ValidateConfigArgs {
    /// Directory searched recursively for *.yml / *.yaml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,
}

pub fn run_validate(args: ValidateConfigArgs) -> Result<()> {
    let dir = workspace_path(&args.config_dir);
    if !dir.is_dir() {
        return Err(HelpfulError::directory_not_found(&dir).into());
    }

    let report = validate_all(&dir)?;
    for line in report
        .files
        .iter()
        .filter_map(|(path, status)| status_line(path, status))
    {
        println!("{}", line);
    }
    report.into_result()?;
    Ok(())
}

/// Invalid files print nothing here; their errors come with the failure.
fn status_line(path: &Path, status: &FileStatus) -> Option<String> {
    match status {
        FileStatus::Valid => Some(format!(">>>{}: Valid", path.display())),
        FileStatus::Warning(message) => Some(format!(">>>{}: {}", path.display(), message)),
        FileStatus::Invalid => None,
    }
}

#[derive(Debug, Args)]
pub struct CheckTerraformVarsArgs {
    /// Repository root holding terraform/ and .github/workflows/
    #[arg(long, default_value = ".")]
    pub repo_root: PathBuf,
}

pub fn run_terraform(args: CheckTerraformVarsArgs) -> Result<()> {
    check_terraform_vars(&workspace_path(&args.repo_root))?;
    println!("All terraform variables are declared in the GitHub Actions workflows.");
    Ok(())
}
