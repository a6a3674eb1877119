//! Cross-check of Terraform input variables against the `TF_VAR_*`
//! environment the deploy workflows export.

use crate::{Result, SchemaError};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

pub const SUCCESS_MESSAGE: &str =
    "All terraform variables are declared in the GitHub Actions workflows.";

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"variable\s+"(\w+)""#).unwrap_or_else(|e| panic!("variable pattern: {e}"))
    })
}

fn tf_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"TF_VAR_(\w+)").unwrap_or_else(|e| panic!("TF_VAR pattern: {e}")))
}

/// Variable names declared in a Terraform file, in declaration order.
pub fn declared_variables(text: &str) -> Vec<String> {
    variable_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Names exported as `TF_VAR_<name>` anywhere in a workflow file.
pub fn exported_variables(text: &str) -> BTreeSet<String> {
    tf_var_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// A workflow file and the name it is reported under.
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub path: PathBuf,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct TerraformCheck {
    pub variables_tf: PathBuf,
    pub workflows: Vec<WorkflowFile>,
}

impl TerraformCheck {
    /// The repository layout: `terraform/variables.tf` checked against the
    /// plan and deploy workflows.
    pub fn for_repo(root: &Path) -> Self {
        let workflows_dir = root.join(".github").join("workflows");
        Self {
            variables_tf: root.join("terraform").join("variables.tf"),
            workflows: vec![
                WorkflowFile {
                    path: workflows_dir.join("ci_terrafom_plan.yml"),
                    label: "ci_terraform_plan.yml".to_string(),
                },
                WorkflowFile {
                    path: workflows_dir.join("cd_deploy.yml"),
                    label: "cd_deploy.yml".to_string(),
                },
            ],
        }
    }

    /// One message per (workflow, missing variable), grouped by workflow.
    pub fn missing(&self) -> Result<Vec<String>> {
        let variables = declared_variables(&read(&self.variables_tf)?);
        let mut missing = Vec::new();
        for workflow in &self.workflows {
            let exported = exported_variables(&read(&workflow.path)?);
            missing.extend(
                variables
                    .iter()
                    .filter(|v| !exported.contains(v.as_str()))
                    .map(|v| format!("Missing variable TF_VAR_{} in {}", v, workflow.label)),
            );
        }
        Ok(missing)
    }

    pub fn run(&self) -> Result<()> {
        let missing = self.missing()?;
        if missing.is_empty() {
            info!(variables_tf = %self.variables_tf.display(), "terraform variables complete");
            Ok(())
        } else {
            Err(SchemaError::MissingTerraformVars(missing))
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Run the check for the repository rooted at `root`.
pub fn check_terraform_vars(root: &Path) -> Result<()> {
    TerraformCheck::for_repo(root).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_declarations_and_exports() {
        let tf = r#"
variable "client_id" {
  type = string
}
variable  "environment" {}
"#;
        assert_eq!(declared_variables(tf), vec!["client_id", "environment"]);

        let wf = "env:\n  TF_VAR_client_id: ${{ secrets.CLIENT_ID }}\n  TF_VAR_region: westeurope\n";
        let exported = exported_variables(wf);
        assert!(exported.contains("client_id"));
        assert!(exported.contains("region"));
        assert!(!exported.contains("environment"));
    }

    #[test]
    fn test_reports_every_missing_pair() {
        let root = tempfile::tempdir().unwrap();
        let wf_dir = root.path().join(".github/workflows");
        std::fs::create_dir_all(&wf_dir).unwrap();
        std::fs::create_dir_all(root.path().join("terraform")).unwrap();
        std::fs::write(
            root.path().join("terraform/variables.tf"),
            "variable \"a\" {}\nvariable \"b\" {}\n",
        )
        .unwrap();
        std::fs::write(wf_dir.join("ci_terrafom_plan.yml"), "TF_VAR_a: 1\n").unwrap();
        std::fs::write(wf_dir.join("cd_deploy.yml"), "TF_VAR_a: 1\nTF_VAR_b: 2\n").unwrap();

        let err = check_terraform_vars(root.path()).unwrap_err();
        match err {
            SchemaError::MissingTerraformVars(missing) => {
                assert_eq!(missing, vec!["Missing variable TF_VAR_b in ci_terraform_plan.yml"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        std::fs::write(wf_dir.join("ci_terrafom_plan.yml"), "TF_VAR_a: 1\nTF_VAR_b: 2\n").unwrap();
        check_terraform_vars(root.path()).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            check_terraform_vars(root.path()),
            Err(SchemaError::Io { .. })
        ));
    }
}
