//! Start workflows by name after a deploy.

use crate::actions::AnnotationSink;
use crate::client::JobsApi;
use crate::error::{Error, Result};
use crate::runner::trigger;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

pub const MISSING_WORKFLOW_TITLE: &str = "Workflow does not exists";

/// The part of `databricks_dbt_job.yml` that decides which jobs start after a
/// deploy. Every other key is ignored; the schema check owns the full shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub jobs: Vec<DefinedJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefinedJob {
    pub name: String,
    #[serde(default)]
    pub trigger_once_after_deploy: bool,
}

impl WorkflowDefinition {
    /// Names of jobs flagged `trigger_once_after_deploy`, trimmed.
    pub fn trigger_once_after_deploy(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.trigger_once_after_deploy)
            .map(|j| j.name.trim().to_string())
            .collect()
    }
}

/// Read the job names out of a job definition file.
pub fn load_definition(path: &Path) -> Result<WorkflowDefinition> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&text).map_err(|e| Error::Definition {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Names given on the command line followed by the jobs of `definition`
/// marked `trigger_once_after_deploy`. Blank names are skipped, names are
/// trimmed and each one appears once.
pub fn workflows_to_start(
    names: &[String],
    definition: Option<&WorkflowDefinition>,
) -> Vec<String> {
    let mut workflows: Vec<String> = Vec::new();
    let from_definition = definition
        .map(WorkflowDefinition::trigger_once_after_deploy)
        .unwrap_or_default();

    for name in names.iter().map(|n| n.trim().to_string()).chain(from_definition) {
        if !name.is_empty() && !workflows.contains(&name) {
            workflows.push(name);
        }
    }
    workflows
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartedWorkflow {
    pub name: String,
    pub job_id: i64,
    pub run_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartSummary {
    pub supplied: Vec<String>,
    pub started: Vec<StartedWorkflow>,
    pub missing: Vec<String>,
}

impl StartSummary {
    pub fn message(&self) -> String {
        if !self.started.is_empty() {
            format!(
                "Done. {} workflow(s) supplied, {} found and started.",
                self.supplied.len(),
                self.started.len()
            )
        } else if !self.supplied.is_empty() {
            format!(
                "Done. NONE of the provided workflow(s) ({}) were found. Please check the name(s).",
                self.supplied.join(", ")
            )
        } else {
            "Done. No workflows to start.".to_string()
        }
    }
}

/// Resolve each name to a job id and queue one run of it.
///
/// Unknown names produce a warning annotation and are skipped.
pub async fn start_workflows<J>(
    api: &J,
    workflows: Vec<String>,
    annotations: &dyn AnnotationSink,
) -> Result<StartSummary>
where
    J: JobsApi + ?Sized,
{
    let mut summary = StartSummary::default();

    for name in &workflows {
        match api.find_job_id(name).await? {
            Some(job_id) => {
                info!("Starting workflow '{}' with id '{}'", name, job_id);
                let handle = trigger(api, job_id, true).await?;
                info!(run_id = handle.run_id, "Workflow started");
                summary.started.push(StartedWorkflow {
                    name: name.clone(),
                    job_id,
                    run_id: handle.run_id,
                });
            }
            None => {
                annotations.warning(
                    MISSING_WORKFLOW_TITLE,
                    &format!(
                        "Workflow '{}' does not exist and is therefor not started.",
                        name
                    ),
                );
                summary.missing.push(name.clone());
            }
        }
    }

    summary.supplied = workflows;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordedAnnotations;
    use crate::testing::FakeDatabricks;

    const DEFINITION: &str = r#"
jobs:
  - name: " nightly "
    trigger_once_after_deploy: true
    tasks:
      - task_key: run
        dbt_command: dbt build
  - name: hourly
    tasks:
      - task_key: run
        dbt_command: dbt run
  - name: backfill
    trigger_once_after_deploy: true
    tasks:
      - task_key: run
        dbt_command: dbt build --full-refresh
job_cluster:
  azure_attributes:
    availability: SPOT_WITH_FALLBACK_AZURE
"#;

    fn definition() -> WorkflowDefinition {
        serde_yaml::from_str(DEFINITION).unwrap()
    }

    #[test]
    fn test_definition_ignores_keys_outside_job_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databricks_dbt_job.yml");
        std::fs::write(
            &path,
            r#"
owner: data-platform
jobs:
  - name: nightly
    trigger_once_after_deploy: true
    max_concurrent_runs: 0
    tasks:
      - task_key: run
        dbt_command: dbt build
        some_future_setting: 1
  - name: hourly
"#,
        )
        .unwrap();

        let def = load_definition(&path).unwrap();
        assert_eq!(def.jobs.len(), 2);
        assert_eq!(workflows_to_start(&[], Some(&def)), vec!["nightly"]);
    }

    #[test]
    fn test_definition_without_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("databricks_dbt_job.yml");
        std::fs::write(&path, "jobs:\n  - trigger_once_after_deploy: true\n").unwrap();
        assert!(matches!(
            load_definition(&path),
            Err(Error::Definition { .. })
        ));
    }

    #[test]
    fn test_names_from_flags_and_definition() {
        let names = vec!["backfill".to_string(), "  ".to_string(), "adhoc".to_string()];
        let def = definition();
        assert_eq!(
            workflows_to_start(&names, Some(&def)),
            vec!["backfill", "adhoc", "nightly"]
        );
        assert!(workflows_to_start(&[], None).is_empty());
    }

    #[tokio::test]
    async fn test_missing_workflow_is_a_warning() {
        let api = FakeDatabricks::default().with(|s| {
            s.job_names.insert("nightly".into(), 77);
        });
        let sink = RecordedAnnotations::default();

        let summary = start_workflows(&api, vec!["nightly".into(), "ghost".into()], &sink)
            .await
            .unwrap();
        assert_eq!(summary.started.len(), 1);
        assert_eq!(summary.started[0].job_id, 77);
        assert_eq!(summary.missing, vec!["ghost"]);
        assert_eq!(api.state().run_now, vec![(77, Some(true))]);

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].title, MISSING_WORKFLOW_TITLE);
        assert_eq!(
            warnings[0].message,
            "Workflow 'ghost' does not exist and is therefor not started."
        );
        assert_eq!(summary.message(), "Done. 2 workflow(s) supplied, 1 found and started.");
    }

    #[tokio::test]
    async fn test_summary_messages() {
        let api = FakeDatabricks::default();
        let sink = RecordedAnnotations::default();
        let none_found = start_workflows(&api, vec!["a".into()], &sink).await.unwrap();
        assert_eq!(
            none_found.message(),
            "Done. NONE of the provided workflow(s) (a) were found. Please check the name(s)."
        );
        let empty = start_workflows(&api, vec![], &sink).await.unwrap();
        assert_eq!(empty.message(), "Done. No workflows to start.");
    }
}
