//! `dbxops start-workflows` - start jobs by name after a deploy.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::config::{workspace_path, DatabricksArgs};
use dbxops::actions::WorkflowCommands;
use dbxops::workflows::{load_definition, start_workflows, workflows_to_start};

#[derive(Debug, Args)]
pub struct StartWorkflowsArgs {
    /// Names of the workflows to start
    #[arg(long, num_args = 0..)]
    pub workflow_names: Vec<String>,

    /// Job definition file; jobs with `trigger_once_after_deploy` are started too
    #[arg(long)]
    pub workflow_definition_yaml_path: Option<PathBuf>,

    #[command(flatten)]
    pub databricks: DatabricksArgs,
}

pub fn run(args: StartWorkflowsArgs) -> Result<()> {
    let definition = args
        .workflow_definition_yaml_path
        .as_deref()
        .map(|p| {
            let path = workspace_path(p);
            load_definition(&path).with_context(|| format!("Loading {}", path.display()))
        })
        .transpose()?;
    let workflows = workflows_to_start(&args.workflow_names, definition.as_ref());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let client = args.databricks.settings().client().await?;
        let summary = start_workflows(&client, workflows, &WorkflowCommands).await?;
        println!("{}", summary.message());
        Ok(())
    })
}
