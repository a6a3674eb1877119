//! `dbxops publish-file` - commit a generated file (a report, a docs page)
//! to a GitHub repository as a GitHub App.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::config::workspace_path;
use crate::cli::error::HelpfulError;
use dbxops::publish::{publish_file, PublishTarget};
use dbxops_security::github::GITHUB_API_URL;
use dbxops_security::{AuthError, GithubApp, GithubClient};

#[derive(Debug, Args)]
pub struct PublishFileArgs {
    /// File to commit
    #[arg(long)]
    pub source: PathBuf,

    /// GitHub organization
    #[arg(long)]
    pub org: String,

    #[arg(long)]
    pub repo: String,

    #[arg(long, default_value = "github_pages")]
    pub branch: String,

    /// Directory in the repository the file is committed to
    #[arg(long, default_value = "")]
    pub repo_dir: String,

    #[arg(long, default_value = "Update published file")]
    pub message: String,

    #[arg(long, env = "GITHUB_APP_ID")]
    pub app_id: String,

    /// PEM encoded RSA private key of the GitHub App
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = GITHUB_API_URL)]
    pub api_url: String,
}

pub fn run(args: PublishFileArgs) -> Result<()> {
    let source = workspace_path(&args.source);
    if !source.is_file() {
        return Err(HelpfulError::file_not_found(&source).into());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async { run_async(args, source).await })
}

async fn run_async(args: PublishFileArgs, source: PathBuf) -> Result<()> {
    let app = GithubApp::new(args.app_id.clone(), args.private_key.clone());
    let client = GithubClient::for_installation(&args.api_url, &app, &args.org, &args.repo)
        .await
        .map_err(|e| match e {
            AuthError::Jwt(e) => HelpfulError::invalid_github_key(&e.to_string()).into(),
            other => anyhow::Error::from(other),
        })?;

    let target = PublishTarget {
        org: args.org,
        repo: args.repo,
        branch: args.branch,
        directory: args.repo_dir,
    };
    let outcome = publish_file(&client, &target, &source, &args.message).await?;
    println!(
        "{} '{}' in {}/{}@{}.",
        if outcome.updated { "Updated" } else { "Created" },
        outcome.repo_path,
        target.org,
        target.repo,
        target.branch
    );
    Ok(())
}
