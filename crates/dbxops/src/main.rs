//! dbxops - CI/CD and benchmark tooling for dbt on Databricks.

use clap::{Parser, Subcommand};
use dbxops_logging::{init_logging, LogConfig};
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "dbxops", version, about = "CI/CD and benchmark tooling for dbt on Databricks")]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Also log to a rotating file under ~/.dbxops/logs
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fresh workspace access token
    Token(cli::token::TokenArgs),

    /// Upload a new wheel version to the workspace
    Deploy(cli::deploy::DeployArgs),

    /// Remove wheels outside the retention policy
    Cleanup(cli::cleanup::CleanupArgs),

    /// Start workflows by name and/or from a job definition file
    StartWorkflows(cli::workflows::StartWorkflowsArgs),

    /// Validate the YAML configuration files
    ValidateConfig(cli::schema::ValidateConfigArgs),

    /// Check terraform variables are passed by the CI workflows
    CheckTerraformVars(cli::schema::CheckTerraformVarsArgs),

    /// Commit a file to a GitHub repository as a GitHub App
    PublishFile(cli::publish::PublishFileArgs),

    /// dbt versus DLT benchmark
    Benchmark {
        #[command(subcommand)]
        command: cli::benchmark::BenchmarkCommand,
    },
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Token(args) => cli::token::run(args),
        Commands::Deploy(args) => cli::deploy::run(args),
        Commands::Cleanup(args) => cli::cleanup::run(args),
        Commands::StartWorkflows(args) => cli::workflows::run(args),
        Commands::ValidateConfig(args) => cli::schema::run_validate(args),
        Commands::CheckTerraformVars(args) => cli::schema::run_terraform(args),
        Commands::PublishFile(args) => cli::publish::run(args),
        Commands::Benchmark { command } => cli::benchmark::run(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "dbxops",
        verbose: cli.verbose,
        log_to_file: cli.log_file,
    }) {
        eprintln!("Warning: {:#}", err);
    }

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cleanup_flags() {
        let cli = Cli::try_parse_from([
            "dbxops",
            "cleanup",
            "--wheel-name",
            "runner",
            "--nr-of-wheels-to-keep",
            "3",
            "--nr-of-days-to-keep-wheel",
            "14",
            "--host",
            "adb-1.azuredatabricks.net",
            "--client-id",
            "sp",
        ])
        .unwrap();
        match cli.command {
            Commands::Cleanup(args) => {
                assert_eq!(args.nr_of_wheels_to_keep, 3);
                assert_eq!(args.nr_of_days_to_keep_wheel, 14);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_workflow_names_accept_many() {
        let cli = Cli::try_parse_from([
            "dbxops",
            "start-workflows",
            "--workflow-names",
            "nightly",
            "hourly",
            "--host",
            "h",
            "--client-id",
            "sp",
        ])
        .unwrap();
        match cli.command {
            Commands::StartWorkflows(args) => assert_eq!(args.workflow_names, vec!["nightly", "hourly"]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
