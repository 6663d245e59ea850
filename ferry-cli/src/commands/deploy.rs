//! Deploy command handler
//!
//! Registers a task definition rendered earlier (for example by `ferry render`)
//! and rolls the service onto it.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use ferry_core::domain::task_definition::TaskDefinition;
use ferry_runner::{Pipeline, Secrets};
use std::path::PathBuf;

use super::print_service_status;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Rendered task definition JSON
    #[arg(long)]
    pub task_definition_file: PathBuf,

    /// Return after the service update instead of waiting for steady state
    #[arg(long)]
    pub no_wait: bool,
}

pub async fn handle_deploy(
    args: DeployArgs,
    service: &str,
    pipeline: &Pipeline,
    secrets: &Secrets,
) -> Result<i32> {
    let path = &args.task_definition_file;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let rendered = TaskDefinition::from_value(value)
        .with_context(|| format!("{} is not a task definition", path.display()))?;

    let (revision, status) = pipeline
        .deploy(secrets, &rendered, !args.no_wait)
        .await
        .with_context(|| format!("Failed to deploy to service {}", service))?;

    println!(
        "{} Registered {}",
        "✓".green(),
        revision.task_definition_arn.cyan()
    );
    println!("{} Updated service {}", "✓".green(), service);

    match status {
        Some(status) => {
            println!();
            print_service_status(&status);
        }
        None => println!("{}", "Not waiting for steady state.".dimmed()),
    }

    Ok(0)
}
