//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod deploy;
mod render;
mod run;
mod status;

#[cfg(test)]
mod testing;

pub use deploy::DeployArgs;
pub use render::RenderArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use ferry_core::domain::service::ServiceStatus;
use ferry_runner::process::{LoggingProcessRunner, ProcessRunner, SystemProcessRunner};
use ferry_runner::service::{InMemoryLogBuffer, LogBufferService};
use ferry_runner::{Config, Pipeline, Secrets, Toolset};
use std::sync::Arc;
use tracing::debug;

use crate::config::ConfigArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline for a pushed commit
    Run(RunArgs),
    /// Render the task definition for an image without deploying it
    Render(RenderArgs),
    /// Register a rendered task definition and roll the service onto it
    Deploy(DeployArgs),
    /// Show the service's current status
    Status(StatusArgs),
}

/// Handle a CLI command
///
/// # Returns
/// The process exit code
pub async fn handle_command(command: Commands, config: &ConfigArgs) -> Result<i32> {
    let mut config = config.load()?;
    debug!(
        "Targeting service {} in cluster {} ({})",
        config.pipeline.service, config.pipeline.cluster, config.pipeline.region
    );

    let secrets = Secrets::from_env();
    let log_buffer: Arc<dyn LogBufferService> = Arc::new(InMemoryLogBuffer::new());
    let system: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new());

    match command {
        Commands::Run(args) => {
            if let Some(path) = &args.render_output {
                config.render_output = Some(path.clone());
            }
            let tracked = config.pipeline.branch.clone();
            // Tool output of a full run goes into its report
            let runner = Arc::new(LoggingProcessRunner::new(system, log_buffer.clone()));
            let pipeline = system_pipeline(config, runner, log_buffer);
            run::handle_run(args, &tracked, &pipeline, &secrets).await
        }
        Commands::Render(args) => {
            config.render_output = args.output.clone();
            let pipeline = system_pipeline(config, system, log_buffer);
            render::handle_render(args, &pipeline, &secrets).await
        }
        Commands::Deploy(args) => {
            let service = config.pipeline.service.clone();
            let pipeline = system_pipeline(config, system, log_buffer);
            deploy::handle_deploy(args, &service, &pipeline, &secrets).await
        }
        Commands::Status(args) => {
            let pipeline = system_pipeline(config, system, log_buffer);
            status::handle_status(args, &pipeline, &secrets).await
        }
    }
}

/// Pipeline driving command-line tools through `runner`
fn system_pipeline(
    config: Config,
    runner: Arc<dyn ProcessRunner>,
    log_buffer: Arc<dyn LogBufferService>,
) -> Pipeline {
    let tools = Toolset::system(&config, runner);
    Pipeline::new(config, tools, log_buffer)
}

/// Print a service status block
fn print_service_status(status: &ServiceStatus) {
    let steady = if status.is_steady() {
        "steady".green()
    } else {
        "not steady".yellow()
    };

    println!("{}", format!("Service {}:", status.service_name).bold());
    println!("  Status:      {}", status.status);
    println!("  Tasks:       {}", status.summary());
    println!("  State:       {}", steady);
    if let Some(task_definition) = &status.task_definition {
        println!("  Revision:    {}", task_definition.dimmed());
    }

    for deployment in &status.deployments {
        let rollout = deployment.rollout_state.as_deref().unwrap_or("-");
        println!(
            "  {} {} {} ({}/{} running) {}",
            "▸".cyan(),
            deployment.status,
            rollout,
            deployment.running_count,
            deployment.desired_count,
            deployment.task_definition.dimmed()
        );
        if let Some(reason) = &deployment.rollout_state_reason {
            println!("    {}", reason.dimmed());
        }
    }
}
