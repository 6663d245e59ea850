//! Ferry CLI
//!
//! Runs the redeployment pipeline for a pushed commit, or one of its parts:
//! rendering a task definition, deploying a rendered one, or checking the
//! service.

mod commands;
mod config;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use config::ConfigArgs;
use ferry_runner::FerryError;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Commit-to-service redeployment pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so `--json` output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match handle_command(cli.command, &cli.config).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code(error_exit_code(&e))
        }
    }
}

/// Exit code for an error, taken from the first pipeline error in its chain
fn error_exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<FerryError>())
        .map_or(1, FerryError::exit_code)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
