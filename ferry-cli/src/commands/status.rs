//! Status command handler

use anyhow::{Context, Result};
use clap::Args;
use ferry_runner::{Pipeline, Secrets};

use super::print_service_status;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print the raw status as JSON
    #[arg(long)]
    pub json: bool,
}

/// Shows the service status; exits non-zero when the service is not steady
pub async fn handle_status(args: StatusArgs, pipeline: &Pipeline, secrets: &Secrets) -> Result<i32> {
    let status = pipeline
        .status(secrets)
        .await
        .context("Failed to describe service")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_service_status(&status);
    }

    Ok(if status.is_steady() { 0 } else { 1 })
}
