//! Configuration module
//!
//! Loads the runner configuration from the environment and applies any
//! command-line overrides on top.

use anyhow::{Context, Result};
use clap::Args;
use ferry_runner::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Overrides for the environment-provided configuration
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Cloud region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Registry repository the image is pushed to
    #[arg(long, global = true)]
    pub repository: Option<String>,

    /// Container whose image is replaced
    #[arg(long, global = true)]
    pub container_name: Option<String>,

    /// Task definition family
    #[arg(long, global = true)]
    pub task_definition: Option<String>,

    /// Service to roll out
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Cluster hosting the service
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// Source checkout to build and test
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Registry host, instead of the account's default
    #[arg(long, global = true)]
    pub registry: Option<String>,

    /// Maximum wait for steady state, in seconds
    #[arg(long, global = true)]
    pub stability_timeout: Option<u64>,
}

impl ConfigArgs {
    /// Resolves the final configuration
    ///
    /// The result is validated, so a missing pipeline name fails here rather
    /// than halfway through a run.
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::from_env().context("Failed to read configuration")?;
        let pipeline = &mut config.pipeline;

        let overrides = [
            (&mut pipeline.region, &self.region),
            (&mut pipeline.repository, &self.repository),
            (&mut pipeline.container_name, &self.container_name),
            (&mut pipeline.task_definition, &self.task_definition),
            (&mut pipeline.service, &self.service),
            (&mut pipeline.cluster, &self.cluster),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        if let Some(workspace) = &self.workspace {
            config.workspace = workspace.clone();
        }
        if let Some(registry) = &self.registry {
            config.registry = Some(registry.clone());
        }
        if let Some(secs) = self.stability_timeout {
            config.stability_timeout = Duration::from_secs(secs);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
