//! Runner configuration
//!
//! Defines the named resources a run targets plus the local knobs for the
//! toolchain and the rollout wait. Everything is read from environment
//! variables so the same binary works unchanged inside a CI job.

use ferry_core::config::{DEFAULT_BRANCH, PipelineConfig};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FerryError, Result};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Named resources targeted by the run
    pub pipeline: PipelineConfig,

    /// Repository checkout, also used as the image build context
    pub workspace: PathBuf,

    /// Interpreter used to create the virtual environment
    pub python: String,

    /// Pinned interpreter version prefix (e.g., "3.11")
    pub python_version: String,

    /// Requirements manifest, relative to the workspace
    pub requirements: PathBuf,

    /// Virtual environment directory, relative to the workspace
    pub venv: PathBuf,

    /// Dockerfile override, relative to the workspace
    pub dockerfile: Option<PathBuf>,

    /// Registry host override; derived from the caller identity when unset
    pub registry: Option<String>,

    /// Maximum time to wait for the service to reach steady state
    pub stability_timeout: Duration,

    /// How often to poll service status while waiting
    pub stability_poll_interval: Duration,

    /// Where to write the rendered task definition, if anywhere
    pub render_output: Option<PathBuf>,
}

impl Config {
    /// Creates a configuration with defaults for everything but the pipeline
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline,
            workspace: PathBuf::from("."),
            python: "python3".to_string(),
            python_version: "3.11".to_string(),
            requirements: PathBuf::from("requirements.txt"),
            venv: PathBuf::from(".venv"),
            dockerfile: None,
            registry: None,
            stability_timeout: Duration::from_secs(600), // 10 minutes
            stability_poll_interval: Duration::from_secs(15),
            render_output: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - AWS_REGION, ECR_REPOSITORY, CONTAINER_NAME, ECS_TASK_DEFINITION,
    ///   ECS_SERVICE, ECS_CLUSTER (required, checked by `validate`)
    /// - FERRY_BRANCH (optional, default: main)
    /// - FERRY_WORKSPACE (optional, default: .)
    /// - FERRY_PYTHON (optional, default: python3)
    /// - FERRY_PYTHON_VERSION (optional, default: 3.11)
    /// - FERRY_REQUIREMENTS (optional, default: requirements.txt)
    /// - FERRY_VENV (optional, default: .venv)
    /// - FERRY_DOCKERFILE (optional)
    /// - FERRY_REGISTRY (optional)
    /// - FERRY_STABILITY_TIMEOUT (optional, seconds, default: 600)
    /// - FERRY_STABILITY_POLL_INTERVAL (optional, seconds, default: 15)
    /// - FERRY_RENDER_OUTPUT (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let pipeline = PipelineConfig {
            region: var("AWS_REGION").unwrap_or_default(),
            repository: var("ECR_REPOSITORY").unwrap_or_default(),
            container_name: var("CONTAINER_NAME").unwrap_or_default(),
            task_definition: var("ECS_TASK_DEFINITION").unwrap_or_default(),
            service: var("ECS_SERVICE").unwrap_or_default(),
            cluster: var("ECS_CLUSTER").unwrap_or_default(),
            branch: var("FERRY_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        };

        let mut config = Self::new(pipeline);

        if let Some(workspace) = var("FERRY_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(python) = var("FERRY_PYTHON") {
            config.python = python;
        }
        if let Some(version) = var("FERRY_PYTHON_VERSION") {
            config.python_version = version;
        }
        if let Some(requirements) = var("FERRY_REQUIREMENTS") {
            config.requirements = PathBuf::from(requirements);
        }
        if let Some(venv) = var("FERRY_VENV") {
            config.venv = PathBuf::from(venv);
        }
        config.dockerfile = var("FERRY_DOCKERFILE").map(PathBuf::from);
        config.registry = var("FERRY_REGISTRY");
        config.render_output = var("FERRY_RENDER_OUTPUT").map(PathBuf::from);

        if let Some(secs) = var("FERRY_STABILITY_TIMEOUT") {
            config.stability_timeout = parse_seconds("FERRY_STABILITY_TIMEOUT", &secs)?;
        }
        if let Some(secs) = var("FERRY_STABILITY_POLL_INTERVAL") {
            config.stability_poll_interval =
                parse_seconds("FERRY_STABILITY_POLL_INTERVAL", &secs)?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        self.pipeline
            .validate()
            .map_err(|e| FerryError::Config(e.to_string()))?;

        if self.python.is_empty() {
            return Err(FerryError::Config("python cannot be empty".to_string()));
        }

        if self.python_version.is_empty() {
            return Err(FerryError::Config(
                "python_version cannot be empty".to_string(),
            ));
        }

        if self.stability_poll_interval.is_zero() {
            return Err(FerryError::Config(
                "stability_poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.stability_timeout < self.stability_poll_interval {
            return Err(FerryError::Config(
                "stability_timeout must be at least one poll interval".to_string(),
            ));
        }

        Ok(())
    }

    /// Absolute or workspace-relative path of the virtual environment
    pub fn venv_path(&self) -> PathBuf {
        self.workspace.join(&self.venv)
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| FerryError::Config(format!("{} must be a number of seconds, got '{}'", key, value)))
}
