//! Error types for the Ferry runner
//!
//! Each pipeline stage wraps lower-level failures (a tool that could not be
//! spawned, a non-zero exit, unparseable output) in the category of the stage
//! that raised them, so the caller can tell what the platform was left with.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, FerryError>;

/// Exit code reported when the service never reached steady state
pub const EXIT_TIMEOUT: i32 = 124;

/// Exit code reported for configuration errors
pub const EXIT_CONFIG: i32 = 2;

/// Errors that can occur while running the pipeline
#[derive(Debug, Error)]
pub enum FerryError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A secret needed by the current stage was not provided
    #[error("Secret {0} is not set")]
    MissingSecret(&'static str),

    /// External tool could not be started
    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited non-zero
    #[error("Command '{command}' failed with exit code {exit_code}: {stderr}")]
    Process {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// External tool produced output that could not be understood
    #[error("Unexpected output from '{command}': {message}")]
    Parse { command: String, message: String },

    /// Workspace could not be brought to the triggering commit
    #[error("Checkout failed: {0}")]
    Checkout(#[source] Box<FerryError>),

    /// Interpreter or dependency setup failed
    #[error("Toolchain setup failed: {0}")]
    Toolchain(#[source] Box<FerryError>),

    /// Interpreter does not match the pinned version
    #[error("Interpreter version {found} does not match pinned version {pinned}")]
    RuntimeMismatch { pinned: String, found: String },

    /// Test suite reported a failure
    #[error("Test suite failed with exit code {exit_code}: {summary}")]
    TestsFailed { exit_code: i32, summary: String },

    /// Credentials or registry login were rejected
    #[error("Authentication failed: {0}")]
    Authentication(#[source] Box<FerryError>),

    /// Image build or push failed
    #[error("Image publish failed: {0}")]
    Publish(#[source] Box<FerryError>),

    /// Task definition could not be fetched
    #[error("Failed to fetch task definition: {0}")]
    FetchTaskDefinition(#[source] Box<FerryError>),

    /// Task definition could not be rendered
    #[error(transparent)]
    TaskDefinition(#[from] ferry_core::Error),

    /// Registration, service update or status polling failed
    #[error("Rollout failed: {0}")]
    Rollout(#[source] Box<FerryError>),

    /// Platform reported a failed deployment
    #[error("Deployment of {revision} to service '{service}' failed: {reason}")]
    DeploymentFailed {
        service: String,
        revision: String,
        reason: String,
    },

    /// Service did not reach steady state in time
    #[error(
        "Service '{service}' in cluster '{cluster}' did not reach steady state within {waited:?} (last seen: {last_seen})"
    )]
    StabilityTimeout {
        service: String,
        cluster: String,
        waited: Duration,
        last_seen: String,
    },

    /// Local file could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FerryError {
    pub fn checkout(source: FerryError) -> Self {
        Self::Checkout(Box::new(source))
    }

    pub fn toolchain(source: FerryError) -> Self {
        Self::Toolchain(Box::new(source))
    }

    pub fn authentication(source: FerryError) -> Self {
        Self::Authentication(Box::new(source))
    }

    pub fn publish(source: FerryError) -> Self {
        Self::Publish(Box::new(source))
    }

    pub fn fetch_task_definition(source: FerryError) -> Self {
        Self::FetchTaskDefinition(Box::new(source))
    }

    pub fn rollout(source: FerryError) -> Self {
        Self::Rollout(Box::new(source))
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            FerryError::StabilityTimeout { .. } => EXIT_TIMEOUT,
            FerryError::Config(_) => EXIT_CONFIG,
            _ => 1,
        }
    }
}
