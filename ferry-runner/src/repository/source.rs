//! Source checkout
//!
//! Brings the workspace to the triggering commit using git.

use async_trait::async_trait;
use ferry_core::domain::trigger::Trigger;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::{FerryError, Result};
use crate::process::{CommandSpec, ProcessRunner};

/// Repository trait for the source checkout
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Checks out the triggering commit
    ///
    /// Succeeds only when HEAD ends up at `trigger.commit`.
    async fn checkout(&self, trigger: &Trigger) -> Result<()>;
}

/// Git implementation of SourceRepository
pub struct GitSource {
    runner: Arc<dyn ProcessRunner>,
    workspace: PathBuf,
    remote: String,
}

impl GitSource {
    /// Creates a git source for an existing clone
    ///
    /// # Arguments
    /// * `runner` - Process runner used to invoke git
    /// * `workspace` - Path of the clone
    pub fn new(runner: Arc<dyn ProcessRunner>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            workspace: workspace.into(),
            remote: "origin".to_string(),
        }
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git").args(args).cwd(&self.workspace)
    }

    /// Returns the full hash HEAD resolved to
    async fn checkout_inner(&self, trigger: &Trigger) -> Result<String> {
        let branch = trigger
            .branch
            .strip_prefix("refs/heads/")
            .unwrap_or(&trigger.branch);

        self.runner
            .run_checked(&self.git(["fetch", "--no-tags", self.remote.as_str(), branch]))
            .await?;

        self.runner
            .run_checked(&self.git([
                "checkout",
                "--force",
                "--detach",
                trigger.commit.as_str(),
            ]))
            .await?;

        let spec = self.git(["rev-parse", "HEAD"]);
        let output = self.runner.run_checked(&spec).await?;
        let head = output.stdout.trim();

        if !head.starts_with(trigger.commit.as_str()) {
            return Err(FerryError::Parse {
                command: spec.command_line(),
                message: format!(
                    "HEAD is {} after checking out {}",
                    head, trigger.commit
                ),
            });
        }

        Ok(head.to_string())
    }
}

#[async_trait]
impl SourceRepository for GitSource {
    async fn checkout(&self, trigger: &Trigger) -> Result<()> {
        let head = self
            .checkout_inner(trigger)
            .await
            .map_err(FerryError::checkout)?;

        info!("Checked out {} at {} ({})", trigger.commit, head, trigger.branch);
        Ok(())
    }
}
