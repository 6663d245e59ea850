//! Container registry and image builds
//!
//! Logs the container build tool into the registry, builds images from the
//! workspace and pushes them.

use async_trait::async_trait;
use ferry_core::domain::image::ImageRef;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::credentials::Credentials;
use crate::error::{FerryError, Result};
use crate::process::{CommandSpec, ProcessRunner};

/// Repository trait for the container registry
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Grants the build tool push rights
    ///
    /// # Returns
    /// The registry host images are pushed to
    async fn login(&self, credentials: &Credentials) -> Result<String>;

    /// Builds an image from a build context
    async fn build(&self, context: &Path, image: &ImageRef) -> Result<()>;

    /// Pushes a built image
    async fn push(&self, image: &ImageRef) -> Result<()>;
}

/// ECR implementation of ContainerRegistry, building with docker
pub struct EcrRegistry {
    runner: Arc<dyn ProcessRunner>,
    registry_override: Option<String>,
    dockerfile: Option<PathBuf>,
}

impl EcrRegistry {
    /// Creates an ECR registry client
    ///
    /// # Arguments
    /// * `runner` - Process runner used to invoke aws and docker
    /// * `registry_override` - Registry host to use instead of the account's default
    /// * `dockerfile` - Dockerfile path relative to the build context
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        registry_override: Option<String>,
        dockerfile: Option<PathBuf>,
    ) -> Self {
        Self {
            runner,
            registry_override,
            dockerfile,
        }
    }

    /// Default private registry host of an account
    pub fn default_host(account: &str, region: &str) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", account, region)
    }

    async fn login_inner(&self, credentials: &Credentials) -> Result<String> {
        let host = self
            .registry_override
            .clone()
            .unwrap_or_else(|| Self::default_host(credentials.account(), &credentials.region));

        let password_spec = CommandSpec::new("aws")
            .args([
                "ecr",
                "get-login-password",
                "--region",
                credentials.region.as_str(),
            ])
            .envs(credentials.env())
            .sensitive_output();
        let password = self.runner.run_checked(&password_spec).await?;

        let login_spec = CommandSpec::new("docker")
            .args(["login", "--username", "AWS", "--password-stdin", host.as_str()])
            .stdin(password.stdout.trim().to_string());
        self.runner.run_checked(&login_spec).await?;

        Ok(host)
    }
}

#[async_trait]
impl ContainerRegistry for EcrRegistry {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        let host = self
            .login_inner(credentials)
            .await
            .map_err(FerryError::authentication)?;

        info!("Logged in to registry {}", host);
        Ok(host)
    }

    async fn build(&self, context: &Path, image: &ImageRef) -> Result<()> {
        let mut spec = CommandSpec::new("docker")
            .args(["build", "--tag"])
            .arg(image.to_string());

        if let Some(dockerfile) = &self.dockerfile {
            spec = spec
                .arg("--file")
                .arg(context.join(dockerfile).display().to_string());
        }

        spec = spec.arg(context.display().to_string());

        self.runner
            .run_checked(&spec)
            .await
            .map_err(FerryError::publish)?;

        info!("Built image {}", image);
        Ok(())
    }

    async fn push(&self, image: &ImageRef) -> Result<()> {
        let spec = CommandSpec::new("docker")
            .arg("push")
            .arg(image.to_string());

        self.runner
            .run_checked(&spec)
            .await
            .map_err(FerryError::publish)?;

        info!("Pushed image {}", image);
        Ok(())
    }
}
