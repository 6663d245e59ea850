//! Language toolchain
//!
//! Provisions the interpreter, installs dependencies into an isolated
//! environment and runs the test suite.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::{FerryError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use crate::secrets::DATABASE_URL;

/// Repository trait for the application toolchain
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Verifies the interpreter matches the pinned version
    ///
    /// # Returns
    /// The full interpreter version
    async fn provision_runtime(&self) -> Result<String>;

    /// Creates the isolated environment and installs the manifest into it
    async fn install_dependencies(&self) -> Result<()>;

    /// Runs the test suite, stopping at the first failure
    ///
    /// # Arguments
    /// * `database_url` - Database endpoint exposed to the tests
    async fn run_tests(&self, database_url: &str) -> Result<()>;
}

/// Python implementation of Toolchain (venv, pip, pytest)
pub struct PythonToolchain {
    runner: Arc<dyn ProcessRunner>,
    workspace: PathBuf,
    python: String,
    pinned_version: String,
    requirements: PathBuf,
    venv: PathBuf,
}

impl PythonToolchain {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &Config) -> Self {
        Self {
            runner,
            workspace: config.workspace.clone(),
            python: config.python.clone(),
            pinned_version: config.python_version.clone(),
            requirements: config.requirements.clone(),
            venv: config.venv_path(),
        }
    }

    fn venv_python(&self) -> String {
        self.venv.join("bin").join("python").display().to_string()
    }

    fn command(&self, program: impl Into<String>) -> CommandSpec {
        CommandSpec::new(program).cwd(&self.workspace)
    }
}

/// Extracts "3.11.4" from "Python 3.11.4"
fn parse_version(output: &str) -> Option<&str> {
    output
        .split_whitespace()
        .skip_while(|word| !word.eq_ignore_ascii_case("python"))
        .nth(1)
}

/// Whether `version` is `pinned` or a patch release of it
fn version_matches(pinned: &str, version: &str) -> bool {
    match version.strip_prefix(pinned) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Last non-empty line of test output, usually the summary
fn summary_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[async_trait]
impl Toolchain for PythonToolchain {
    async fn provision_runtime(&self) -> Result<String> {
        let spec = self.command(&self.python).arg("--version");
        let output = self
            .runner
            .run_checked(&spec)
            .await
            .map_err(FerryError::toolchain)?;

        // Older interpreters print the version on stderr
        let text = format!("{} {}", output.stdout, output.stderr);
        let version = parse_version(&text).ok_or_else(|| {
            FerryError::toolchain(FerryError::Parse {
                command: spec.command_line(),
                message: format!("no version in '{}'", text.trim()),
            })
        })?;

        if !version_matches(&self.pinned_version, version) {
            return Err(FerryError::RuntimeMismatch {
                pinned: self.pinned_version.clone(),
                found: version.to_string(),
            });
        }

        info!("Using Python {}", version);
        Ok(version.to_string())
    }

    async fn install_dependencies(&self) -> Result<()> {
        let manifest = self.workspace.join(&self.requirements);
        if !manifest.is_file() {
            return Err(FerryError::toolchain(FerryError::io(
                &manifest,
                std::io::Error::new(std::io::ErrorKind::NotFound, "requirements manifest not found"),
            )));
        }

        let venv = self.venv.display().to_string();
        let venv_python = self.venv_python();

        let steps = [
            self.command(&self.python).args(["-m", "venv", venv.as_str()]),
            self.command(&venv_python)
                .args(["-m", "pip", "install", "--upgrade", "pip"]),
            self.command(&venv_python).args([
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                "-r".to_string(),
                self.requirements.display().to_string(),
            ]),
        ];

        for step in &steps {
            self.runner
                .run_checked(step)
                .await
                .map_err(FerryError::toolchain)?;
        }

        info!("Installed dependencies from {}", self.requirements.display());
        Ok(())
    }

    async fn run_tests(&self, database_url: &str) -> Result<()> {
        let spec = self
            .command(self.venv_python())
            .args(["-m", "pytest", "-x"])
            .env(DATABASE_URL, database_url);

        let output = self.runner.run(&spec).await?;

        if !output.success() {
            return Err(FerryError::TestsFailed {
                exit_code: output.exit_code,
                summary: summary_line(&output.stdout),
            });
        }

        info!("Test suite passed: {}", summary_line(&output.stdout));
        Ok(())
    }
}
