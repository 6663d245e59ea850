//! Repository layer
//!
//! Repositories wrap the external systems a run talks to: the source
//! checkout, the language toolchain, the credential broker, the container
//! registry and the orchestration platform. They carry no pipeline logic.
//!
//! All repositories are trait-based so the pipeline can run against stubs.
//! The provided implementations drive the real command-line tools through a
//! `ProcessRunner`.

mod credentials;
mod platform;
mod registry;
mod source;
mod toolchain;

// Re-export traits
pub use credentials::CredentialBroker;
pub use platform::OrchestrationPlatform;
pub use registry::ContainerRegistry;
pub use source::SourceRepository;
pub use toolchain::Toolchain;

// Re-export implementations
pub use credentials::{CallerIdentity, Credentials, StsCredentialBroker};
pub use platform::EcsPlatform;
pub use registry::EcrRegistry;
pub use source::GitSource;
pub use toolchain::PythonToolchain;

use crate::error::{FerryError, Result};
use crate::process::{CommandOutput, CommandSpec};
use serde::de::DeserializeOwned;

/// Parses a command's stdout as JSON
fn parse_json<T: DeserializeOwned>(spec: &CommandSpec, output: &CommandOutput) -> Result<T> {
    serde_json::from_str(output.stdout.trim()).map_err(|e| FerryError::Parse {
        command: spec.command_line(),
        message: e.to_string(),
    })
}
