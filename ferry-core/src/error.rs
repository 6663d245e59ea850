//! Error types for domain validation and task definition handling

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by domain types
#[derive(Debug, Error)]
pub enum Error {
    /// A commit identifier that cannot be used as an image tag
    #[error("Invalid commit identifier '{0}': must match [A-Za-z0-9_][A-Za-z0-9_.-]{{0,127}}")]
    InvalidCommit(String),

    /// An image reference that does not have the registry/repository:tag shape
    #[error("Invalid image reference '{0}'")]
    InvalidImageRef(String),

    /// A required pipeline setting is missing or empty
    #[error("Configuration value '{0}' cannot be empty")]
    EmptySetting(&'static str),

    /// Task definition document does not have the expected shape
    #[error("Malformed task definition: {0}")]
    MalformedTaskDefinition(String),

    /// Named container has no entry in the task definition
    #[error("Container '{container}' not found in task definition '{family}'")]
    ContainerNotFound { container: String, family: String },

    /// Named container has more than one entry in the task definition
    #[error("Container '{container}' appears {count} times in task definition '{family}'")]
    AmbiguousContainer {
        container: String,
        family: String,
        count: usize,
    },

    /// A run state transition outside the pipeline's linear order
    #[error("Invalid run state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
