//! Pipeline configuration
//!
//! The fixed set of named resources a run targets. Values are resolved once at
//! trigger time and stay constant for the whole run.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Branch tracked when none is configured
pub const DEFAULT_BRANCH: &str = "main";

/// Named resources targeted by a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cloud region (e.g., "ap-south-1")
    pub region: String,

    /// Registry repository the image is pushed to (e.g., "dev/data-query-api")
    pub repository: String,

    /// Container entry in the task definition whose image is rewritten
    pub container_name: String,

    /// Task definition family fetched and re-registered
    pub task_definition: String,

    /// Service rolled out to the new revision
    pub service: String,

    /// Cluster hosting the service
    pub cluster: String,

    /// Only pushes to this branch start a run
    pub branch: String,
}

impl PipelineConfig {
    /// Checks that every setting is present
    pub fn validate(&self) -> Result<()> {
        let settings = [
            ("region", &self.region),
            ("repository", &self.repository),
            ("container_name", &self.container_name),
            ("task_definition", &self.task_definition),
            ("service", &self.service),
            ("cluster", &self.cluster),
            ("branch", &self.branch),
        ];

        for (name, value) in settings {
            if value.trim().is_empty() {
                return Err(Error::EmptySetting(name));
            }
        }

        Ok(())
    }
}
