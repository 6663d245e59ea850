//! Task definition mutator
//!
//! Fetches the latest revision of a task definition and renders a copy with
//! one container's image replaced. Rendering never talks to the platform.

use ferry_core::domain::image::ImageRef;
use ferry_core::domain::task_definition::TaskDefinition;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{FerryError, Result};
use crate::repository::{Credentials, OrchestrationPlatform};

pub struct TaskDefinitionMutator {
    platform: Arc<dyn OrchestrationPlatform>,
}

impl TaskDefinitionMutator {
    pub fn new(platform: Arc<dyn OrchestrationPlatform>) -> Self {
        Self { platform }
    }

    /// Fetches the latest registered revision of a family
    pub async fn fetch(&self, credentials: &Credentials, family: &str) -> Result<TaskDefinition> {
        let document = self
            .platform
            .describe_task_definition(credentials, family)
            .await
            .map_err(FerryError::fetch_task_definition)?;

        info!(
            "Fetched task definition {} revision {}",
            document.family(),
            document
                .revision()
                .map_or_else(|| "?".to_string(), |r| r.to_string())
        );
        Ok(document)
    }

    /// Renders a copy of `source` with `container` running `image`
    pub fn render(
        &self,
        source: &TaskDefinition,
        container: &str,
        image: &ImageRef,
    ) -> Result<TaskDefinition> {
        let rendered = source.with_container_image(container, image)?;
        info!("Rendered container {} with image {}", container, image);
        Ok(rendered)
    }

    /// Writes a rendered document as pretty JSON
    pub async fn write(&self, rendered: &TaskDefinition, path: &Path) -> Result<()> {
        tokio::fs::write(path, rendered.to_pretty_json())
            .await
            .map_err(|e| FerryError::io(path, e))?;

        info!("Wrote rendered task definition to {}", path.display());
        Ok(())
    }
}
