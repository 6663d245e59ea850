//! Image publisher
//!
//! Builds the workspace into an image tagged with the triggering commit and
//! pushes it to the registry.

use ferry_core::domain::image::{CommitSha, ImageRef};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::repository::ContainerRegistry;

pub struct ImagePublisher {
    registry: Arc<dyn ContainerRegistry>,
    repository: String,
}

impl ImagePublisher {
    /// # Arguments
    /// * `registry` - Registry the image is pushed to
    /// * `repository` - Repository path inside the registry
    pub fn new(registry: Arc<dyn ContainerRegistry>, repository: impl Into<String>) -> Self {
        Self {
            registry,
            repository: repository.into(),
        }
    }

    /// Coordinate the image for a commit is published at
    pub fn image_for(&self, registry_host: &str, commit: &CommitSha) -> ImageRef {
        ImageRef::new(registry_host, &self.repository, commit.clone())
    }

    /// Builds and pushes the image for a commit
    ///
    /// # Returns
    /// The coordinate the image can be pulled from
    pub async fn publish(
        &self,
        registry_host: &str,
        context: &Path,
        commit: &CommitSha,
    ) -> Result<ImageRef> {
        let image = self.image_for(registry_host, commit);

        info!("Publishing {}", image);
        self.registry.build(context, &image).await?;
        self.registry.push(&image).await?;

        Ok(image)
    }
}
