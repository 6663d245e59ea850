//! Test gate
//!
//! Provisions the runtime, installs dependencies and runs the suite. Nothing
//! past this gate runs unless the whole suite passes.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::repository::Toolchain;
use crate::secrets::Secrets;

pub struct TestGate {
    toolchain: Arc<dyn Toolchain>,
}

impl TestGate {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self { toolchain }
    }

    pub async fn provision(&self) -> Result<String> {
        self.toolchain.provision_runtime().await
    }

    pub async fn install(&self) -> Result<()> {
        self.toolchain.install_dependencies().await
    }

    /// Runs the suite against the database from the secrets
    ///
    /// Fails before starting the suite when no database endpoint is set.
    pub async fn run(&self, secrets: &Secrets) -> Result<()> {
        let database_url = secrets.database_url()?;

        info!("Running test suite");
        self.toolchain.run_tests(database_url).await
    }
}
