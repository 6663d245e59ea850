//! Rollout controller
//!
//! Registers a rendered task definition, points the service at it and waits
//! for the platform to report steady state. Nothing is rolled back: a failure
//! after registration leaves the new revision in place.

use ferry_core::domain::service::ServiceStatus;
use ferry_core::domain::task_definition::{TaskDefinition, TaskDefinitionRevision};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{FerryError, Result};
use crate::repository::{Credentials, OrchestrationPlatform};

pub struct RolloutController {
    platform: Arc<dyn OrchestrationPlatform>,
    poll_interval: Duration,
    timeout: Duration,
}

impl RolloutController {
    /// # Arguments
    /// * `platform` - Orchestration platform hosting the service
    /// * `poll_interval` - Delay between status checks while waiting
    /// * `timeout` - Maximum total wait for steady state
    pub fn new(
        platform: Arc<dyn OrchestrationPlatform>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            platform,
            poll_interval,
            timeout,
        }
    }

    /// Registers `rendered` as a new revision
    pub async fn register(
        &self,
        credentials: &Credentials,
        rendered: &TaskDefinition,
    ) -> Result<TaskDefinitionRevision> {
        self.platform
            .register_task_definition(credentials, &rendered.registration_input())
            .await
            .map_err(FerryError::rollout)
    }

    /// Points the service at `revision`
    pub async fn update(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
        revision: &TaskDefinitionRevision,
    ) -> Result<()> {
        self.platform
            .update_service(credentials, cluster, service, revision)
            .await
            .map_err(FerryError::rollout)
    }

    /// Polls until the service is steady
    ///
    /// When `revision` is given the primary deployment must also be running
    /// it, so a service that is steady on the previous revision does not end
    /// the wait early. A deployment the platform marks failed ends the wait
    /// immediately.
    pub async fn await_stability(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
        revision: Option<&TaskDefinitionRevision>,
    ) -> Result<ServiceStatus> {
        let started = Instant::now();
        info!(
            "Waiting up to {:?} for service {} to reach steady state",
            self.timeout, service
        );

        loop {
            let status = self
                .platform
                .describe_service(credentials, cluster, service)
                .await
                .map_err(FerryError::rollout)?;

            let primary = status.primary();

            let failed = primary.filter(|d| d.rollout_state.as_deref() == Some("FAILED"));
            if let Some(deployment) = failed {
                return Err(FerryError::DeploymentFailed {
                    service: service.to_string(),
                    revision: deployment.task_definition.clone(),
                    reason: deployment
                        .rollout_state_reason
                        .clone()
                        .unwrap_or_else(|| "rollout failed".to_string()),
                });
            }

            let on_revision = match revision {
                Some(expected) => {
                    primary.is_some_and(|d| d.task_definition == expected.task_definition_arn)
                }
                None => true,
            };

            if on_revision && status.is_steady() {
                info!("Service {} is stable: {}", service, status.summary());
                return Ok(status);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Err(FerryError::StabilityTimeout {
                    service: service.to_string(),
                    cluster: cluster.to_string(),
                    waited: elapsed,
                    last_seen: status.summary(),
                });
            }

            debug!("Service {} not yet stable: {}", service, status.summary());
            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }
}
