//! Service status domain types
//!
//! Field names follow the platform's camelCase JSON so a described service can
//! be deserialized directly.

use serde::{Deserialize, Serialize};

/// Snapshot of a running service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub desired_count: u32,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub task_definition: Option<String>,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

/// One deployment of a service (PRIMARY, ACTIVE or INACTIVE)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub task_definition: String,
    #[serde(default)]
    pub desired_count: u32,
    #[serde(default)]
    pub running_count: u32,
    #[serde(default)]
    pub pending_count: u32,
    #[serde(default)]
    pub rollout_state: Option<String>,
    #[serde(default)]
    pub rollout_state_reason: Option<String>,
}

impl ServiceStatus {
    /// Whether the platform reports steady state
    ///
    /// Steady means a single deployment whose rollout is not in flight, with
    /// every desired task running and none pending.
    pub fn is_steady(&self) -> bool {
        let [deployment] = self.deployments.as_slice() else {
            return false;
        };

        let rollout_settled = !matches!(
            deployment.rollout_state.as_deref(),
            Some("IN_PROGRESS") | Some("FAILED")
        );

        rollout_settled
            && self.running_count == self.desired_count
            && self.pending_count == 0
    }

    /// The deployment currently receiving new tasks
    pub fn primary(&self) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.status == "PRIMARY")
    }

    /// One-line description for logs and timeout errors
    pub fn summary(&self) -> String {
        format!(
            "{}/{} running, {} pending, {} deployment(s)",
            self.running_count,
            self.desired_count,
            self.pending_count,
            self.deployments.len()
        )
    }
}
