//! Run domain types
//!
//! A run moves through a fixed linear sequence of states. Any stage failure
//! moves it straight to `Failed`, which is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::image::ImageRef;
use super::log::LogEntry;
use super::task_definition::TaskDefinitionRevision;
use super::trigger::Trigger;
use crate::error::{Error, Result};

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Checkout,
    ProvisionRuntime,
    InstallDependencies,
    Test,
    AcquireCredentials,
    RegistryLogin,
    Publish,
    FetchTaskDefinition,
    RenderTaskDefinition,
    RegisterTaskDefinition,
    UpdateService,
    AwaitStability,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Checkout,
        Stage::ProvisionRuntime,
        Stage::InstallDependencies,
        Stage::Test,
        Stage::AcquireCredentials,
        Stage::RegistryLogin,
        Stage::Publish,
        Stage::FetchTaskDefinition,
        Stage::RenderTaskDefinition,
        Stage::RegisterTaskDefinition,
        Stage::UpdateService,
        Stage::AwaitStability,
    ];

    /// State reached once this stage succeeds, if it advances the run
    pub fn reaches(self) -> Option<RunState> {
        match self {
            Stage::Checkout => Some(RunState::CheckedOut),
            Stage::Test => Some(RunState::Tested),
            Stage::RegistryLogin => Some(RunState::Authenticated),
            Stage::Publish => Some(RunState::Published),
            Stage::RenderTaskDefinition => Some(RunState::Rendered),
            Stage::UpdateService => Some(RunState::Deployed),
            Stage::AwaitStability => Some(RunState::Stable),
            Stage::ProvisionRuntime
            | Stage::InstallDependencies
            | Stage::AcquireCredentials
            | Stage::FetchTaskDefinition
            | Stage::RegisterTaskDefinition => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Checkout => "checkout",
            Stage::ProvisionRuntime => "provision runtime",
            Stage::InstallDependencies => "install dependencies",
            Stage::Test => "test",
            Stage::AcquireCredentials => "acquire credentials",
            Stage::RegistryLogin => "registry login",
            Stage::Publish => "build & publish image",
            Stage::FetchTaskDefinition => "fetch task definition",
            Stage::RenderTaskDefinition => "render task definition",
            Stage::RegisterTaskDefinition => "register task definition",
            Stage::UpdateService => "update service",
            Stage::AwaitStability => "await stability",
        };
        f.write_str(label)
    }
}

/// Overall state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunState {
    Triggered,
    CheckedOut,
    Tested,
    Authenticated,
    Published,
    Rendered,
    Deployed,
    Stable,
    /// Push landed on a branch that is not tracked
    Ignored,
    Failed(Stage),
}

impl RunState {
    /// Position in the success path, `None` for terminal side states
    fn ordinal(self) -> Option<u8> {
        match self {
            RunState::Triggered => Some(0),
            RunState::CheckedOut => Some(1),
            RunState::Tested => Some(2),
            RunState::Authenticated => Some(3),
            RunState::Published => Some(4),
            RunState::Rendered => Some(5),
            RunState::Deployed => Some(6),
            RunState::Stable => Some(7),
            RunState::Ignored | RunState::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Stable | RunState::Ignored | RunState::Failed(_)
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, RunState::Stable | RunState::Ignored)
    }

    /// Validates and performs a transition
    ///
    /// Allowed: one step forward on the success path, `Triggered → Ignored`,
    /// and any non-terminal state to `Failed`.
    pub fn transition(self, next: RunState) -> Result<RunState> {
        let allowed = match (self, next) {
            (from, _) if from.is_terminal() => false,
            (RunState::Triggered, RunState::Ignored) => true,
            (_, RunState::Failed(_)) => true,
            (from, to) => match (from.ordinal(), to.ordinal()) {
                (Some(a), Some(b)) => b == a + 1,
                _ => false,
            },
        };

        if allowed {
            Ok(next)
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Triggered => f.write_str("triggered"),
            RunState::CheckedOut => f.write_str("checked-out"),
            RunState::Tested => f.write_str("tested"),
            RunState::Authenticated => f.write_str("authenticated"),
            RunState::Published => f.write_str("published"),
            RunState::Rendered => f.write_str("rendered"),
            RunState::Deployed => f.write_str("deployed"),
            RunState::Stable => f.write_str("stable"),
            RunState::Ignored => f.write_str("ignored"),
            RunState::Failed(stage) => write!(f, "failed at {}", stage),
        }
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Failed { error: String },
    Skipped,
}

/// Record of a single stage within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StageReport {
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            outcome: StageOutcome::Skipped,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
            _ => None,
        }
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub state: RunState,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub stages: Vec<StageReport>,
    /// Image pushed by this run, if publishing succeeded
    pub image: Option<ImageRef>,
    /// Revision registered by this run, kept even when the rollout later fails
    pub revision: Option<TaskDefinitionRevision>,
    /// Process exit code the run maps to (0 on success)
    pub exit_code: i32,
    pub logs: Vec<LogEntry>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state.is_success()
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self.state {
            RunState::Failed(stage) => Some(stage),
            _ => None,
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }
}
