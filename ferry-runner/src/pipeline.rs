//! Pipeline executor
//!
//! Drives one run through every stage in order:
//! - Checkout, runtime provisioning, dependency install and the test gate
//! - Credential acquisition and registry login
//! - Image build and push
//! - Task definition fetch, render, registration and service update
//! - The stability wait
//!
//! The first failing stage ends the run; every later stage is reported as
//! skipped. The executor never returns an error: the outcome, including the
//! exit code, is carried by the `RunReport`.

use chrono::Utc;
use ferry_core::domain::image::ImageRef;
use ferry_core::domain::run::{RunReport, RunState, Stage, StageOutcome, StageReport};
use ferry_core::domain::service::ServiceStatus;
use ferry_core::domain::task_definition::{TaskDefinition, TaskDefinitionRevision};
use ferry_core::domain::trigger::Trigger;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{FerryError, Result};
use crate::process::ProcessRunner;
use crate::repository::{
    ContainerRegistry, CredentialBroker, Credentials, EcrRegistry, EcsPlatform, GitSource,
    OrchestrationPlatform, PythonToolchain, SourceRepository, StsCredentialBroker, Toolchain,
};
use crate::secrets::Secrets;
use crate::service::{
    ImagePublisher, LogBufferService, RolloutController, TaskDefinitionMutator, TestGate,
};

/// The external systems a run talks to
#[derive(Clone)]
pub struct Toolset {
    pub source: Arc<dyn SourceRepository>,
    pub toolchain: Arc<dyn Toolchain>,
    pub credentials: Arc<dyn CredentialBroker>,
    pub registry: Arc<dyn ContainerRegistry>,
    pub platform: Arc<dyn OrchestrationPlatform>,
}

impl Toolset {
    /// Command-line backed tools: git, python, docker and aws
    pub fn system(config: &Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            source: Arc::new(GitSource::new(runner.clone(), config.workspace.clone())),
            toolchain: Arc::new(PythonToolchain::new(runner.clone(), config)),
            credentials: Arc::new(StsCredentialBroker::new(runner.clone())),
            registry: Arc::new(EcrRegistry::new(
                runner.clone(),
                config.registry.clone(),
                config.dockerfile.clone(),
            )),
            platform: Arc::new(EcsPlatform::new(runner)),
        }
    }
}

pub struct Pipeline {
    config: Config,
    tools: Toolset,
    log_buffer: Arc<dyn LogBufferService>,
}

impl Pipeline {
    /// # Arguments
    /// * `config` - Validated runner configuration
    /// * `tools` - External systems the stages run against
    /// * `log_buffer` - Run log, drained into the report when the run ends
    pub fn new(config: Config, tools: Toolset, log_buffer: Arc<dyn LogBufferService>) -> Self {
        Self {
            config,
            tools,
            log_buffer,
        }
    }

    /// Runs the whole pipeline for one trigger
    pub async fn run(&self, trigger: Trigger, secrets: &Secrets) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let tracked = &self.config.pipeline.branch;

        let mut recorder = RunRecorder::new(self.log_buffer.clone());

        if trigger.is_tracked(tracked) {
            info!(
                "Run {} started for {} on branch {}",
                run_id, trigger.commit, trigger.branch
            );
            self.log_buffer.log_info(format!(
                "Deploying commit {} from branch {}",
                trigger.commit, trigger.branch
            ));

            if let Err(e) = self.execute(&trigger, secrets, &mut recorder).await {
                error!("Run {} failed: {}", run_id, e);
                recorder.exit_code = e.exit_code();
            }
        } else {
            info!(
                "Ignoring push to branch {} (tracking {})",
                trigger.branch, tracked
            );
            self.log_buffer.log_info(format!(
                "Branch {} is not tracked, nothing to do",
                trigger.branch
            ));
            recorder.advance(RunState::Ignored);
        }

        let finished = recorder.finish();
        let report = RunReport {
            run_id,
            trigger,
            state: finished.state,
            started_at,
            finished_at: Utc::now(),
            stages: finished.stages,
            image: finished.image,
            revision: finished.revision,
            exit_code: finished.exit_code,
            logs: self.log_buffer.drain(),
        };

        info!("Run {} finished: {}", report.run_id, report.state);
        report
    }

    async fn execute(
        &self,
        trigger: &Trigger,
        secrets: &Secrets,
        recorder: &mut RunRecorder,
    ) -> Result<()> {
        let pipeline = &self.config.pipeline;

        recorder
            .stage(Stage::Checkout, self.tools.source.checkout(trigger))
            .await?;
        let commit = &trigger.commit;

        let gate = TestGate::new(self.tools.toolchain.clone());
        let version = recorder
            .stage(Stage::ProvisionRuntime, gate.provision())
            .await?;
        self.log_buffer
            .log_info(format!("Using interpreter {}", version));
        recorder
            .stage(Stage::InstallDependencies, gate.install())
            .await?;
        recorder.stage(Stage::Test, gate.run(secrets)).await?;

        let credentials = recorder
            .stage(
                Stage::AcquireCredentials,
                self.tools.credentials.acquire(&pipeline.region, secrets),
            )
            .await?;
        let host = recorder
            .stage(Stage::RegistryLogin, self.tools.registry.login(&credentials))
            .await?;

        let publisher = ImagePublisher::new(self.tools.registry.clone(), &pipeline.repository);
        let image = recorder
            .stage(
                Stage::Publish,
                publisher.publish(&host, &self.config.workspace, commit),
            )
            .await?;
        recorder.image = Some(image.clone());

        let mutator = TaskDefinitionMutator::new(self.tools.platform.clone());
        let source = recorder
            .stage(
                Stage::FetchTaskDefinition,
                mutator.fetch(&credentials, &pipeline.task_definition),
            )
            .await?;
        let rendered = recorder
            .stage(
                Stage::RenderTaskDefinition,
                self.render_with(&mutator, &source, &image),
            )
            .await?;

        let rollout = self.rollout();
        let revision = recorder
            .stage(
                Stage::RegisterTaskDefinition,
                rollout.register(&credentials, &rendered),
            )
            .await?;
        recorder.revision = Some(revision.clone());

        recorder
            .stage(
                Stage::UpdateService,
                rollout.update(&credentials, &pipeline.cluster, &pipeline.service, &revision),
            )
            .await?;
        recorder
            .stage(
                Stage::AwaitStability,
                rollout.await_stability(
                    &credentials,
                    &pipeline.cluster,
                    &pipeline.service,
                    Some(&revision),
                ),
            )
            .await?;

        Ok(())
    }

    async fn render_with(
        &self,
        mutator: &TaskDefinitionMutator,
        source: &TaskDefinition,
        image: &ImageRef,
    ) -> Result<TaskDefinition> {
        let rendered = mutator.render(source, &self.config.pipeline.container_name, image)?;
        if let Some(path) = &self.config.render_output {
            mutator.write(&rendered, path).await?;
        }
        Ok(rendered)
    }

    fn rollout(&self) -> RolloutController {
        RolloutController::new(
            self.tools.platform.clone(),
            self.config.stability_poll_interval,
            self.config.stability_timeout,
        )
    }

    async fn credentials(&self, secrets: &Secrets) -> Result<Credentials> {
        self.tools
            .credentials
            .acquire(&self.config.pipeline.region, secrets)
            .await
    }

    /// Fetches the configured task definition and renders it for `image`
    ///
    /// Only reads from the platform. The rendered document is written to the
    /// configured output path, if any.
    pub async fn render(&self, secrets: &Secrets, image: &ImageRef) -> Result<TaskDefinition> {
        let credentials = self.credentials(secrets).await?;
        let mutator = TaskDefinitionMutator::new(self.tools.platform.clone());

        let source = mutator
            .fetch(&credentials, &self.config.pipeline.task_definition)
            .await?;
        self.render_with(&mutator, &source, image).await
    }

    /// Registers an already rendered document and rolls the service onto it
    ///
    /// # Returns
    /// The registered revision, and the final service status when `wait` is set
    pub async fn deploy(
        &self,
        secrets: &Secrets,
        rendered: &TaskDefinition,
        wait: bool,
    ) -> Result<(TaskDefinitionRevision, Option<ServiceStatus>)> {
        let pipeline = &self.config.pipeline;
        let credentials = self.credentials(secrets).await?;
        let rollout = self.rollout();

        let revision = rollout.register(&credentials, rendered).await?;
        rollout
            .update(&credentials, &pipeline.cluster, &pipeline.service, &revision)
            .await?;

        if !wait {
            return Ok((revision, None));
        }

        let status = rollout
            .await_stability(
                &credentials,
                &pipeline.cluster,
                &pipeline.service,
                Some(&revision),
            )
            .await?;
        Ok((revision, Some(status)))
    }

    /// Current status of the configured service
    pub async fn status(&self, secrets: &Secrets) -> Result<ServiceStatus> {
        let pipeline = &self.config.pipeline;
        let credentials = self.credentials(secrets).await?;

        self.tools
            .platform
            .describe_service(&credentials, &pipeline.cluster, &pipeline.service)
            .await
            .map_err(FerryError::rollout)
    }
}

/// Result of a finished recording
struct Recorded {
    state: RunState,
    stages: Vec<StageReport>,
    image: Option<ImageRef>,
    revision: Option<TaskDefinitionRevision>,
    exit_code: i32,
}

/// Tracks run state and stage reports while stages execute
struct RunRecorder {
    log_buffer: Arc<dyn LogBufferService>,
    state: RunState,
    stages: Vec<StageReport>,
    image: Option<ImageRef>,
    revision: Option<TaskDefinitionRevision>,
    exit_code: i32,
}

impl RunRecorder {
    fn new(log_buffer: Arc<dyn LogBufferService>) -> Self {
        Self {
            log_buffer,
            state: RunState::Triggered,
            stages: Vec::with_capacity(Stage::ALL.len()),
            image: None,
            revision: None,
            exit_code: 0,
        }
    }

    /// Runs one stage, recording its outcome and the state it reaches
    async fn stage<T, F>(&mut self, stage: Stage, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let position = self.stages.len() + 1;
        info!("Stage {}/{}: {}", position, Stage::ALL.len(), stage);
        self.log_buffer
            .log_info(format!("Starting stage: {}", stage));

        let started_at = Utc::now();
        let result = work.await;
        let finished_at = Utc::now();

        let outcome = match &result {
            Ok(_) => {
                self.log_buffer
                    .log_info(format!("Stage '{}' completed", stage));
                if let Some(next) = stage.reaches() {
                    self.advance(next);
                }
                StageOutcome::Succeeded
            }
            Err(e) => {
                error!("Stage '{}' failed: {}", stage, e);
                self.log_buffer
                    .log_error(format!("Stage '{}' failed: {}", stage, e));
                self.advance(RunState::Failed(stage));
                StageOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.stages.push(StageReport {
            stage,
            outcome,
            started_at: Some(started_at),
            finished_at: Some(finished_at),
        });
        result
    }

    fn advance(&mut self, next: RunState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => warn!("Ignoring state change: {}", e),
        }
    }

    /// Fills in skipped stages
    ///
    /// An ignored run reports no stages at all.
    fn finish(mut self) -> Recorded {
        if self.state != RunState::Ignored {
            for stage in Stage::ALL.into_iter().skip(self.stages.len()) {
                self.stages.push(StageReport::skipped(stage));
            }
        }

        Recorded {
            state: self.state,
            stages: self.stages,
            image: self.image,
            revision: self.revision,
            exit_code: self.exit_code,
        }
    }
}
