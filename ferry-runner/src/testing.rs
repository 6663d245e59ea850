//! Test doubles shared by the unit tests
//!
//! `ScriptedProcessRunner` stands in for real tools when testing the CLI
//! adapters. `FakeCloud` implements every repository trait and records each
//! call, so pipeline tests can assert on what reached the outside world.

use async_trait::async_trait;
use ferry_core::config::PipelineConfig;
use ferry_core::domain::image::ImageRef;
use ferry_core::domain::service::{Deployment, ServiceStatus};
use ferry_core::domain::task_definition::{TaskDefinition, TaskDefinitionRevision};
use ferry_core::domain::trigger::Trigger;
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Config;
use crate::error::{FerryError, Result};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};
use crate::repository::{
    CallerIdentity, ContainerRegistry, CredentialBroker, Credentials, OrchestrationPlatform,
    SourceRepository, Toolchain,
};
use crate::secrets::Secrets;

pub const REGISTRY: &str = "123456789012.dkr.ecr.ap-south-1.amazonaws.com";
pub const OLD_ARN: &str =
    "arn:aws:ecs:ap-south-1:123456789012:task-definition/data-query-api-task:7";
pub const NEW_ARN: &str =
    "arn:aws:ecs:ap-south-1:123456789012:task-definition/data-query-api-task:8";

pub fn sample_pipeline() -> PipelineConfig {
    PipelineConfig {
        region: "ap-south-1".to_string(),
        repository: "dev/data-query-api".to_string(),
        container_name: "data-query-api-container".to_string(),
        task_definition: "data-query-api-task".to_string(),
        service: "data-query-api-service".to_string(),
        cluster: "fractual-assessment-api".to_string(),
        branch: "main".to_string(),
    }
}

pub fn sample_config() -> Config {
    let mut config = Config::new(sample_pipeline());
    config.workspace = "/work".into();
    config.stability_poll_interval = Duration::from_millis(1);
    config.stability_timeout = Duration::from_millis(100);
    config
}

pub fn sample_secrets() -> Secrets {
    Secrets {
        database_url: Some("postgresql://ci:ci@localhost:5432/taxi_test".to_string()),
        access_key_id: Some("AKIATEST".to_string()),
        secret_access_key: Some("secret".to_string()),
        session_token: None,
    }
}

pub fn sample_credentials() -> Credentials {
    Credentials::new(
        "ap-south-1",
        "AKIATEST",
        "secret",
        None,
        CallerIdentity {
            account: "123456789012".to_string(),
            arn: "arn:aws:iam::123456789012:user/ci".to_string(),
            user_id: "AIDATEST".to_string(),
        },
    )
}

pub fn sample_task_definition() -> Value {
    json!({
        "taskDefinitionArn": OLD_ARN,
        "containerDefinitions": [
            {
                "name": "data-query-api-container",
                "image": format!("{}/dev/data-query-api:previous", REGISTRY),
                "portMappings": [{ "containerPort": 5000, "hostPort": 5000, "protocol": "tcp" }],
                "essential": true,
                "secrets": [{ "name": "DATABASE_URL", "valueFrom": "arn:aws:ssm:ap-south-1:123456789012:parameter/db" }]
            },
            {
                "name": "log-router",
                "image": "public.ecr.aws/aws-observability/aws-for-fluent-bit:stable",
                "essential": false
            }
        ],
        "family": "data-query-api-task",
        "executionRoleArn": "arn:aws:iam::123456789012:role/ecsTaskExecutionRole",
        "networkMode": "awsvpc",
        "revision": 7,
        "status": "ACTIVE",
        "requiresAttributes": [{ "name": "com.amazonaws.ecs.capability.ecr-auth" }],
        "compatibilities": ["EC2", "FARGATE"],
        "requiresCompatibilities": ["FARGATE"],
        "cpu": "256",
        "memory": "512",
        "registeredAt": "2024-06-01T10:00:00.000Z",
        "registeredBy": "arn:aws:iam::123456789012:user/ci"
    })
}

/// Service status with the primary deployment on `arn`
///
/// With one deployment the counts are settled; with more, a replacement is
/// still in flight.
pub fn status_on(arn: &str, deployments: usize) -> ServiceStatus {
    let settled = deployments == 1;
    let mut list = vec![Deployment {
        id: "ecs-svc/primary".to_string(),
        status: "PRIMARY".to_string(),
        task_definition: arn.to_string(),
        desired_count: 1,
        running_count: if settled { 1 } else { 0 },
        pending_count: if settled { 0 } else { 1 },
        rollout_state: Some(if settled { "COMPLETED" } else { "IN_PROGRESS" }.to_string()),
        rollout_state_reason: None,
    }];
    for n in 1..deployments {
        list.push(Deployment {
            id: format!("ecs-svc/active-{}", n),
            status: "ACTIVE".to_string(),
            task_definition: OLD_ARN.to_string(),
            desired_count: 1,
            running_count: 1,
            pending_count: 0,
            rollout_state: Some("COMPLETED".to_string()),
            rollout_state_reason: None,
        });
    }

    ServiceStatus {
        service_name: "data-query-api-service".to_string(),
        status: "ACTIVE".to_string(),
        desired_count: 1,
        running_count: 1,
        pending_count: if settled { 0 } else { 1 },
        task_definition: Some(arn.to_string()),
        deployments: list,
    }
}

// =============================================================================
// Scripted process runner
// =============================================================================

/// Process runner that replays canned output by command-line prefix
///
/// Commands without a matching rule succeed with empty output. A rule holding
/// several outputs hands them out in order and then repeats the last one.
#[derive(Default)]
pub struct ScriptedProcessRunner {
    rules: Mutex<Vec<(String, VecDeque<CommandOutput>)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, stdout: &str) {
        self.respond_with(prefix, 0, stdout, "");
    }

    pub fn fail(&self, prefix: &str, exit_code: i32, stderr: &str) {
        self.respond_with(prefix, exit_code, "", stderr);
    }

    pub fn respond_with(&self, prefix: &str, exit_code: i32, stdout: &str, stderr: &str) {
        let output = CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        };

        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, outputs)) => outputs.push_back(output),
            None => rules.push((prefix.to_string(), VecDeque::from([output]))),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let line = spec.command_line();
        let mut rules = self.rules.lock().unwrap();
        let output = rules
            .iter_mut()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .and_then(|(_, outputs)| {
                if outputs.len() > 1 {
                    outputs.pop_front()
                } else {
                    outputs.front().cloned()
                }
            })
            .unwrap_or(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            });

        Ok(output)
    }
}

// =============================================================================
// Fake cloud
// =============================================================================

enum StatusScript {
    /// Steady on whatever revision the service was last updated to
    FollowUpdates,
    /// In flight for `remaining` polls, then steady on `arn`
    SteadyAfter { remaining: usize, arn: String },
    Fixed(ServiceStatus),
}

/// In-memory stand-in for every external system
pub struct FakeCloud {
    events: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    task_definition: Mutex<Value>,
    registered: Mutex<Vec<Value>>,
    pushed: Mutex<Vec<ImageRef>>,
    service_revision: Mutex<String>,
    status: Mutex<StatusScript>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            task_definition: Mutex::new(sample_task_definition()),
            registered: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
            service_revision: Mutex::new(OLD_ARN.to_string()),
            status: Mutex::new(StatusScript::FollowUpdates),
        })
    }

    /// Makes the named operation fail
    pub fn fail_on(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    pub fn set_status(&self, status: ServiceStatus) {
        *self.status.lock().unwrap() = StatusScript::Fixed(status);
    }

    pub fn never_steady(&self) {
        self.set_status(status_on(NEW_ARN, 2));
    }

    pub fn fail_rollout(&self, reason: &str) {
        let mut status = status_on(NEW_ARN, 2);
        status.deployments[0].rollout_state = Some("FAILED".to_string());
        status.deployments[0].rollout_state_reason = Some(reason.to_string());
        self.set_status(status);
    }

    pub fn steady_after_polls(&self, polls: usize, revision: Option<&TaskDefinitionRevision>) {
        let arn = revision
            .map(|r| r.task_definition_arn.clone())
            .unwrap_or_else(|| NEW_ARN.to_string());
        *self.status.lock().unwrap() = StatusScript::SteadyAfter {
            remaining: polls,
            arn,
        };
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of calls to an operation
    pub fn count(&self, operation: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.split_whitespace().next() == Some(operation))
            .count()
    }

    pub fn pushed(&self) -> Vec<ImageRef> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn registered(&self) -> Vec<Value> {
        self.registered.lock().unwrap().clone()
    }

    pub fn service_revision(&self) -> String {
        self.service_revision.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, detail: impl AsRef<str>) -> Result<()> {
        let detail = detail.as_ref();
        let event = if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, detail)
        };
        self.events.lock().unwrap().push(event);

        if self.failing.lock().unwrap().contains(operation) {
            return Err(FerryError::Process {
                command: operation.to_string(),
                exit_code: 1,
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceRepository for FakeCloud {
    async fn checkout(&self, trigger: &Trigger) -> Result<()> {
        self.record("checkout", trigger.commit.as_str())
            .map_err(FerryError::checkout)
    }
}

#[async_trait]
impl Toolchain for FakeCloud {
    async fn provision_runtime(&self) -> Result<String> {
        self.record("provision_runtime", "")
            .map_err(FerryError::toolchain)?;
        Ok("3.11.9".to_string())
    }

    async fn install_dependencies(&self) -> Result<()> {
        self.record("install_dependencies", "")
            .map_err(FerryError::toolchain)
    }

    async fn run_tests(&self, database_url: &str) -> Result<()> {
        self.record("run_tests", database_url)
            .map_err(|_| FerryError::TestsFailed {
                exit_code: 1,
                summary: "1 failed, 3 passed".to_string(),
            })
    }
}

#[async_trait]
impl CredentialBroker for FakeCloud {
    async fn acquire(&self, region: &str, secrets: &Secrets) -> Result<Credentials> {
        secrets
            .access_key_id()
            .and_then(|_| secrets.secret_access_key())
            .map_err(FerryError::authentication)?;
        self.record("acquire", region)
            .map_err(FerryError::authentication)?;

        let mut credentials = sample_credentials();
        credentials.region = region.to_string();
        Ok(credentials)
    }
}

#[async_trait]
impl ContainerRegistry for FakeCloud {
    async fn login(&self, _credentials: &Credentials) -> Result<String> {
        self.record("login", "").map_err(FerryError::authentication)?;
        Ok(REGISTRY.to_string())
    }

    async fn build(&self, context: &Path, image: &ImageRef) -> Result<()> {
        self.record("build", format!("{} {}", context.display(), image))
            .map_err(FerryError::publish)
    }

    async fn push(&self, image: &ImageRef) -> Result<()> {
        self.record("push", image.to_string())
            .map_err(FerryError::publish)?;
        self.pushed.lock().unwrap().push(image.clone());
        Ok(())
    }
}

#[async_trait]
impl OrchestrationPlatform for FakeCloud {
    async fn describe_task_definition(
        &self,
        _credentials: &Credentials,
        family: &str,
    ) -> Result<TaskDefinition> {
        self.record("describe_task_definition", family)?;
        let document = self.task_definition.lock().unwrap().clone();
        Ok(TaskDefinition::from_value(document)?)
    }

    async fn register_task_definition(
        &self,
        _credentials: &Credentials,
        input: &Value,
    ) -> Result<TaskDefinitionRevision> {
        self.record("register_task_definition", "")?;
        self.registered.lock().unwrap().push(input.clone());

        Ok(TaskDefinitionRevision {
            task_definition_arn: NEW_ARN.to_string(),
            family: "data-query-api-task".to_string(),
            revision: 8,
        })
    }

    async fn update_service(
        &self,
        _credentials: &Credentials,
        cluster: &str,
        service: &str,
        revision: &TaskDefinitionRevision,
    ) -> Result<()> {
        self.record(
            "update_service",
            format!("{} {} {}", cluster, service, revision.family_revision()),
        )?;
        *self.service_revision.lock().unwrap() = revision.task_definition_arn.clone();
        Ok(())
    }

    async fn describe_service(
        &self,
        _credentials: &Credentials,
        _cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus> {
        self.record("describe_service", service)?;

        let mut script = self.status.lock().unwrap();
        let status = match &mut *script {
            StatusScript::FollowUpdates => status_on(&self.service_revision(), 1),
            StatusScript::SteadyAfter { remaining, arn } => {
                if *remaining == 0 {
                    status_on(arn, 1)
                } else {
                    *remaining -= 1;
                    status_on(arn, 2)
                }
            }
            StatusScript::Fixed(status) => status.clone(),
        };
        Ok(status)
    }
}
