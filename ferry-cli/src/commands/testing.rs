//! Test support for the command handlers
//!
//! Handlers are driven against the real command-line toolset with a canned
//! process runner standing in for git, python, docker and aws.

use async_trait::async_trait;
use ferry_core::config::PipelineConfig;
use ferry_runner::process::{CommandOutput, CommandSpec, ProcessRunner};
use ferry_runner::service::InMemoryLogBuffer;
use ferry_runner::{Config, Pipeline, Secrets};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::system_pipeline;

pub const NEW_ARN: &str =
    "arn:aws:ecs:ap-south-1:123456789012:task-definition/data-query-api-task:8";

/// Answers commands by command-line prefix and records every call
///
/// Commands without a matching answer succeed with empty output.
#[derive(Default)]
pub struct CannedRunner {
    answers: Mutex<Vec<(String, String)>>,
    calls: Mutex<Vec<String>>,
}

impl CannedRunner {
    /// A runner whose identity check succeeds
    pub fn new() -> Arc<Self> {
        let runner = Self::default();
        runner.answer(
            "aws sts get-caller-identity",
            json!({
                "Account": "123456789012",
                "Arn": "arn:aws:iam::123456789012:user/ci",
                "UserId": "AIDATEST"
            }),
        );
        Arc::new(runner)
    }

    pub fn answer(&self, prefix: &str, stdout: impl ToString) {
        self.answers
            .lock()
            .unwrap()
            .push((prefix.to_string(), stdout.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|line| line.starts_with(prefix))
    }
}

#[async_trait]
impl ProcessRunner for CannedRunner {
    async fn run(&self, spec: &CommandSpec) -> ferry_runner::Result<CommandOutput> {
        let line = spec.command_line();
        self.calls.lock().unwrap().push(line.clone());

        let stdout = self
            .answers
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

pub fn sample_config() -> Config {
    let mut config = Config::new(PipelineConfig {
        region: "ap-south-1".to_string(),
        repository: "dev/data-query-api".to_string(),
        container_name: "data-query-api-container".to_string(),
        task_definition: "data-query-api-task".to_string(),
        service: "data-query-api-service".to_string(),
        cluster: "fractual-assessment-api".to_string(),
        branch: "main".to_string(),
    });
    config.stability_poll_interval = Duration::from_millis(1);
    config.stability_timeout = Duration::from_millis(50);
    config
}

pub fn sample_secrets() -> Secrets {
    Secrets {
        access_key_id: Some("AKIATEST".to_string()),
        secret_access_key: Some("secret".to_string()),
        ..Secrets::default()
    }
}

pub fn pipeline(runner: &Arc<CannedRunner>, config: Config) -> Pipeline {
    system_pipeline(config, runner.clone(), Arc::new(InMemoryLogBuffer::new()))
}

/// `describe-services` output with the primary on `NEW_ARN`
///
/// One deployment is settled; more than one means a rollout is in flight.
pub fn described_service(deployments: usize) -> serde_json::Value {
    let settled = deployments == 1;
    let list: Vec<serde_json::Value> = (0..deployments)
        .map(|n| {
            json!({
                "id": format!("ecs-svc/{}", n),
                "status": if n == 0 { "PRIMARY" } else { "ACTIVE" },
                "taskDefinition": NEW_ARN,
                "desiredCount": 1,
                "runningCount": if settled { 1 } else { 0 },
                "pendingCount": if settled { 0 } else { 1 },
                "rolloutState": if settled { "COMPLETED" } else { "IN_PROGRESS" }
            })
        })
        .collect();

    json!({
        "services": [{
            "serviceName": "data-query-api-service",
            "status": "ACTIVE",
            "desiredCount": 1,
            "runningCount": if settled { 1 } else { 0 },
            "pendingCount": if settled { 0 } else { 1 },
            "taskDefinition": NEW_ARN,
            "deployments": list
        }],
        "failures": []
    })
}

/// `describe-task-definition` output for revision 7
pub fn described_task_definition() -> serde_json::Value {
    json!({
        "taskDefinition": {
            "taskDefinitionArn": "arn:aws:ecs:ap-south-1:123456789012:task-definition/data-query-api-task:7",
            "family": "data-query-api-task",
            "revision": 7,
            "status": "ACTIVE",
            "containerDefinitions": [
                { "name": "data-query-api-container", "image": "old:1" },
                { "name": "log-router", "image": "fluent-bit:stable" }
            ]
        }
    })
}

/// `register-task-definition` output for revision 8
pub fn registered_task_definition() -> serde_json::Value {
    json!({
        "taskDefinition": {
            "taskDefinitionArn": NEW_ARN,
            "family": "data-query-api-task",
            "revision": 8,
            "status": "ACTIVE"
        }
    })
}
