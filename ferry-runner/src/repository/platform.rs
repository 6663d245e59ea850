//! Orchestration platform
//!
//! Describes and registers task definitions, updates services and reports
//! service status through the `aws ecs` command line.

use async_trait::async_trait;
use ferry_core::domain::service::ServiceStatus;
use ferry_core::domain::task_definition::{TaskDefinition, TaskDefinitionRevision};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::credentials::Credentials;
use super::parse_json;
use crate::error::{FerryError, Result};
use crate::process::{CommandSpec, ProcessRunner};

/// Repository trait for the orchestration platform
#[async_trait]
pub trait OrchestrationPlatform: Send + Sync {
    /// Fetches the latest registered revision of a task definition family
    async fn describe_task_definition(
        &self,
        credentials: &Credentials,
        family: &str,
    ) -> Result<TaskDefinition>;

    /// Registers a new task definition revision
    ///
    /// # Arguments
    /// * `input` - Registration document, without read-only fields
    async fn register_task_definition(
        &self,
        credentials: &Credentials,
        input: &Value,
    ) -> Result<TaskDefinitionRevision>;

    /// Points a service at a task definition revision
    async fn update_service(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
        revision: &TaskDefinitionRevision,
    ) -> Result<()>;

    /// Reports the current status of a service
    async fn describe_service(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus>;
}

/// ECS implementation of OrchestrationPlatform
pub struct EcsPlatform {
    runner: Arc<dyn ProcessRunner>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinitionEnvelope {
    task_definition: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredEnvelope {
    task_definition: TaskDefinitionRevision,
}

#[derive(Debug, Deserialize)]
struct DescribeServicesOutput {
    #[serde(default)]
    services: Vec<ServiceStatus>,
    #[serde(default)]
    failures: Vec<DescribeFailure>,
}

#[derive(Debug, Deserialize)]
struct DescribeFailure {
    #[serde(default)]
    arn: String,
    #[serde(default)]
    reason: String,
}

impl EcsPlatform {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn ecs<I, S>(&self, credentials: &Credentials, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("aws")
            .arg("ecs")
            .args(args)
            .args(["--region", credentials.region.as_str(), "--output", "json"])
            .envs(credentials.env())
    }
}

#[async_trait]
impl OrchestrationPlatform for EcsPlatform {
    async fn describe_task_definition(
        &self,
        credentials: &Credentials,
        family: &str,
    ) -> Result<TaskDefinition> {
        let spec = self.ecs(
            credentials,
            ["describe-task-definition", "--task-definition", family],
        );
        let output = self.runner.run_checked(&spec).await?;
        let envelope: TaskDefinitionEnvelope = parse_json(&spec, &output)?;

        let document = TaskDefinition::from_value(envelope.task_definition)?;
        debug!(
            "Described task definition {} revision {:?}",
            document.family(),
            document.revision()
        );
        Ok(document)
    }

    async fn register_task_definition(
        &self,
        credentials: &Credentials,
        input: &Value,
    ) -> Result<TaskDefinitionRevision> {
        // Container environment values ride in the document
        let spec = self
            .ecs(credentials, ["register-task-definition", "--cli-input-json"])
            .secret_arg(input.to_string());
        let output = self.runner.run_checked(&spec).await?;
        let envelope: RegisteredEnvelope = parse_json(&spec, &output)?;

        info!(
            "Registered task definition {}",
            envelope.task_definition.task_definition_arn
        );
        Ok(envelope.task_definition)
    }

    async fn update_service(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
        revision: &TaskDefinitionRevision,
    ) -> Result<()> {
        let spec = self.ecs(
            credentials,
            [
                "update-service",
                "--cluster",
                cluster,
                "--service",
                service,
                "--task-definition",
                revision.task_definition_arn.as_str(),
            ],
        );
        self.runner.run_checked(&spec).await?;

        info!(
            "Updated service {} in cluster {} to {}",
            service,
            cluster,
            revision.family_revision()
        );
        Ok(())
    }

    async fn describe_service(
        &self,
        credentials: &Credentials,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus> {
        let spec = self.ecs(
            credentials,
            ["describe-services", "--cluster", cluster, "--services", service],
        );
        let output = self.runner.run_checked(&spec).await?;
        let described: DescribeServicesOutput = parse_json(&spec, &output)?;

        if let Some(failure) = described.failures.first() {
            return Err(FerryError::Parse {
                command: spec.command_line(),
                message: format!("{} ({})", failure.reason, failure.arn),
            });
        }

        described
            .services
            .into_iter()
            .next()
            .ok_or_else(|| FerryError::Parse {
                command: spec.command_line(),
                message: format!("service '{}' not found in cluster '{}'", service, cluster),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LoggingProcessRunner;
    use crate::service::{InMemoryLogBuffer, LogBufferService};
    use crate::testing::{ScriptedProcessRunner, sample_credentials};
    use serde_json::json;

    #[tokio::test]
    async fn test_describe_unwraps_task_definition() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond(
            "aws ecs describe-task-definition",
            &json!({
                "taskDefinition": {
                    "family": "data-query-api-task",
                    "revision": 7,
                    "containerDefinitions": [{ "name": "data-query-api-container", "image": "old" }]
                },
                "tags": []
            })
            .to_string(),
        );

        let platform = EcsPlatform::new(runner.clone());
        let document = platform
            .describe_task_definition(&sample_credentials(), "data-query-api-task")
            .await
            .unwrap();

        assert_eq!(document.family(), "data-query-api-task");
        assert_eq!(document.revision(), Some(7));
        assert_eq!(
            runner.command_lines(),
            vec![
                "aws ecs describe-task-definition --task-definition data-query-api-task --region ap-south-1 --output json"
            ]
        );
        assert_eq!(
            runner.calls()[0].env_value("AWS_ACCESS_KEY_ID"),
            Some("AKIATEST")
        );
    }

    #[tokio::test]
    async fn test_register_returns_new_revision() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond(
            "aws ecs register-task-definition",
            &json!({
                "taskDefinition": {
                    "taskDefinitionArn": "arn:aws:ecs:ap-south-1:123456789012:task-definition/data-query-api-task:8",
                    "family": "data-query-api-task",
                    "revision": 8,
                    "status": "ACTIVE"
                }
            })
            .to_string(),
        );

        let input = json!({ "family": "data-query-api-task", "containerDefinitions": [] });
        let revision = EcsPlatform::new(runner.clone())
            .register_task_definition(&sample_credentials(), &input)
            .await
            .unwrap();

        assert_eq!(revision.revision, 8);
        assert_eq!(revision.family_revision(), "data-query-api-task:8");

        let call = &runner.calls()[0];
        let position = call
            .args
            .iter()
            .position(|a| a == "--cli-input-json")
            .unwrap();
        let sent: Value = serde_json::from_str(&call.args[position + 1]).unwrap();
        assert_eq!(sent, input);
    }

    #[tokio::test]
    async fn test_register_keeps_document_out_of_logs_and_errors() {
        let scripted = Arc::new(ScriptedProcessRunner::new());
        scripted.fail(
            "aws ecs register-task-definition",
            255,
            "An error occurred (ClientException): Invalid setting",
        );
        let buffer = Arc::new(InMemoryLogBuffer::new());
        let runner = Arc::new(LoggingProcessRunner::new(scripted.clone(), buffer.clone()));

        let input = json!({
            "family": "data-query-api-task",
            "containerDefinitions": [{
                "name": "data-query-api-container",
                "environment": [{ "name": "DB_PASSWORD", "value": "hunter2" }]
            }]
        });
        let err = EcsPlatform::new(runner)
            .register_task_definition(&sample_credentials(), &input)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("<redacted>"));
        assert!(!err.to_string().contains("hunter2"));
        assert!(
            buffer
                .drain()
                .iter()
                .all(|entry| !entry.message.contains("hunter2"))
        );
        assert!(scripted.calls()[0].args.iter().any(|a| a.contains("hunter2")));
    }

    #[tokio::test]
    async fn test_update_service_targets_revision_arn() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        let revision = TaskDefinitionRevision {
            task_definition_arn: "arn:aws:ecs:ap-south-1:1:task-definition/data-query-api-task:8"
                .to_string(),
            family: "data-query-api-task".to_string(),
            revision: 8,
        };

        EcsPlatform::new(runner.clone())
            .update_service(
                &sample_credentials(),
                "fractual-assessment-api",
                "data-query-api-service",
                &revision,
            )
            .await
            .unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "aws ecs update-service --cluster fractual-assessment-api --service data-query-api-service --task-definition arn:aws:ecs:ap-south-1:1:task-definition/data-query-api-task:8 --region ap-south-1 --output json"
            ]
        );
    }

    #[tokio::test]
    async fn test_describe_service_reports_missing_service() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond(
            "aws ecs describe-services",
            r#"{"services":[],"failures":[{"arn":"arn:aws:ecs:ap-south-1:1:service/nope","reason":"MISSING"}]}"#,
        );

        let err = EcsPlatform::new(runner)
            .describe_service(&sample_credentials(), "fractual-assessment-api", "nope")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }

    #[tokio::test]
    async fn test_describe_service_parses_status() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond(
            "aws ecs describe-services",
            &json!({
                "services": [{
                    "serviceName": "data-query-api-service",
                    "status": "ACTIVE",
                    "desiredCount": 1,
                    "runningCount": 1,
                    "pendingCount": 0,
                    "deployments": [{ "id": "ecs-svc/1", "status": "PRIMARY", "rolloutState": "COMPLETED" }]
                }],
                "failures": []
            })
            .to_string(),
        );

        let status = EcsPlatform::new(runner)
            .describe_service(
                &sample_credentials(),
                "fractual-assessment-api",
                "data-query-api-service",
            )
            .await
            .unwrap();
        assert!(status.is_steady());
    }

    #[tokio::test]
    async fn test_unparseable_output_is_reported() {
        let runner = Arc::new(ScriptedProcessRunner::new());
        runner.respond("aws ecs describe-task-definition", "not json");

        let err = EcsPlatform::new(runner)
            .describe_task_definition(&sample_credentials(), "data-query-api-task")
            .await
            .unwrap_err();
        assert!(matches!(err, FerryError::Parse { .. }));
    }
}
