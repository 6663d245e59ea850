//! Task definition documents
//!
//! The document schema belongs to the orchestration platform, so it is kept as
//! an order-preserving JSON object rather than a typed struct. Only the fields
//! the pipeline reads or rewrites are interpreted. Everything else passes
//! through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::image::ImageRef;
use crate::error::{Error, Result};

/// Fields added by the platform on describe that registration refuses
pub const READ_ONLY_FIELDS: &[&str] = &[
    "taskDefinitionArn",
    "revision",
    "status",
    "requiresAttributes",
    "compatibilities",
    "registeredAt",
    "registeredBy",
    "deregisteredAt",
];

/// A task definition document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct TaskDefinition(Map<String, Value>);

impl TaskDefinition {
    /// Wraps a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::MalformedTaskDefinition(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Task definition family, or "<unknown>" when the document lacks one
    pub fn family(&self) -> &str {
        self.0
            .get("family")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
    }

    /// Revision number, present only on described documents
    pub fn revision(&self) -> Option<u64> {
        self.0.get("revision").and_then(Value::as_u64)
    }

    /// Image currently set for the named container
    pub fn container_image(&self, container: &str) -> Result<Option<&str>> {
        let index = self.container_index(container)?;
        Ok(self.containers()?[index].get("image").and_then(Value::as_str))
    }

    /// Returns a copy with the named container's image replaced
    ///
    /// Exactly one container entry is touched. Every other field, including
    /// key order, is identical to `self`.
    pub fn with_container_image(&self, container: &str, image: &ImageRef) -> Result<Self> {
        let index = self.container_index(container)?;

        let mut rendered = self.clone();
        let entry = rendered
            .0
            .get_mut("containerDefinitions")
            .and_then(Value::as_array_mut)
            .and_then(|containers| containers.get_mut(index))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                Error::MalformedTaskDefinition("containerDefinitions changed shape".to_string())
            })?;

        entry.insert("image".to_string(), Value::String(image.to_string()));
        Ok(rendered)
    }

    /// Document suitable for registering as a new revision
    pub fn registration_input(&self) -> Value {
        let mut input = self.0.clone();
        for field in READ_ONLY_FIELDS {
            input.shift_remove(*field);
        }
        Value::Object(input)
    }

    pub fn to_pretty_json(&self) -> String {
        // Serializing a Map<String, Value> cannot fail
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }

    fn containers(&self) -> Result<&Vec<Value>> {
        self.0
            .get("containerDefinitions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::MalformedTaskDefinition(format!(
                    "task definition '{}' has no containerDefinitions array",
                    self.family()
                ))
            })
    }

    fn container_index(&self, container: &str) -> Result<usize> {
        let mut matches = Vec::new();

        for (index, entry) in self.containers()?.iter().enumerate() {
            let entry = entry.as_object().ok_or_else(|| {
                Error::MalformedTaskDefinition(format!(
                    "container definition #{} is a {}, expected an object",
                    index,
                    json_kind(entry)
                ))
            })?;

            if entry.get("name").and_then(Value::as_str) == Some(container) {
                matches.push(index);
            }
        }

        match matches.as_slice() {
            [index] => Ok(*index),
            [] => Err(Error::ContainerNotFound {
                container: container.to_string(),
                family: self.family().to_string(),
            }),
            many => Err(Error::AmbiguousContainer {
                container: container.to_string(),
                family: self.family().to_string(),
                count: many.len(),
            }),
        }
    }
}

impl TryFrom<Value> for TaskDefinition {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<TaskDefinition> for Value {
    fn from(value: TaskDefinition) -> Self {
        value.into_value()
    }
}

/// A registered task definition revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionRevision {
    pub task_definition_arn: String,
    pub family: String,
    pub revision: u64,
}

impl TaskDefinitionRevision {
    /// `family:revision` form accepted by service updates
    pub fn family_revision(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
