//! Image coordinate types
//!
//! A published image is addressed as `{registry}/{repository}:{tag}` where the
//! tag is always the commit that triggered the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const MAX_TAG_LEN: usize = 128;

/// Commit identifier, usable verbatim as an image tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min(7);
        &self.0[..end]
    }
}

impl FromStr for CommitSha {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid_first = s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let valid_rest = s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

        if !valid_first || !valid_rest || s.len() > MAX_TAG_LEN {
            return Err(Error::InvalidCommit(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CommitSha {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CommitSha> for String {
    fn from(value: CommitSha) -> Self {
        value.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully qualified image coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef {
    /// Registry host (e.g., "123456789012.dkr.ecr.ap-south-1.amazonaws.com")
    pub registry: String,
    /// Repository path inside the registry (e.g., "dev/data-query-api")
    pub repository: String,
    /// Image tag, always the triggering commit
    pub tag: CommitSha,
}

impl ImageRef {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>, tag: CommitSha) -> Self {
        Self {
            registry: registry.into().trim_end_matches('/').to_string(),
            repository: repository.into().trim_matches('/').to_string(),
            tag,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidImageRef(s.to_string());

        let (registry, rest) = s.split_once('/').ok_or_else(invalid)?;
        let (repository, tag) = rest.rsplit_once(':').ok_or_else(invalid)?;

        if registry.is_empty() || repository.is_empty() || repository.contains(':') {
            return Err(invalid());
        }

        let tag = tag.parse().map_err(|_| invalid())?;
        Ok(Self::new(registry, repository, tag))
    }
}

impl TryFrom<String> for ImageRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.to_string()
    }
}
