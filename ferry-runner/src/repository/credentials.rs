//! Cloud credential acquisition
//!
//! Turns the access key pair from the secrets into region-scoped credentials
//! and verifies them against the identity service before anything else uses
//! them.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::parse_json;
use crate::error::{FerryError, Result};
use crate::process::{CommandSpec, ProcessRunner};
use crate::secrets::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN, Secrets};

/// Identity the credentials resolve to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    #[serde(default)]
    pub user_id: String,
}

/// Verified, region-scoped credentials
#[derive(Clone)]
pub struct Credentials {
    pub region: String,
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    pub identity: CallerIdentity,
}

impl Credentials {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        identity: CallerIdentity,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            identity,
        }
    }

    pub fn account(&self) -> &str {
        &self.identity.account
    }

    /// Environment that lets a cloud CLI child process act with these credentials
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            (AWS_ACCESS_KEY_ID.to_string(), self.access_key_id.clone()),
            (
                AWS_SECRET_ACCESS_KEY.to_string(),
                self.secret_access_key.clone(),
            ),
            ("AWS_REGION".to_string(), self.region.clone()),
            ("AWS_DEFAULT_REGION".to_string(), self.region.clone()),
        ];
        if let Some(token) = &self.session_token {
            env.push((AWS_SESSION_TOKEN.to_string(), token.clone()));
        }
        env
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("access_key_id", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Repository trait for the credential broker
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Acquires credentials scoped to a region
    ///
    /// # Arguments
    /// * `region` - Region the credentials are used in
    /// * `secrets` - Secrets holding the access key pair
    async fn acquire(&self, region: &str, secrets: &Secrets) -> Result<Credentials>;
}

/// STS implementation of CredentialBroker (`aws sts get-caller-identity`)
pub struct StsCredentialBroker {
    runner: Arc<dyn ProcessRunner>,
}

impl StsCredentialBroker {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    async fn acquire_inner(&self, region: &str, secrets: &Secrets) -> Result<Credentials> {
        let unverified = Credentials::new(
            region,
            secrets.access_key_id()?,
            secrets.secret_access_key()?,
            secrets.session_token.clone(),
            CallerIdentity {
                account: String::new(),
                arn: String::new(),
                user_id: String::new(),
            },
        );

        let spec = CommandSpec::new("aws")
            .args([
                "sts",
                "get-caller-identity",
                "--region",
                region,
                "--output",
                "json",
            ])
            .envs(unverified.env());

        let output = self.runner.run_checked(&spec).await?;
        let identity: CallerIdentity = parse_json(&spec, &output)?;

        Ok(Credentials {
            identity,
            ..unverified
        })
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn acquire(&self, region: &str, secrets: &Secrets) -> Result<Credentials> {
        let credentials = self
            .acquire_inner(region, secrets)
            .await
            .map_err(FerryError::authentication)?;

        info!(
            "Authenticated as {} in {}",
            credentials.identity.arn, credentials.region
        );
        Ok(credentials)
    }
}
