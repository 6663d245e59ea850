//! Secrets injected into the run
//!
//! Secrets are read once from the environment and handed only to the stages
//! that declare them. Child processes of every other stage have these
//! variables removed from their environment.

use std::fmt;

use crate::error::{FerryError, Result};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Every environment variable that carries a secret
pub const SECRET_VARS: &[&str] = &[
    DATABASE_URL,
    AWS_ACCESS_KEY_ID,
    AWS_SECRET_ACCESS_KEY,
    AWS_SESSION_TOKEN,
];

/// Secret values available to the run
#[derive(Clone, Default)]
pub struct Secrets {
    pub database_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            database_url: var(DATABASE_URL),
            access_key_id: var(AWS_ACCESS_KEY_ID),
            secret_access_key: var(AWS_SECRET_ACCESS_KEY),
            session_token: var(AWS_SESSION_TOKEN),
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or(FerryError::MissingSecret(DATABASE_URL))
    }

    pub fn access_key_id(&self) -> Result<&str> {
        self.access_key_id
            .as_deref()
            .ok_or(FerryError::MissingSecret(AWS_ACCESS_KEY_ID))
    }

    pub fn secret_access_key(&self) -> Result<&str> {
        self.secret_access_key
            .as_deref()
            .ok_or(FerryError::MissingSecret(AWS_SECRET_ACCESS_KEY))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| if value.is_some() { "<redacted>" } else { "<unset>" };

        f.debug_struct("Secrets")
            .field("database_url", &redact(&self.database_url))
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &redact(&self.session_token))
            .finish()
    }
}
