//! Ferry Runner
//!
//! Executes the redeployment pipeline for a pushed commit.
//!
//! Architecture:
//! - Configuration: pipeline names and runner knobs from the environment
//! - Secrets: credentials kept out of logs and out of child processes that do not need them
//! - Process: every external tool runs through a `ProcessRunner`
//! - Repositories: source checkout, toolchain, credentials, registry and orchestration platform
//! - Services: test gate, image publisher, task definition mutator, rollout controller, run log
//! - Pipeline: runs the stages in order and produces a `RunReport`

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod repository;
pub mod secrets;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{FerryError, Result};
pub use pipeline::{Pipeline, Toolset};
pub use secrets::Secrets;
