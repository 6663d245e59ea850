//! Ferry Core
//!
//! Core types for the Ferry redeployment pipeline.
//!
//! This crate contains:
//! - Configuration: the named resources a run targets
//! - Domain types: triggers, image coordinates, task definitions, service status and run state
//!
//! Nothing in here talks to an external system. The runner crate owns that.

pub mod config;
pub mod domain;
pub mod error;

pub use error::{Error, Result};
