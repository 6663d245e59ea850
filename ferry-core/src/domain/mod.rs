//! Core domain types
//!
//! These types describe one pipeline run and the external documents it
//! touches. They are shared between the runner (which produces them) and the
//! CLI (which prints them).

pub mod image;
pub mod log;
pub mod run;
pub mod service;
pub mod task_definition;
pub mod trigger;
