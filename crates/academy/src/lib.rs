//! Workflow engine for the inspector academy learner portal.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
