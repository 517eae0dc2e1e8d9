//! External tool orchestration and background task bodies.
//!
//! Everything here shells out through a [`CommandRunner`] so that tests can
//! substitute scripted output for dcm4che, cfmm2tar, tar2bids, DataLad, git
//! and ssh.
//!
//! [`CommandRunner`]: autobids_core::process::CommandRunner

pub mod apptainer;
pub mod archive;
pub mod bids;
pub mod config;
pub mod datalad;
pub mod dcm4che;
pub mod error;
pub mod heuristics;
pub mod records;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ToolConfig;
pub use error::PipelineError;
pub use tasks::{launch_task, Pipeline, TaskPayload};
