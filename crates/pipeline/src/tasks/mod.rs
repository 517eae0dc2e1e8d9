//! Background task bodies and the payloads that select them.
//!
//! Tasks are rows in the `tasks` table. Their `parameters` column holds a
//! serialized [`TaskPayload`]; a worker claims the row and hands it to
//! [`Pipeline::run`].

mod archive;
mod cfmm2tar;
mod context;
mod tar2bids;

use std::path::Path;

use autobids_core::process::CommandRunner;
use autobids_core::types::DbId;
use autobids_db::models::task::{SubmitTask, Task};
use autobids_db::repositories::TaskRepo;
use autobids_events::{EmailDelivery, EmailMessage};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::ToolConfig;
use crate::datalad::Datalad;
use crate::dcm4che::Dcm4cheClient;
use crate::error::PipelineError;

pub use context::TaskContext;

pub const CHECK_TAR_FILES: &str = "check_tar_files";
pub const RUN_CFMM2TAR: &str = "run_cfmm2tar";
pub const FIND_UNPROCESSED_TAR_FILES: &str = "find_unprocessed_tar_files";
pub const RUN_TAR2BIDS: &str = "run_tar2bids";
pub const ARCHIVE_RAW_DATA: &str = "archive_raw_data";
pub const UPDATE_HEURISTICS: &str = "update_heuristics";

/// Error recorded when a task body returns without completing its task.
pub const UNKNOWN_FAILURE: &str = "Unknown uncaught exception";

/// Task types that block a new cfmm2tar request for the same study.
pub const CFMM2TAR_TASK_TYPES: [&str; 2] = [CHECK_TAR_FILES, RUN_CFMM2TAR];

/// Task types that block a new tar2bids request for the same study.
pub const TAR2BIDS_TASK_TYPES: [&str; 2] = [FIND_UNPROCESSED_TAR_FILES, RUN_TAR2BIDS];

/// One DICOM study to retrieve with cfmm2tar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    pub study_instance_uid: String,
    pub patient_name: String,
}

/// What a task does, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Look for DICOM studies not yet retrieved and launch cfmm2tar.
    /// `explicit_scans` replaces the DICOM search when given.
    CheckTarFiles {
        study_id: DbId,
        explicit_scans: Option<Vec<DownloadTarget>>,
    },
    RunCfmm2tar {
        study_id: DbId,
        targets: Vec<DownloadTarget>,
    },
    /// Launch tar2bids for tar files not yet in the raw dataset.
    FindUnprocessedTarFiles { study_id: DbId },
    RunTar2bids {
        study_id: DbId,
        tar_file_ids: Vec<DbId>,
    },
    ArchiveRawData { study_id: DbId },
    UpdateHeuristics,
}

impl TaskPayload {
    pub fn task_type(&self) -> &'static str {
        match self {
            Self::CheckTarFiles { .. } => CHECK_TAR_FILES,
            Self::RunCfmm2tar { .. } => RUN_CFMM2TAR,
            Self::FindUnprocessedTarFiles { .. } => FIND_UNPROCESSED_TAR_FILES,
            Self::RunTar2bids { .. } => RUN_TAR2BIDS,
            Self::ArchiveRawData { .. } => ARCHIVE_RAW_DATA,
            Self::UpdateHeuristics => UPDATE_HEURISTICS,
        }
    }

    pub fn study_id(&self) -> Option<DbId> {
        match self {
            Self::CheckTarFiles { study_id, .. }
            | Self::RunCfmm2tar { study_id, .. }
            | Self::FindUnprocessedTarFiles { study_id }
            | Self::RunTar2bids { study_id, .. }
            | Self::ArchiveRawData { study_id } => Some(*study_id),
            Self::UpdateHeuristics => None,
        }
    }
}

/// Queue a task for the workers.
pub async fn launch_task(
    pool: &PgPool,
    payload: &TaskPayload,
    description: &str,
    user_id: Option<DbId>,
) -> Result<Task, PipelineError> {
    let task = TaskRepo::submit(
        pool,
        &SubmitTask {
            task_type: payload.task_type().to_string(),
            description: Some(description.to_string()),
            user_id,
            study_id: payload.study_id(),
            parameters: serde_json::to_value(payload)?,
        },
    )
    .await?;
    tracing::info!(
        task_id = task.id,
        task_type = %task.task_type,
        study_id = ?task.study_id,
        "Task queued",
    );
    Ok(task)
}

/// Executes task bodies against the external tools.
pub struct Pipeline<R> {
    pool: PgPool,
    config: ToolConfig,
    runner: R,
    email: Option<EmailDelivery>,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(pool: PgPool, config: ToolConfig, runner: R, email: Option<EmailDelivery>) -> Self {
        Self {
            pool,
            config,
            runner,
            email,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Execute a claimed task and make sure it ends in a terminal status.
    ///
    /// Errors are appended to the task log. A task left incomplete by its
    /// body is failed with the error, or with [`UNKNOWN_FAILURE`].
    pub async fn run(&self, task: &Task) -> Result<(), PipelineError> {
        let result = self.execute(task).await;
        let message = match &result {
            Ok(()) => UNKNOWN_FAILURE.to_string(),
            Err(e) => {
                tracing::error!(task_id = task.id, task_type = %task.task_type, error = %e, "Task failed");
                TaskRepo::append_log(&self.pool, task.id, &format!("\n{e}\n")).await?;
                e.to_string()
            }
        };
        if TaskRepo::fail_if_incomplete(&self.pool, task.id, &message).await? {
            tracing::error!(task_id = task.id, task_type = %task.task_type, "Task left incomplete");
        }
        result
    }

    /// Dispatch a task to its body.
    pub async fn execute(&self, task: &Task) -> Result<(), PipelineError> {
        let payload: TaskPayload = serde_json::from_value(task.parameters.clone())?;
        if payload.task_type() != task.task_type {
            return Err(PipelineError::UnknownTaskType(task.task_type.clone()));
        }
        let ctx = TaskContext::new(&self.pool, task);
        tracing::info!(task_id = task.id, task_type = %task.task_type, "Executing task");

        match payload {
            TaskPayload::CheckTarFiles {
                study_id,
                explicit_scans,
            } => self.check_tar_files(&ctx, study_id, explicit_scans).await,
            TaskPayload::RunCfmm2tar { study_id, targets } => {
                self.run_cfmm2tar(&ctx, study_id, &targets).await
            }
            TaskPayload::FindUnprocessedTarFiles { study_id } => {
                self.find_unprocessed_tar_files(&ctx, study_id).await
            }
            TaskPayload::RunTar2bids {
                study_id,
                tar_file_ids,
            } => self.run_tar2bids(&ctx, study_id, &tar_file_ids).await,
            TaskPayload::ArchiveRawData { study_id } => self.archive_raw_data(&ctx, study_id).await,
            TaskPayload::UpdateHeuristics => {
                ctx.set_progress(0).await?;
                crate::heuristics::update_heuristics(&self.runner, &self.config).await?;
                ctx.set_progress(100).await?;
                Ok(())
            }
        }
    }

    pub fn dcm4che(&self) -> Dcm4cheClient<'_, R> {
        Dcm4cheClient::new(&self.runner, &self.config)
    }

    fn datalad(&self) -> Datalad<'_, R> {
        Datalad::new(&self.runner)
    }

    /// Send an email if delivery is configured.
    pub async fn notify(&self, message: EmailMessage) {
        match &self.email {
            Some(email) => email.send_logged(&message).await,
            None => tracing::debug!(subject = %message.subject, "Email disabled, not sending"),
        }
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
