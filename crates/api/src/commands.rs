//! Command-line interface of the `autobids-api` binary.
//!
//! `serve` runs the HTTP API. The other commands are maintenance jobs meant
//! for cron: they queue work for the workers and exit.

use autobids_core::error::CoreError;
use autobids_core::types::DbId;
use autobids_db::models::user::{CreateUser, User};
use autobids_db::repositories::{StudyRepo, TaskRepo, UserRepo};
use autobids_db::DbPool;
use autobids_pipeline::tasks::{
    ARCHIVE_RAW_DATA, CFMM2TAR_TASK_TYPES, FIND_UNPROCESSED_TAR_FILES, RUN_TAR2BIDS,
    TAR2BIDS_TASK_TYPES,
};
use autobids_pipeline::{launch_task, PipelineError, TaskPayload};
use clap::Parser;

use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};

/// Autobids portal server and maintenance commands.
#[derive(Parser, Debug)]
#[command(name = "autobids-api")]
#[command(about = "Autobids portal API server and maintenance commands")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API server.
    Serve,

    /// Replace the stored PI names with those on the DICOM server.
    CheckPis,

    /// Queue a clone or pull of the heuristics repository.
    UpdateHeuristics,

    /// Queue a cfmm2tar check for every active study.
    #[command(name = "run-all-cfmm2tar")]
    RunAllCfmm2tar,

    /// Queue tar2bids for new tar files of every active study.
    #[command(name = "run-all-tar2bids")]
    RunAllTar2bids,

    /// Queue a raw dataset archive for every active study.
    RunAllArchive,

    /// Create an admin account, or promote an existing one.
    CreateAdmin(CreateAdminArgs),
}

#[derive(clap::Args, Debug)]
pub struct CreateAdminArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "AUTOBIDS_ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,
}

const ARCHIVE_BLOCKING_TASK_TYPES: [&str; 3] =
    [FIND_UNPROCESSED_TAR_FILES, RUN_TAR2BIDS, ARCHIVE_RAW_DATA];

/// Which batch job a `run-all-*` command queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchJob {
    Cfmm2tar,
    Tar2bids,
    Archive,
}

impl BatchJob {
    /// In-progress task types that cause a study to be skipped.
    ///
    /// Archives also wait for tar2bids so they never snapshot a
    /// half-merged dataset.
    fn blocking_task_types(self) -> &'static [&'static str] {
        match self {
            Self::Cfmm2tar => &CFMM2TAR_TASK_TYPES,
            Self::Tar2bids => &TAR2BIDS_TASK_TYPES,
            Self::Archive => &ARCHIVE_BLOCKING_TASK_TYPES,
        }
    }

    fn payload(self, study_id: DbId) -> TaskPayload {
        match self {
            Self::Cfmm2tar => TaskPayload::CheckTarFiles {
                study_id,
                explicit_scans: None,
            },
            Self::Tar2bids => TaskPayload::FindUnprocessedTarFiles { study_id },
            Self::Archive => TaskPayload::ArchiveRawData { study_id },
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Cfmm2tar => "automatic cfmm2tar task",
            Self::Tar2bids => "automatic tar2bids task",
            Self::Archive => "automatic archive task",
        }
    }
}

/// Queue `job` for every active study without a blocking task in progress.
///
/// Returns the IDs of the studies a task was queued for.
pub async fn run_all(pool: &DbPool, job: BatchJob) -> Result<Vec<DbId>, PipelineError> {
    let mut queued = Vec::new();
    for study in StudyRepo::list_active(pool).await? {
        if let Some(task) =
            TaskRepo::find_in_progress(pool, study.id, job.blocking_task_types()).await?
        {
            tracing::info!(study_id = study.id, task_id = task.id, "Skipping study, task in progress");
            continue;
        }
        launch_task(pool, &job.payload(study.id), job.description(), None).await?;
        queued.push(study.id);
    }
    tracing::info!(?job, count = queued.len(), "Batch tasks queued");
    Ok(queued)
}

/// Queue an update of the heuristics repository.
pub async fn queue_update_heuristics(pool: &DbPool) -> Result<DbId, PipelineError> {
    let task = launch_task(
        pool,
        &TaskPayload::UpdateHeuristics,
        "Update heuristics from CLI",
        None,
    )
    .await?;
    Ok(task.id)
}

/// Create an admin account, or grant admin to an existing account.
pub async fn create_admin(pool: &DbPool, email: &str, password: &str) -> Result<User, CoreError> {
    let email = email.trim().to_lowercase();
    let db_err = |e: sqlx::Error| CoreError::Internal(e.to_string());

    if let Some(existing) = UserRepo::find_by_email(pool, &email).await.map_err(db_err)? {
        let user = UserRepo::set_admin(pool, existing.id, true)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: "User",
                id: existing.id,
            })?;
        tracing::info!(user_id = user.id, "Existing user promoted to admin");
        return Ok(user);
    }

    validate_password_strength(password, MIN_PASSWORD_LENGTH).map_err(CoreError::Validation)?;
    let password_hash = hash_password(password).map_err(|e| CoreError::Internal(e.to_string()))?;
    let user = UserRepo::create(
        pool,
        &CreateUser {
            email,
            password_hash,
            is_admin: true,
        },
    )
    .await
    .map_err(db_err)?;
    tracing::info!(user_id = user.id, "Admin user created");
    Ok(user)
}
