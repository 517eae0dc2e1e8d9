//! Handlers that queue or undo cfmm2tar, tar2bids and archive work for a
//! study.

use autobids_core::error::CoreError;
use autobids_core::types::DbId;
use autobids_db::models::task::TaskResponse;
use autobids_db::repositories::{Cfmm2tarOutputRepo, Tar2bidsOutputRepo, TaskRepo};
use autobids_events::messages;
use autobids_pipeline::tasks::{
    DownloadTarget, ARCHIVE_RAW_DATA, CFMM2TAR_TASK_TYPES, TAR2BIDS_TASK_TYPES,
};
use autobids_pipeline::{launch_task, TaskPayload};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::studies::find_visible_study;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /studies/{id}/cfmm2tar`.
#[derive(Debug, Default, Deserialize)]
pub struct LaunchCfmm2tarRequest {
    /// Retrieve exactly these DICOM studies instead of searching.
    pub explicit_scans: Option<Vec<DownloadTarget>>,
}

/// Request body for `POST /studies/{id}/tar2bids`.
#[derive(Debug, Default, Deserialize)]
pub struct LaunchTar2bidsRequest {
    /// Convert these tar files. All unconverted tar files when omitted.
    pub tar_file_ids: Option<Vec<DbId>>,
}

/// Request body for `DELETE /studies/{id}/tar2bids`.
#[derive(Debug, Deserialize)]
pub struct DeleteTar2bidsRequest {
    pub ids: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// 409 when a task of one of `task_types` is still pending or running.
async fn ensure_not_in_progress(
    state: &AppState,
    study_id: DbId,
    task_types: &[&str],
    what: &str,
) -> AppResult<()> {
    if let Some(task) = TaskRepo::find_in_progress(&state.pool, study_id, task_types).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "A {what} task (id {}) is already in progress for study {study_id}",
            task.id
        ))));
    }
    Ok(())
}

/// POST /api/v1/studies/{id}/cfmm2tar
///
/// Queue a search for DICOM studies not yet retrieved. Returns 202 with
/// the queued task, or 409 if a cfmm2tar task is already in progress.
pub async fn launch_cfmm2tar(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<LaunchCfmm2tarRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<TaskResponse>>)> {
    let study = find_visible_study(&state, &auth, id).await?;
    ensure_not_in_progress(&state, id, &CFMM2TAR_TASK_TYPES, "cfmm2tar").await?;

    let task = launch_task(
        &state.pool,
        &TaskPayload::CheckTarFiles {
            study_id: id,
            explicit_scans: input.explicit_scans,
        },
        &format!("cfmm2tar for study {id}"),
        Some(auth.user_id),
    )
    .await?;
    state
        .pipeline
        .notify(messages::cfmm2tar_submitted(&study.description(), &auth.email))
        .await;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: task.into() })))
}

/// DELETE /api/v1/studies/{id}/cfmm2tar/{output_id}
///
/// Remove a tar file from the study's source dataset and forget it.
pub async fn delete_cfmm2tar_output(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, output_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    find_visible_study(&state, &auth, id).await?;
    let output = Cfmm2tarOutputRepo::find_by_id(&state.pool, output_id)
        .await?
        .filter(|o| o.study_id == id)
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Tar file",
            id: output_id,
        }))?;

    state.pipeline.delete_tar_file(&output).await?;
    tracing::info!(
        study_id = id,
        output_id,
        user_id = auth.user_id,
        "Tar file deleted",
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/studies/{id}/tar2bids
///
/// Queue tar2bids for the chosen tar files, or for every tar file not yet
/// in the raw dataset. Returns 202 with the queued task, or 409 if a
/// tar2bids task is already in progress.
pub async fn launch_tar2bids(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<LaunchTar2bidsRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<TaskResponse>>)> {
    let study = find_visible_study(&state, &auth, id).await?;
    ensure_not_in_progress(&state, id, &TAR2BIDS_TASK_TYPES, "tar2bids").await?;

    let (payload, description) = match input.tar_file_ids {
        Some(ids) => {
            let outputs = Cfmm2tarOutputRepo::list_by_ids(&state.pool, id, &ids).await?;
            if outputs.is_empty() {
                return Err(AppError::BadRequest(
                    "No tar files of this study were selected".into(),
                ));
            }
            let names: Vec<&str> = outputs.iter().map(|o| o.tar_file.as_str()).collect();
            (
                TaskPayload::RunTar2bids {
                    study_id: id,
                    tar_file_ids: outputs.iter().map(|o| o.id).collect(),
                },
                format!("tar2bids run for {}", names.join(", ")),
            )
        }
        None => (
            TaskPayload::FindUnprocessedTarFiles { study_id: id },
            format!("tar2bids run for all new tar files in study {id}"),
        ),
    };

    let task = launch_task(&state.pool, &payload, &description, Some(auth.user_id)).await?;
    state
        .pipeline
        .notify(messages::tar2bids_submitted(&study.description(), &auth.email))
        .await;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: task.into() })))
}

/// DELETE /api/v1/studies/{id}/tar2bids
///
/// Forget tar2bids output records. Converted data stays in the raw
/// dataset.
pub async fn delete_tar2bids_outputs(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<DeleteTar2bidsRequest>,
) -> AppResult<Json<DataResponse<DeletedResponse>>> {
    find_visible_study(&state, &auth, id).await?;
    let deleted = Tar2bidsOutputRepo::delete_for_study(&state.pool, id, &input.ids).await?;
    tracing::info!(study_id = id, deleted, "Tar2bids outputs deleted");
    Ok(Json(DataResponse {
        data: DeletedResponse { deleted },
    }))
}

/// POST /api/v1/studies/{id}/archive
///
/// Queue an archive of the raw dataset. Returns 202 with the queued task,
/// or 409 if an archive task is already in progress.
pub async fn launch_archive(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<TaskResponse>>)> {
    find_visible_study(&state, &auth, id).await?;
    ensure_not_in_progress(&state, id, &[ARCHIVE_RAW_DATA], "archive").await?;

    let task = launch_task(
        &state.pool,
        &TaskPayload::ArchiveRawData { study_id: id },
        &format!("Archive raw data of study {id}"),
        Some(auth.user_id),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: task.into() })))
}
