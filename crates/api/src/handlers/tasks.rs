//! Handlers for task status.

use autobids_core::error::CoreError;
use autobids_core::types::DbId;
use autobids_db::models::task::TaskResponse;
use autobids_db::repositories::{StudyRepo, TaskRepo};
use axum::extract::{Path, State};
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::handlers::studies::find_visible_study;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/studies/{id}/tasks
///
/// Every task launched for the study, newest first.
pub async fn list_study_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<TaskResponse>>>> {
    let study = find_visible_study(&state, &auth, id).await?;
    let tasks = TaskRepo::list_for_study(&state.pool, study.id).await?;
    Ok(Json(DataResponse {
        data: tasks.into_iter().map(TaskResponse::from).collect(),
    }))
}

/// GET /api/v1/tasks/{id}
///
/// Status, progress, error and log of one task. Visible to admins, to the
/// user who launched it, and to users authorized on its study.
pub async fn get_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TaskResponse>>> {
    let not_found = || AppError::Core(CoreError::NotFound { entity: "Task", id });
    let task = TaskRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;

    let visible = auth.is_admin()
        || task.user_id == Some(auth.user_id)
        || match task.study_id {
            Some(study_id) => {
                StudyRepo::find_visible(&state.pool, study_id, auth.user_id, false)
                    .await?
                    .is_some()
            }
            None => false,
        };
    if !visible {
        return Err(not_found());
    }
    Ok(Json(DataResponse { data: task.into() }))
}
