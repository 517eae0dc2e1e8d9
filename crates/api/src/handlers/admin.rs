//! Handlers for the `/admin` resource.
//!
//! Every handler takes [`RequireAdmin`], so non-admins get 403.

use autobids_core::error::CoreError;
use autobids_core::types::DbId;
use autobids_db::models::study::Study;
use autobids_db::models::task::TaskResponse;
use autobids_db::models::user::{SetAdmin, UserResponse};
use autobids_db::repositories::{StudyRepo, UserRepo};
use autobids_pipeline::{launch_task, TaskPayload};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// A user with the studies they can access.
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserResponse,
    pub studies: Vec<Study>,
}

/// Request body for granting or revoking study access.
#[derive(Debug, Deserialize)]
pub struct StudyAccessRequest {
    pub study_ids: Vec<DbId>,
}

fn user_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "User", id })
}

/// GET /api/v1/admin/users
pub async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(DataResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// GET /api/v1/admin/users/{id}
pub async fn get_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserDetail>>> {
    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    let studies = StudyRepo::list_for_user(&state.pool, id).await?;
    Ok(Json(DataResponse {
        data: UserDetail {
            user: user.into(),
            studies,
        },
    }))
}

/// PUT /api/v1/admin/users/{id}/admin
///
/// Grant or revoke the admin flag. Admins cannot demote themselves.
pub async fn set_admin(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SetAdmin>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    if id == admin.user_id && !input.is_admin {
        return Err(AppError::BadRequest(
            "Cannot remove your own admin role".into(),
        ));
    }
    let user = UserRepo::set_admin(&state.pool, id, input.is_admin)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    tracing::info!(
        user_id = id,
        is_admin = input.is_admin,
        changed_by = admin.user_id,
        "Admin flag changed",
    );
    Ok(Json(DataResponse { data: user.into() }))
}

/// POST /api/v1/admin/users/{id}/studies
///
/// Authorize the user on the given studies. Returns the user's studies.
pub async fn grant_studies(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<StudyAccessRequest>,
) -> AppResult<Json<DataResponse<Vec<Study>>>> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    for study_id in &input.study_ids {
        StudyRepo::find_by_id(&state.pool, *study_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Study",
                id: *study_id,
            }))?;
        StudyRepo::grant_access(&state.pool, *study_id, id).await?;
    }
    let studies = StudyRepo::list_for_user(&state.pool, id).await?;
    Ok(Json(DataResponse { data: studies }))
}

/// DELETE /api/v1/admin/users/{id}/studies
///
/// Remove the user's access to the given studies. Returns the user's
/// remaining studies.
pub async fn revoke_studies(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<StudyAccessRequest>,
) -> AppResult<Json<DataResponse<Vec<Study>>>> {
    UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    for study_id in &input.study_ids {
        StudyRepo::revoke_access(&state.pool, *study_id, id).await?;
    }
    let studies = StudyRepo::list_for_user(&state.pool, id).await?;
    Ok(Json(DataResponse { data: studies }))
}

/// POST /api/v1/admin/update-heuristics
///
/// Queue a pull of the heuristics repository. Returns 202 with the task.
pub async fn update_heuristics(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<DataResponse<TaskResponse>>)> {
    let task = launch_task(
        &state.pool,
        &TaskPayload::UpdateHeuristics,
        "Update heuristics",
        Some(admin.user_id),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: task.into() })))
}
