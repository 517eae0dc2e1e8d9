use autobids_db::models::notification::Notification;
use autobids_db::repositories::NotificationRepo;
use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/notifications
///
/// The caller's notifications, one per name.
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    let notifications = NotificationRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: notifications,
    }))
}
