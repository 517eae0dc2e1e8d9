use autobids_db::repositories::PrincipalRepo;
use axum::extract::State;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/principals
///
/// PI names offered on the study request form. Public.
pub async fn list_principals(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<String>>>> {
    let names = PrincipalRepo::list(&state.pool)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    Ok(Json(DataResponse { data: names }))
}
