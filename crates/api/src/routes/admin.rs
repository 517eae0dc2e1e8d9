//! Route definitions for the `/admin` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
///
/// All routes require the `admin` role (enforced by handler extractors).
///
/// ```text
/// GET    /users                -> list_users
/// GET    /users/{id}           -> get_user
/// PUT    /users/{id}/admin     -> set_admin
/// POST   /users/{id}/studies   -> grant_studies
/// DELETE /users/{id}/studies   -> revoke_studies
/// POST   /update-heuristics    -> update_heuristics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", get(admin::get_user))
        .route("/users/{id}/admin", put(admin::set_admin))
        .route(
            "/users/{id}/studies",
            post(admin::grant_studies).delete(admin::revoke_studies),
        )
        .route("/update-heuristics", post(admin::update_heuristics))
}
