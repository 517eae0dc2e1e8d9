pub mod admin;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod principals;
pub mod studies;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                                   service + database health
///
/// /auth/register                            register (public)
/// /auth/login                               login (public)
/// /auth/logout                              logout (requires auth)
///
/// /principals                               PI names (public)
///
/// /studies                                  submit (public), list
/// /studies/report.csv                       CSV report of visible studies
/// /studies/{id}                             study detail
/// /studies/{id}/demographics                submitter answers
/// /studies/{id}/config                      get, replace configuration
/// /studies/{id}/dicom/{method}              DICOM server query
/// /studies/{id}/exclusions                  explicit include/exclude
/// /studies/{id}/cfmm2tar                    launch retrieval
/// /studies/{id}/cfmm2tar/{output_id}        delete a tar file
/// /studies/{id}/tar2bids                    launch conversion, delete outputs
/// /studies/{id}/archive                     launch archival
/// /studies/{id}/tasks                       study tasks
///
/// /tasks/{id}                               task status and log
/// /notifications                            current user's notifications
///
/// /admin/users                              list users (admin only)
/// /admin/users/{id}                         user detail
/// /admin/users/{id}/admin                   set admin flag
/// /admin/users/{id}/studies                 grant, revoke study access
/// /admin/update-heuristics                  launch heuristic update
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/principals", principals::router())
        .nest("/studies", studies::router())
        .nest("/tasks", tasks::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router())
}
