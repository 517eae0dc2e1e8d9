//! Route definitions for the `/studies` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{jobs, studies, tasks};
use crate::state::AppState;

/// Routes mounted at `/studies`.
///
/// Every route except `POST /` requires auth. Studies the caller is not
/// authorized on answer 404.
///
/// ```text
/// POST   /                            -> submit_study (public)
/// GET    /                            -> list_studies
/// GET    /report.csv                  -> study_report
/// GET    /{id}                        -> get_study
/// GET    /{id}/demographics           -> get_demographics
/// GET    /{id}/config                 -> get_config
/// PUT    /{id}/config                 -> update_config
/// GET    /{id}/dicom/{method}         -> query_dicom
/// POST   /{id}/exclusions             -> update_exclusions
/// POST   /{id}/cfmm2tar               -> launch_cfmm2tar
/// DELETE /{id}/cfmm2tar/{output_id}   -> delete_cfmm2tar_output
/// POST   /{id}/tar2bids               -> launch_tar2bids
/// DELETE /{id}/tar2bids               -> delete_tar2bids_outputs
/// POST   /{id}/archive                -> launch_archive
/// GET    /{id}/tasks                  -> list_study_tasks
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(studies::list_studies).post(studies::submit_study))
        .route("/report.csv", get(studies::study_report))
        .route("/{id}", get(studies::get_study))
        .route("/{id}/demographics", get(studies::get_demographics))
        .route(
            "/{id}/config",
            get(studies::get_config).put(studies::update_config),
        )
        .route("/{id}/dicom/{method}", get(studies::query_dicom))
        .route("/{id}/exclusions", post(studies::update_exclusions))
        .route("/{id}/cfmm2tar", post(jobs::launch_cfmm2tar))
        .route(
            "/{id}/cfmm2tar/{output_id}",
            delete(jobs::delete_cfmm2tar_output),
        )
        .route(
            "/{id}/tar2bids",
            post(jobs::launch_tar2bids).delete(jobs::delete_tar2bids_outputs),
        )
        .route("/{id}/archive", post(jobs::launch_archive))
        .route("/{id}/tasks", get(tasks::list_study_tasks))
}
