//! Handlers for the `/studies` resource.

use autobids_core::dicom::StudyMetadata;
use autobids_core::error::CoreError;
use autobids_core::filesystem::DirTree;
use autobids_core::heuristics::{available_heuristics, available_tar2bids_images, Choice};
use autobids_core::naming::DatasetType;
use autobids_core::study::{render_report_csv, StudyRequest};
use autobids_core::types::DbId;
use autobids_db::models::explicit_patient::{ExplicitPatient, NewExplicitPatient};
use autobids_db::models::output::{Cfmm2tarOutput, Tar2bidsOutputWithInputs};
use autobids_db::models::study::{CreateStudy, Study, StudyDemographics, UpdateStudyConfig};
use autobids_db::models::task::TaskResponse;
use autobids_db::models::user::UserResponse;
use autobids_db::repositories::{
    Cfmm2tarOutputRepo, DataladDatasetRepo, ExplicitPatientRepo, GlobusUsernameRepo,
    StudyRepo, Tar2bidsOutputRepo, TaskRepo, UserRepo,
};
use autobids_events::messages;
use autobids_pipeline::records::get_study_records;
use autobids_pipeline::tasks::{ARCHIVE_RAW_DATA, CFMM2TAR_TASK_TYPES, TAR2BIDS_TASK_TYPES};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Load a study the caller may see, answering 404 otherwise.
pub(crate) async fn find_visible_study(
    state: &AppState,
    auth: &AuthUser,
    id: DbId,
) -> AppResult<Study> {
    StudyRepo::find_visible(&state.pool, id, auth.user_id, auth.is_admin())
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Study",
            id,
        }))
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Everything shown on a study's results page.
#[derive(Debug, Serialize)]
pub struct StudyDetail {
    #[serde(flatten)]
    pub study: Study,
    pub tasks: Vec<TaskResponse>,
    pub cfmm2tar_outputs: Vec<Cfmm2tarOutput>,
    /// Tar files not yet converted into the raw dataset.
    pub unprocessed_tar_file_ids: Vec<DbId>,
    pub tar2bids_outputs: Vec<Tar2bidsOutputWithInputs>,
    /// `tree`-style lines of the raw dataset, if it has been snapshotted.
    pub dataset_tree: Option<Vec<String>>,
    pub cfmm2tar_in_progress: bool,
    pub tar2bids_in_progress: bool,
    pub archive_in_progress: bool,
}

/// A study's configuration with the choices offered for it.
#[derive(Debug, Serialize)]
pub struct StudyConfigResponse {
    pub id: DbId,
    pub principal: String,
    pub project_name: String,
    pub dataset_name: String,
    pub sample_date: Option<NaiveDate>,
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub heuristic: String,
    pub tar2bids_img: Option<String>,
    pub subj_expr: String,
    pub patient_str: String,
    pub patient_name_re: Option<String>,
    pub active: bool,
    pub deface: bool,
    pub custom_bidsignore: Option<String>,
    pub custom_ria_url: Option<String>,
    pub included: Vec<ExplicitPatient>,
    pub excluded: Vec<ExplicitPatient>,
    pub users_authorized: Vec<UserResponse>,
    pub globus_usernames: Vec<String>,
    pub available_heuristics: Vec<Choice>,
    pub available_images: Vec<Choice>,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `PUT /studies/{id}/config`.
///
/// The optional lists are left untouched when omitted.
#[derive(Debug, Deserialize)]
pub struct UpdateConfigRequest {
    #[serde(flatten)]
    pub config: UpdateStudyConfig,
    /// Replaces the authorized users. Admin only.
    pub users_authorized: Option<Vec<DbId>>,
    /// StudyInstanceUIDs of explicit inclusions to keep.
    pub included_uids: Option<Vec<String>>,
    /// StudyInstanceUIDs of explicit exclusions to keep.
    pub excluded_uids: Option<Vec<String>>,
    pub globus_usernames: Option<Vec<String>>,
}

/// Request body for `POST /studies/{id}/exclusions`.
#[derive(Debug, Deserialize)]
pub struct ExclusionsRequest {
    #[serde(default)]
    pub excluded: Vec<NewExplicitPatient>,
    #[serde(default)]
    pub included: Vec<NewExplicitPatient>,
}

/// How `GET /studies/{id}/dicom/{method}` searches the DICOM server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DicomQueryMethod {
    Both,
    Date,
    Description,
}

impl DicomQueryMethod {
    fn parse(method: &str) -> Option<Self> {
        match method {
            "both" => Some(Self::Both),
            "date" => Some(Self::Date),
            "description" => Some(Self::Description),
            _ => None,
        }
    }

    fn uses_date(self) -> bool {
        matches!(self, Self::Both | Self::Date)
    }

    fn uses_description(self) -> bool {
        matches!(self, Self::Both | Self::Description)
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/studies
///
/// Submit a new study request. Public. Returns 201 with the stored study,
/// or 409 when the principal already has a project of that name.
pub async fn submit_study(
    State(state): State<AppState>,
    Json(input): Json<StudyRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Study>>)> {
    let create = CreateStudy::from_request(&input)?;
    let study = StudyRepo::create(&state.pool, &create).await?;
    tracing::info!(
        study_id = study.id,
        principal = %study.principal,
        project_name = %study.project_name,
        "Study request submitted",
    );

    state
        .pipeline
        .notify(messages::new_study_submitted(
            &study.submitter_name,
            &study.submitter_email,
        ))
        .await;
    Ok((StatusCode::CREATED, Json(DataResponse { data: study })))
}

/// GET /api/v1/studies
///
/// Studies the caller may see: all of them for admins.
pub async fn list_studies(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Study>>>> {
    let studies = StudyRepo::list_visible(&state.pool, auth.user_id, auth.is_admin()).await?;
    Ok(Json(DataResponse { data: studies }))
}

/// GET /api/v1/studies/report.csv
///
/// Submitted answers of every visible study as a CSV download.
pub async fn study_report(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let studies = StudyRepo::list_visible(&state.pool, auth.user_id, auth.is_admin()).await?;
    let rows: Vec<_> = studies.iter().map(Study::report_row).collect();
    let csv = render_report_csv(&rows);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"autobids_report.csv\"",
            ),
        ],
        csv,
    ))
}

/// GET /api/v1/studies/{id}
pub async fn get_study(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<StudyDetail>>> {
    let study = find_visible_study(&state, &auth, id).await?;
    let pool = &state.pool;

    let tasks = TaskRepo::list_for_study(pool, id).await?;
    let cfmm2tar_outputs = Cfmm2tarOutputRepo::list_for_study(pool, id).await?;
    let raw_dataset = DataladDatasetRepo::find(pool, id, DatasetType::RawData).await?;
    let unprocessed_tar_file_ids =
        Cfmm2tarOutputRepo::list_not_in_dataset(pool, id, raw_dataset.map(|d| d.id))
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
    let tar2bids_outputs = Tar2bidsOutputRepo::list_for_study(pool, id).await?;

    let dataset_tree = match &study.dataset_content {
        Some(content) => match serde_json::from_value::<DirTree>(content.clone()) {
            Ok(tree) => Some(tree.render()),
            Err(e) => {
                tracing::warn!(study_id = id, error = %e, "Unreadable dataset content");
                None
            }
        },
        None => None,
    };

    let cfmm2tar_in_progress = TaskRepo::find_in_progress(pool, id, &CFMM2TAR_TASK_TYPES)
        .await?
        .is_some();
    let tar2bids_in_progress = TaskRepo::find_in_progress(pool, id, &TAR2BIDS_TASK_TYPES)
        .await?
        .is_some();
    let archive_in_progress = TaskRepo::find_in_progress(pool, id, &[ARCHIVE_RAW_DATA])
        .await?
        .is_some();

    Ok(Json(DataResponse {
        data: StudyDetail {
            study,
            tasks: tasks.into_iter().map(TaskResponse::from).collect(),
            cfmm2tar_outputs,
            unprocessed_tar_file_ids,
            tar2bids_outputs,
            dataset_tree,
            cfmm2tar_in_progress,
            tar2bids_in_progress,
            archive_in_progress,
        },
    }))
}

/// GET /api/v1/studies/{id}/demographics
pub async fn get_demographics(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<StudyDemographics>>> {
    let study = find_visible_study(&state, &auth, id).await?;
    Ok(Json(DataResponse { data: study.into() }))
}

async fn config_response(state: &AppState, study: Study) -> AppResult<StudyConfigResponse> {
    let pool = &state.pool;
    let (included, excluded): (Vec<_>, Vec<_>) =
        ExplicitPatientRepo::list_for_study(pool, study.id, None)
            .await?
            .into_iter()
            .partition(|p| p.included);
    let users_authorized = UserRepo::list_for_study(pool, study.id)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    let globus_usernames = GlobusUsernameRepo::list_for_study(pool, study.id).await?;
    let tools = state.pipeline.config();

    Ok(StudyConfigResponse {
        id: study.id,
        principal: study.principal,
        project_name: study.project_name,
        dataset_name: study.dataset_name,
        sample_date: study.sample_date,
        retrospective_data: study.retrospective_data,
        retrospective_start: study.retrospective_start,
        retrospective_end: study.retrospective_end,
        heuristic: study.heuristic,
        tar2bids_img: study.tar2bids_img,
        subj_expr: study.subj_expr,
        patient_str: study.patient_str,
        patient_name_re: study.patient_name_re,
        active: study.active,
        deface: study.deface,
        custom_bidsignore: study.custom_bidsignore,
        custom_ria_url: study.custom_ria_url,
        included,
        excluded,
        users_authorized,
        globus_usernames,
        available_heuristics: available_heuristics(&tools.heuristic_dir()),
        available_images: available_tar2bids_images(&tools.tar2bids_image_dir),
    })
}

/// GET /api/v1/studies/{id}/config
pub async fn get_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<StudyConfigResponse>>> {
    let study = find_visible_study(&state, &auth, id).await?;
    let data = config_response(&state, study).await?;
    Ok(Json(DataResponse { data }))
}

fn ensure_offered(field: &str, value: &str, choices: &[Choice]) -> Result<(), CoreError> {
    if choices.iter().any(|c| c.value == value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field}: '{value}' is not an available choice"
        )))
    }
}

/// PUT /api/v1/studies/{id}/config
///
/// Replace the study's configuration. Only admins may change the
/// authorized users, the `active` and `deface` flags, or the custom
/// `.bidsignore` and RIA URL.
pub async fn update_config(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateConfigRequest>,
) -> AppResult<Json<DataResponse<StudyConfigResponse>>> {
    let current = find_visible_study(&state, &auth, id).await?;
    if input.users_authorized.is_some() && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only admins may change authorized users".into(),
        )));
    }

    let config = input.config.normalized()?;
    let admin_only = config.admin_only_changes(&current);
    if !admin_only.is_empty() && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Only admins may change {}",
            admin_only.join(", ")
        ))));
    }
    let tools = state.pipeline.config();
    ensure_offered(
        "heuristic",
        &config.heuristic,
        &available_heuristics(&tools.heuristic_dir()),
    )?;
    if let Some(image) = &config.tar2bids_img {
        ensure_offered(
            "tar2bids_img",
            image,
            &available_tar2bids_images(&tools.tar2bids_image_dir),
        )?;
    }

    let pool = &state.pool;
    let study = StudyRepo::update_config(pool, id, &config)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Study",
            id,
        }))?;

    if let Some(user_ids) = &input.users_authorized {
        StudyRepo::set_authorized_users(pool, id, user_ids).await?;
    }
    if input.included_uids.is_some() || input.excluded_uids.is_some() {
        let current = ExplicitPatientRepo::list_for_study(pool, id, None).await?;
        let uids_of = |included: bool| -> Vec<String> {
            current
                .iter()
                .filter(|p| p.included == included)
                .map(|p| p.study_instance_uid.clone())
                .collect()
        };
        let kept_included = input.included_uids.clone().unwrap_or_else(|| uids_of(true));
        let kept_excluded = input.excluded_uids.clone().unwrap_or_else(|| uids_of(false));
        let removed = ExplicitPatientRepo::retain(pool, id, &kept_included, &kept_excluded).await?;
        tracing::debug!(study_id = id, removed, "Explicit patients pruned");
    }
    if let Some(usernames) = &input.globus_usernames {
        let usernames: Vec<String> = usernames
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        GlobusUsernameRepo::replace_for_study(pool, id, &usernames).await?;
    }

    tracing::info!(study_id = id, user_id = auth.user_id, "Study config updated");
    let data = config_response(&state, study).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/studies/{id}/dicom/{method}
///
/// Search the DICOM server for the study's scans. `method` is `both`,
/// `date` (sample date only) or `description` (`Principal^Project` only).
/// Explicit inclusions are always listed and exclusions never are.
pub async fn query_dicom(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, method)): Path<(DbId, String)>,
) -> AppResult<Json<DataResponse<Vec<StudyMetadata>>>> {
    let study = find_visible_study(&state, &auth, id).await?;
    let method = DicomQueryMethod::parse(&method).ok_or(AppError::Core(CoreError::NotFound {
        entity: "DICOM query method",
        id,
    }))?;

    let date = if method.uses_date() {
        Some(study.sample_date.ok_or(AppError::Core(CoreError::NotFound {
            entity: "Sample date for study",
            id,
        }))?)
    } else {
        None
    };
    let description = method.uses_description().then(|| study.description());

    let explicit = ExplicitPatientRepo::list_for_study(&state.pool, id, None).await?;
    let mut records = get_study_records(
        &state.pipeline.dcm4che(),
        &study,
        &explicit,
        date,
        description.as_deref(),
    )
    .await?;
    records.sort_by(|a, b| a.patient_name.cmp(&b.patient_name));
    Ok(Json(DataResponse { data: records }))
}

/// POST /api/v1/studies/{id}/exclusions
///
/// Record DICOM studies to exclude from or include in the study's
/// records. Exclusions win over existing inclusions of the same UID.
/// Returns the study's explicit patients.
pub async fn update_exclusions(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ExclusionsRequest>,
) -> AppResult<Json<DataResponse<Vec<ExplicitPatient>>>> {
    find_visible_study(&state, &auth, id).await?;
    if input
        .excluded
        .iter()
        .chain(&input.included)
        .any(|p| p.study_instance_uid.trim().is_empty())
    {
        return Err(AppError::BadRequest(
            "study_instance_uid must not be empty".into(),
        ));
    }

    let pool = &state.pool;
    for patient in &input.excluded {
        ExplicitPatientRepo::exclude(pool, id, patient).await?;
    }
    for patient in &input.included {
        if ExplicitPatientRepo::include(pool, id, patient).await?.is_none() {
            tracing::debug!(
                study_id = id,
                uid = %patient.study_instance_uid,
                "UID already recorded, not included",
            );
        }
    }

    let patients = ExplicitPatientRepo::list_for_study(pool, id, None).await?;
    Ok(Json(DataResponse { data: patients }))
}
