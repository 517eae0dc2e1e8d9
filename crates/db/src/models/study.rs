//! Study entity model and DTOs.

use autobids_core::error::CoreError;
use autobids_core::study::{
    validate_patient_name_re, validate_retrospective_range, ReportRow, StudyRequest,
};
use autobids_core::types::{DbId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `studies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Study {
    pub id: DbId,
    pub submitter_name: String,
    pub submitter_email: String,
    pub status: String,
    pub scanner: String,
    pub scan_number: i32,
    pub study_type: bool,
    pub familiarity_bids: String,
    pub familiarity_bidsapp: String,
    pub familiarity_python: String,
    pub familiarity_linux: String,
    pub familiarity_bash: String,
    pub familiarity_hpc: String,
    pub familiarity_openneuro: String,
    pub familiarity_cbrain: String,
    pub principal: String,
    pub project_name: String,
    pub dataset_name: String,
    pub sample_date: Option<NaiveDate>,
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub consent: bool,
    pub comment: Option<String>,
    pub submitted_at: Timestamp,
    pub active: bool,
    pub heuristic: String,
    pub tar2bids_img: Option<String>,
    pub patient_str: String,
    pub subj_expr: String,
    pub patient_name_re: Option<String>,
    pub deface: bool,
    pub custom_bidsignore: Option<String>,
    pub custom_ria_url: Option<String>,
    pub dataset_content: Option<serde_json::Value>,
    pub updated_at: Timestamp,
}

impl Study {
    /// `Principal^Project`, the study description searched on the DICOM
    /// server.
    pub fn description(&self) -> String {
        format!("{}^{}", self.principal, self.project_name)
    }

    pub fn report_row(&self) -> ReportRow<'_> {
        ReportRow {
            submitter_name: &self.submitter_name,
            submitter_email: &self.submitter_email,
            status: &self.status,
            scanner: &self.scanner,
            scan_number: self.scan_number,
            study_type: self.study_type,
            familiarity: [
                &self.familiarity_bids,
                &self.familiarity_bidsapp,
                &self.familiarity_python,
                &self.familiarity_linux,
                &self.familiarity_bash,
                &self.familiarity_hpc,
                &self.familiarity_openneuro,
                &self.familiarity_cbrain,
            ],
            principal: &self.principal,
            project_name: &self.project_name,
            dataset_name: &self.dataset_name,
            sample_date: self.sample_date,
            retrospective_data: self.retrospective_data,
            retrospective_start: self.retrospective_start,
            retrospective_end: self.retrospective_end,
            consent: self.consent,
            comment: self.comment.as_deref().unwrap_or(""),
        }
    }
}

/// Submitter answers shown on the demographics page.
#[derive(Debug, Clone, Serialize)]
pub struct StudyDemographics {
    pub id: DbId,
    pub submitter_name: String,
    pub submitter_email: String,
    pub status: String,
    pub scanner: String,
    pub scan_number: i32,
    pub study_type: bool,
    pub familiarity_bids: String,
    pub familiarity_bidsapp: String,
    pub familiarity_python: String,
    pub familiarity_linux: String,
    pub familiarity_bash: String,
    pub familiarity_hpc: String,
    pub familiarity_openneuro: String,
    pub familiarity_cbrain: String,
    pub sample_date: Option<NaiveDate>,
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub consent: bool,
    pub comment: Option<String>,
    pub submitted_at: Timestamp,
}

impl From<Study> for StudyDemographics {
    fn from(study: Study) -> Self {
        Self {
            id: study.id,
            submitter_name: study.submitter_name,
            submitter_email: study.submitter_email,
            status: study.status,
            scanner: study.scanner,
            scan_number: study.scan_number,
            study_type: study.study_type,
            familiarity_bids: study.familiarity_bids,
            familiarity_bidsapp: study.familiarity_bidsapp,
            familiarity_python: study.familiarity_python,
            familiarity_linux: study.familiarity_linux,
            familiarity_bash: study.familiarity_bash,
            familiarity_hpc: study.familiarity_hpc,
            familiarity_openneuro: study.familiarity_openneuro,
            familiarity_cbrain: study.familiarity_cbrain,
            sample_date: study.sample_date,
            retrospective_data: study.retrospective_data,
            retrospective_start: study.retrospective_start,
            retrospective_end: study.retrospective_end,
            consent: study.consent,
            comment: study.comment,
            submitted_at: study.submitted_at,
        }
    }
}

/// DTO for inserting a study from a validated request.
#[derive(Debug, Clone)]
pub struct CreateStudy {
    pub submitter_name: String,
    pub submitter_email: String,
    pub status: String,
    pub scanner: String,
    pub scan_number: i32,
    pub study_type: bool,
    pub familiarity: [String; 8],
    pub principal: String,
    pub project_name: String,
    pub dataset_name: String,
    pub sample_date: Option<NaiveDate>,
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub consent: bool,
    pub comment: Option<String>,
}

impl CreateStudy {
    /// Validate a submitted request and resolve its defaults.
    pub fn from_request(request: &StudyRequest) -> Result<Self, CoreError> {
        request.check()?;
        let (retrospective_start, retrospective_end) = request.retrospective_range();
        Ok(Self {
            submitter_name: request.name.trim().to_string(),
            submitter_email: request.email.trim().to_string(),
            status: request.status.clone(),
            scanner: request.scanner.clone(),
            scan_number: request.scan_number,
            study_type: request.study_type,
            familiarity: [
                request.familiarity_bids.clone(),
                request.familiarity_bidsapp.clone(),
                request.familiarity_python.clone(),
                request.familiarity_linux.clone(),
                request.familiarity_bash.clone(),
                request.familiarity_hpc.clone(),
                request.familiarity_openneuro.clone(),
                request.familiarity_cbrain.clone(),
            ],
            principal: request.resolved_principal()?,
            project_name: request.project_name.trim().to_string(),
            dataset_name: request.resolved_dataset_name(),
            sample_date: request.sample_date,
            retrospective_data: request.retrospective_data,
            retrospective_start,
            retrospective_end,
            consent: request.consent,
            comment: request.comment.clone().filter(|c| !c.trim().is_empty()),
        })
    }
}

/// DTO for `PUT /studies/{id}/config`. Replaces the whole configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStudyConfig {
    pub principal: String,
    pub project_name: String,
    pub dataset_name: String,
    pub sample_date: Option<NaiveDate>,
    #[serde(default)]
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub heuristic: String,
    pub tar2bids_img: Option<String>,
    pub subj_expr: String,
    pub patient_str: String,
    pub patient_name_re: Option<String>,
    /// The fields below are left untouched when absent. An empty string
    /// clears the custom `.bidsignore` or RIA URL.
    pub active: Option<bool>,
    pub deface: Option<bool>,
    pub custom_bidsignore: Option<String>,
    pub custom_ria_url: Option<String>,
}

impl UpdateStudyConfig {
    /// Reject invalid values and blank out fields that should not be
    /// stored.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        for (field, value) in [
            ("principal", &self.principal),
            ("project_name", &self.project_name),
            ("dataset_name", &self.dataset_name),
            ("heuristic", &self.heuristic),
            ("subj_expr", &self.subj_expr),
            ("patient_str", &self.patient_str),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{field}: must not be empty")));
            }
        }
        if self.retrospective_data {
            validate_retrospective_range(self.retrospective_start, self.retrospective_end)?;
        } else {
            self.retrospective_start = None;
            self.retrospective_end = None;
        }
        self.patient_name_re = self.patient_name_re.filter(|re| !re.is_empty());
        if let Some(pattern) = &self.patient_name_re {
            validate_patient_name_re(pattern)?;
        }
        self.tar2bids_img = self.tar2bids_img.filter(|img| !img.is_empty());
        self.custom_bidsignore = self.custom_bidsignore.map(blank_to_empty);
        self.custom_ria_url = self.custom_ria_url.map(blank_to_empty);
        Ok(self)
    }

    /// Names of the admin-only fields this update would change on `study`.
    pub fn admin_only_changes(&self, study: &Study) -> Vec<&'static str> {
        let differs = |new: &Option<String>, current: &Option<String>| {
            new.as_ref()
                .is_some_and(|v| (!v.is_empty()).then_some(v) != current.as_ref())
        };
        let mut changed = Vec::new();
        if self.active.is_some_and(|v| v != study.active) {
            changed.push("active");
        }
        if self.deface.is_some_and(|v| v != study.deface) {
            changed.push("deface");
        }
        if differs(&self.custom_bidsignore, &study.custom_bidsignore) {
            changed.push("custom_bidsignore");
        }
        if differs(&self.custom_ria_url, &study.custom_ria_url) {
            changed.push("custom_ria_url");
        }
        changed
    }
}

fn blank_to_empty(value: String) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        value
    }
}
