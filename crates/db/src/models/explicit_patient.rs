//! Explicitly included or excluded DICOM studies.

use autobids_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `explicit_patients` table.
///
/// `included = true` forces the study into a study's records even when the
/// description search would miss it; `false` removes it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExplicitPatient {
    pub id: DbId,
    pub study_id: DbId,
    pub study_instance_uid: String,
    pub patient_name: Option<String>,
    pub dicom_study_id: Option<String>,
    pub included: bool,
    pub created_at: Timestamp,
}

/// DTO for inserting an explicit patient.
#[derive(Debug, Clone, Deserialize)]
pub struct NewExplicitPatient {
    pub study_instance_uid: String,
    pub patient_name: Option<String>,
    pub dicom_study_id: Option<String>,
}
