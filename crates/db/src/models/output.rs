//! cfmm2tar and tar2bids output records.

use autobids_core::types::{DbId, Timestamp};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `cfmm2tar_outputs` table: one retrieved DICOM study.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cfmm2tarOutput {
    pub id: DbId,
    pub study_id: DbId,
    pub tar_file: String,
    pub uid: String,
    pub scan_date: NaiveDate,
    pub created_at: Timestamp,
}

/// DTO for recording a retrieved tar file.
#[derive(Debug, Clone)]
pub struct NewCfmm2tarOutput {
    pub study_id: DbId,
    pub tar_file: String,
    pub uid: String,
    pub scan_date: NaiveDate,
}

/// A row from the `tar2bids_outputs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tar2bidsOutput {
    pub id: DbId,
    pub study_id: DbId,
    pub bids_dir: Option<String>,
    pub heuristic: String,
    pub created_at: Timestamp,
}

/// A tar2bids output with the tar files that went into it.
#[derive(Debug, Clone, Serialize)]
pub struct Tar2bidsOutputWithInputs {
    #[serde(flatten)]
    pub output: Tar2bidsOutput,
    pub cfmm2tar_output_ids: Vec<DbId>,
}
