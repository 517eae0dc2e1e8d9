//! DataLad dataset and archive models.

use autobids_core::naming::DatasetType;
use autobids_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `datalad_datasets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataladDataset {
    pub id: DbId,
    pub study_id: DbId,
    pub dataset_type: i16,
    pub ria_alias: String,
    pub custom_ria_url: Option<String>,
    pub created_at: Timestamp,
}

impl DataladDataset {
    pub fn kind(&self) -> Option<DatasetType> {
        DatasetType::from_id(self.dataset_type)
    }
}

/// A row from the `dataset_archives` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DatasetArchive {
    pub id: DbId,
    pub dataset_id: DbId,
    pub parent_id: Option<DbId>,
    pub dataset_hexsha: String,
    pub commit_datetime: Timestamp,
    pub created_at: Timestamp,
}
