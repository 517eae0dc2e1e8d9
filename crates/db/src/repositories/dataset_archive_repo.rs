//! Repository for the `dataset_archives` table.

use autobids_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::dataset::DatasetArchive;

/// Column list for `dataset_archives` queries.
const COLUMNS: &str = "id, dataset_id, parent_id, dataset_hexsha, commit_datetime, created_at";

/// Provides archive bookkeeping for datasets.
pub struct DatasetArchiveRepo;

impl DatasetArchiveRepo {
    /// Record an uploaded archive of a dataset at the given commit.
    pub async fn create(
        pool: &PgPool,
        dataset_id: DbId,
        parent_id: Option<DbId>,
        dataset_hexsha: &str,
        commit_datetime: Timestamp,
    ) -> Result<DatasetArchive, sqlx::Error> {
        let query = format!(
            "INSERT INTO dataset_archives (dataset_id, parent_id, dataset_hexsha, commit_datetime)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DatasetArchive>(&query)
            .bind(dataset_id)
            .bind(parent_id)
            .bind(dataset_hexsha)
            .bind(commit_datetime)
            .fetch_one(pool)
            .await
    }

    /// Most recently recorded archive of a dataset.
    pub async fn latest_for_dataset(
        pool: &PgPool,
        dataset_id: DbId,
    ) -> Result<Option<DatasetArchive>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dataset_archives
             WHERE dataset_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, DatasetArchive>(&query)
            .bind(dataset_id)
            .fetch_optional(pool)
            .await
    }
}
