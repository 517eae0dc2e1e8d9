//! Repository for the `datalad_datasets` table.

use autobids_core::naming::{ria_alias, DatasetType};
use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::dataset::DataladDataset;

/// Column list for `datalad_datasets` queries.
const COLUMNS: &str = "id, study_id, dataset_type, ria_alias, custom_ria_url, created_at";

/// Provides lookup and creation of a study's DataLad datasets.
pub struct DataladDatasetRepo;

impl DataladDatasetRepo {
    /// Find a study's dataset of the given type.
    pub async fn find(
        pool: &PgPool,
        study_id: DbId,
        dataset_type: DatasetType,
    ) -> Result<Option<DataladDataset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM datalad_datasets WHERE study_id = $1 AND dataset_type = $2"
        );
        sqlx::query_as::<_, DataladDataset>(&query)
            .bind(study_id)
            .bind(dataset_type.id())
            .fetch_optional(pool)
            .await
    }

    /// Insert a dataset record with its derived RIA alias.
    ///
    /// Returns `None` when one already exists for the study and type.
    pub async fn create(
        pool: &PgPool,
        study_id: DbId,
        dataset_type: DatasetType,
        custom_ria_url: Option<&str>,
    ) -> Result<Option<DataladDataset>, sqlx::Error> {
        let query = format!(
            "INSERT INTO datalad_datasets (study_id, dataset_type, ria_alias, custom_ria_url)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT uq_datalad_datasets_study_type DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DataladDataset>(&query)
            .bind(study_id)
            .bind(dataset_type.id())
            .bind(ria_alias(study_id, dataset_type))
            .bind(custom_ria_url)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the dataset record, creating it if missing.
    ///
    /// The flag is `true` when the record was created by this call.
    pub async fn ensure(
        pool: &PgPool,
        study_id: DbId,
        dataset_type: DatasetType,
        custom_ria_url: Option<&str>,
    ) -> Result<(DataladDataset, bool), sqlx::Error> {
        if let Some(created) = Self::create(pool, study_id, dataset_type, custom_ria_url).await? {
            return Ok((created, true));
        }
        let existing = Self::find(pool, study_id, dataset_type)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((existing, false))
    }

    /// Delete a dataset record. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM datalad_datasets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
