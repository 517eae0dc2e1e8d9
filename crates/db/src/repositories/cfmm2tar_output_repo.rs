//! Repository for `cfmm2tar_outputs` and their dataset links.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::output::{Cfmm2tarOutput, NewCfmm2tarOutput};

/// Column list for `cfmm2tar_outputs` queries.
const COLUMNS: &str = "id, study_id, tar_file, uid, scan_date, created_at";

/// Provides bookkeeping for retrieved tar files.
pub struct Cfmm2tarOutputRepo;

impl Cfmm2tarOutputRepo {
    /// Record a retrieved tar file and link it to the dataset holding it.
    pub async fn create(
        pool: &PgPool,
        input: &NewCfmm2tarOutput,
        dataset_id: DbId,
    ) -> Result<Cfmm2tarOutput, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO cfmm2tar_outputs (study_id, tar_file, uid, scan_date)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        let output = sqlx::query_as::<_, Cfmm2tarOutput>(&query)
            .bind(input.study_id)
            .bind(&input.tar_file)
            .bind(&input.uid)
            .bind(input.scan_date)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO cfmm2tar_output_datasets (cfmm2tar_output_id, datalad_dataset_id)
             VALUES ($1, $2)",
        )
        .bind(output.id)
        .bind(dataset_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(output)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Cfmm2tarOutput>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM cfmm2tar_outputs WHERE id = $1");
        sqlx::query_as::<_, Cfmm2tarOutput>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a study's tar files ordered by file name.
    pub async fn list_for_study(
        pool: &PgPool,
        study_id: DbId,
    ) -> Result<Vec<Cfmm2tarOutput>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cfmm2tar_outputs WHERE study_id = $1 ORDER BY tar_file ASC"
        );
        sqlx::query_as::<_, Cfmm2tarOutput>(&query)
            .bind(study_id)
            .fetch_all(pool)
            .await
    }

    /// Fetch the given outputs, restricted to one study.
    pub async fn list_by_ids(
        pool: &PgPool,
        study_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<Cfmm2tarOutput>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cfmm2tar_outputs
             WHERE study_id = $1 AND id = ANY($2)
             ORDER BY tar_file ASC"
        );
        sqlx::query_as::<_, Cfmm2tarOutput>(&query)
            .bind(study_id)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// StudyInstanceUIDs already retrieved for a study.
    pub async fn uids_for_study(pool: &PgPool, study_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT uid FROM cfmm2tar_outputs WHERE study_id = $1")
            .bind(study_id)
            .fetch_all(pool)
            .await
    }

    /// Tar files of a study that are not yet part of `dataset_id`.
    pub async fn list_not_in_dataset(
        pool: &PgPool,
        study_id: DbId,
        dataset_id: Option<DbId>,
    ) -> Result<Vec<Cfmm2tarOutput>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM cfmm2tar_outputs o
             WHERE o.study_id = $1
               AND NOT EXISTS (
                   SELECT 1 FROM cfmm2tar_output_datasets d
                   WHERE d.cfmm2tar_output_id = o.id AND d.datalad_dataset_id = $2)
             ORDER BY o.tar_file ASC"
        );
        sqlx::query_as::<_, Cfmm2tarOutput>(&query)
            .bind(study_id)
            .bind(dataset_id)
            .fetch_all(pool)
            .await
    }

    /// Link an output to another dataset, e.g. once converted to raw BIDS.
    pub async fn link_dataset(
        pool: &PgPool,
        output_id: DbId,
        dataset_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO cfmm2tar_output_datasets (cfmm2tar_output_id, datalad_dataset_id)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(output_id)
        .bind(dataset_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete an output row. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cfmm2tar_outputs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
