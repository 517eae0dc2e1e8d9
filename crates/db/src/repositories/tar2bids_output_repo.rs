//! Repository for `tar2bids_outputs` and the `tar2bids_runs` join table.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::output::{Tar2bidsOutput, Tar2bidsOutputWithInputs};

/// Column list for `tar2bids_outputs` queries.
const COLUMNS: &str = "id, study_id, bids_dir, heuristic, created_at";

/// Provides bookkeeping for tar2bids runs.
pub struct Tar2bidsOutputRepo;

impl Tar2bidsOutputRepo {
    /// Record a tar2bids run and the tar files it consumed.
    pub async fn create(
        pool: &PgPool,
        study_id: DbId,
        bids_dir: Option<&str>,
        heuristic: &str,
        cfmm2tar_output_ids: &[DbId],
    ) -> Result<Tar2bidsOutput, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let query = format!(
            "INSERT INTO tar2bids_outputs (study_id, bids_dir, heuristic)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        let output = sqlx::query_as::<_, Tar2bidsOutput>(&query)
            .bind(study_id)
            .bind(bids_dir)
            .bind(heuristic)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO tar2bids_runs (cfmm2tar_output_id, tar2bids_output_id)
             SELECT DISTINCT unnest($1::BIGINT[]), $2",
        )
        .bind(cfmm2tar_output_ids)
        .bind(output.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(output)
    }

    /// List a study's tar2bids outputs with their input tar file IDs.
    pub async fn list_for_study(
        pool: &PgPool,
        study_id: DbId,
    ) -> Result<Vec<Tar2bidsOutputWithInputs>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tar2bids_outputs WHERE study_id = $1 ORDER BY created_at DESC"
        );
        let outputs = sqlx::query_as::<_, Tar2bidsOutput>(&query)
            .bind(study_id)
            .fetch_all(pool)
            .await?;
        let links: Vec<(DbId, DbId)> = sqlx::query_as(
            "SELECT r.tar2bids_output_id, r.cfmm2tar_output_id
             FROM tar2bids_runs r
             JOIN tar2bids_outputs t ON t.id = r.tar2bids_output_id
             WHERE t.study_id = $1
             ORDER BY r.cfmm2tar_output_id ASC",
        )
        .bind(study_id)
        .fetch_all(pool)
        .await?;

        Ok(outputs
            .into_iter()
            .map(|output| {
                let cfmm2tar_output_ids = links
                    .iter()
                    .filter(|(t2b, _)| *t2b == output.id)
                    .map(|(_, tar)| *tar)
                    .collect();
                Tar2bidsOutputWithInputs {
                    output,
                    cfmm2tar_output_ids,
                }
            })
            .collect())
    }

    /// Delete the given outputs of a study. Returns the number removed.
    pub async fn delete_for_study(
        pool: &PgPool,
        study_id: DbId,
        ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM tar2bids_outputs WHERE study_id = $1 AND id = ANY($2)")
                .bind(study_id)
                .bind(ids)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
