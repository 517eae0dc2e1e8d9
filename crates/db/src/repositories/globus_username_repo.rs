//! Repository for the `globus_usernames` table.

use autobids_core::types::DbId;
use sqlx::PgPool;

/// Globus identities granted access to a study's data.
pub struct GlobusUsernameRepo;

impl GlobusUsernameRepo {
    pub async fn list_for_study(pool: &PgPool, study_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT username FROM globus_usernames WHERE study_id = $1 ORDER BY username ASC",
        )
        .bind(study_id)
        .fetch_all(pool)
        .await
    }

    /// Replace a study's Globus usernames.
    pub async fn replace_for_study(
        pool: &PgPool,
        study_id: DbId,
        usernames: &[String],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM globus_usernames WHERE study_id = $1")
            .bind(study_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO globus_usernames (study_id, username)
             SELECT DISTINCT $1, unnest($2::TEXT[])",
        )
        .bind(study_id)
        .bind(usernames)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
