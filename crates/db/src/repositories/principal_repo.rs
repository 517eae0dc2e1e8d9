//! Repository for the `principals` table.

use sqlx::PgPool;

use crate::models::principal::Principal;

/// Provides access to the known principal investigator names.
pub struct PrincipalRepo;

impl PrincipalRepo {
    /// List every principal name alphabetically.
    pub async fn list(pool: &PgPool) -> Result<Vec<Principal>, sqlx::Error> {
        sqlx::query_as::<_, Principal>("SELECT id, name FROM principals ORDER BY name ASC")
            .fetch_all(pool)
            .await
    }

    /// Atomically replace the whole table with `names`.
    pub async fn replace_all(pool: &PgPool, names: &[String]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM principals")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            "INSERT INTO principals (name)
             SELECT DISTINCT unnest($1::TEXT[])",
        )
        .bind(names)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
