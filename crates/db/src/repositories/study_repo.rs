//! Repository for the `studies` and `study_access` tables.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::study::{CreateStudy, Study, UpdateStudyConfig};

/// Column list for `studies` queries.
const COLUMNS: &str = "\
    id, submitter_name, submitter_email, status, scanner, scan_number, study_type, \
    familiarity_bids, familiarity_bidsapp, familiarity_python, familiarity_linux, \
    familiarity_bash, familiarity_hpc, familiarity_openneuro, familiarity_cbrain, \
    principal, project_name, dataset_name, sample_date, \
    retrospective_data, retrospective_start, retrospective_end, consent, comment, submitted_at, \
    active, heuristic, tar2bids_img, patient_str, subj_expr, patient_name_re, deface, \
    custom_bidsignore, custom_ria_url, dataset_content, updated_at";

/// Provides CRUD and access-control queries for studies.
pub struct StudyRepo;

impl StudyRepo {
    /// Insert a new study request, returning the created row.
    ///
    /// A duplicate principal/project pair violates
    /// `uq_studies_principal_project`.
    pub async fn create(pool: &PgPool, input: &CreateStudy) -> Result<Study, sqlx::Error> {
        let query = format!(
            "INSERT INTO studies (
                submitter_name, submitter_email, status, scanner, scan_number, study_type,
                familiarity_bids, familiarity_bidsapp, familiarity_python, familiarity_linux,
                familiarity_bash, familiarity_hpc, familiarity_openneuro, familiarity_cbrain,
                principal, project_name, dataset_name, sample_date,
                retrospective_data, retrospective_start, retrospective_end, consent, comment)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                     $15, $16, $17, $18, $19, $20, $21, $22, $23)
             RETURNING {COLUMNS}"
        );
        let mut q = sqlx::query_as::<_, Study>(&query)
            .bind(&input.submitter_name)
            .bind(&input.submitter_email)
            .bind(&input.status)
            .bind(&input.scanner)
            .bind(input.scan_number)
            .bind(input.study_type);
        for level in &input.familiarity {
            q = q.bind(level);
        }
        q.bind(&input.principal)
            .bind(&input.project_name)
            .bind(&input.dataset_name)
            .bind(input.sample_date)
            .bind(input.retrospective_data)
            .bind(input.retrospective_start)
            .bind(input.retrospective_end)
            .bind(input.consent)
            .bind(&input.comment)
            .fetch_one(pool)
            .await
    }

    /// Find a study by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Study>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM studies WHERE id = $1");
        sqlx::query_as::<_, Study>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a study the given user may see. Admins see every study.
    pub async fn find_visible(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        is_admin: bool,
    ) -> Result<Option<Study>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM studies
             WHERE id = $1
               AND ($3 OR EXISTS (
                   SELECT 1 FROM study_access sa WHERE sa.study_id = studies.id AND sa.user_id = $2))"
        );
        sqlx::query_as::<_, Study>(&query)
            .bind(id)
            .bind(user_id)
            .bind(is_admin)
            .fetch_optional(pool)
            .await
    }

    /// List studies visible to a user, newest first.
    pub async fn list_visible(
        pool: &PgPool,
        user_id: DbId,
        is_admin: bool,
    ) -> Result<Vec<Study>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM studies
             WHERE $2 OR EXISTS (
                 SELECT 1 FROM study_access sa WHERE sa.study_id = studies.id AND sa.user_id = $1)
             ORDER BY submitted_at DESC, id DESC"
        );
        sqlx::query_as::<_, Study>(&query)
            .bind(user_id)
            .bind(is_admin)
            .fetch_all(pool)
            .await
    }

    /// List studies a specific user has been granted access to.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Study>, sqlx::Error> {
        Self::list_visible(pool, user_id, false).await
    }

    /// List studies with `active = true`, oldest first.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Study>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM studies WHERE active ORDER BY id ASC");
        sqlx::query_as::<_, Study>(&query).fetch_all(pool).await
    }

    /// Replace the study's configuration. Returns `None` if it does not exist.
    /// `None` in the optional admin fields keeps the stored value.
    pub async fn update_config(
        pool: &PgPool,
        id: DbId,
        input: &UpdateStudyConfig,
    ) -> Result<Option<Study>, sqlx::Error> {
        let query = format!(
            "UPDATE studies SET
                principal = $2,
                project_name = $3,
                dataset_name = $4,
                sample_date = $5,
                retrospective_data = $6,
                retrospective_start = $7,
                retrospective_end = $8,
                heuristic = $9,
                tar2bids_img = $10,
                subj_expr = $11,
                patient_str = $12,
                patient_name_re = $13,
                active = COALESCE($14, active),
                deface = COALESCE($15, deface),
                custom_bidsignore = CASE WHEN $16::TEXT IS NULL THEN custom_bidsignore
                                         ELSE NULLIF($16, '') END,
                custom_ria_url = CASE WHEN $17::TEXT IS NULL THEN custom_ria_url
                                      ELSE NULLIF($17, '') END
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Study>(&query)
            .bind(id)
            .bind(&input.principal)
            .bind(&input.project_name)
            .bind(&input.dataset_name)
            .bind(input.sample_date)
            .bind(input.retrospective_data)
            .bind(input.retrospective_start)
            .bind(input.retrospective_end)
            .bind(&input.heuristic)
            .bind(&input.tar2bids_img)
            .bind(&input.subj_expr)
            .bind(&input.patient_str)
            .bind(&input.patient_name_re)
            .bind(input.active)
            .bind(input.deface)
            .bind(&input.custom_bidsignore)
            .bind(&input.custom_ria_url)
            .fetch_optional(pool)
            .await
    }

    /// Store the rendered directory tree of the raw dataset.
    pub async fn set_dataset_content(
        pool: &PgPool,
        id: DbId,
        content: Option<&serde_json::Value>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE studies SET dataset_content = $2 WHERE id = $1")
            .bind(id)
            .bind(content)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Grant a user access to a study. Granting twice is a no-op.
    pub async fn grant_access(
        pool: &PgPool,
        study_id: DbId,
        user_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO study_access (user_id, study_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(study_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Revoke a user's access. Returns `true` if access had been granted.
    pub async fn revoke_access(
        pool: &PgPool,
        study_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM study_access WHERE user_id = $1 AND study_id = $2")
            .bind(user_id)
            .bind(study_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the set of users authorized on a study.
    pub async fn set_authorized_users(
        pool: &PgPool,
        study_id: DbId,
        user_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM study_access WHERE study_id = $1")
            .bind(study_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO study_access (user_id, study_id)
             SELECT u.id, $1 FROM users u WHERE u.id = ANY($2)",
        )
        .bind(study_id)
        .bind(user_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}
