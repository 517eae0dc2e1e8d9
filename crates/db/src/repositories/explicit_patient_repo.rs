//! Repository for the `explicit_patients` table.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::explicit_patient::{ExplicitPatient, NewExplicitPatient};

/// Column list for `explicit_patients` queries.
const COLUMNS: &str =
    "id, study_id, study_instance_uid, patient_name, dicom_study_id, included, created_at";

/// Provides include/exclude bookkeeping for DICOM studies.
pub struct ExplicitPatientRepo;

impl ExplicitPatientRepo {
    /// List a study's explicit patients, optionally filtered by `included`.
    pub async fn list_for_study(
        pool: &PgPool,
        study_id: DbId,
        included: Option<bool>,
    ) -> Result<Vec<ExplicitPatient>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM explicit_patients
             WHERE study_id = $1 AND ($2::BOOLEAN IS NULL OR included = $2)
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ExplicitPatient>(&query)
            .bind(study_id)
            .bind(included)
            .fetch_all(pool)
            .await
    }

    /// Exclude a DICOM study, replacing any existing record for its UID.
    pub async fn exclude(
        pool: &PgPool,
        study_id: DbId,
        input: &NewExplicitPatient,
    ) -> Result<ExplicitPatient, sqlx::Error> {
        let query = format!(
            "INSERT INTO explicit_patients
                (study_id, study_instance_uid, patient_name, dicom_study_id, included)
             VALUES ($1, $2, $3, $4, FALSE)
             ON CONFLICT ON CONSTRAINT uq_explicit_patients_study_instance_uid DO UPDATE SET
                study_id = EXCLUDED.study_id,
                patient_name = EXCLUDED.patient_name,
                dicom_study_id = EXCLUDED.dicom_study_id,
                included = FALSE
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExplicitPatient>(&query)
            .bind(study_id)
            .bind(&input.study_instance_uid)
            .bind(&input.patient_name)
            .bind(&input.dicom_study_id)
            .fetch_one(pool)
            .await
    }

    /// Include a DICOM study unless any record for its UID already exists.
    ///
    /// Returns `None` when the UID was already recorded.
    pub async fn include(
        pool: &PgPool,
        study_id: DbId,
        input: &NewExplicitPatient,
    ) -> Result<Option<ExplicitPatient>, sqlx::Error> {
        let query = format!(
            "INSERT INTO explicit_patients
                (study_id, study_instance_uid, patient_name, dicom_study_id, included)
             VALUES ($1, $2, $3, $4, TRUE)
             ON CONFLICT ON CONSTRAINT uq_explicit_patients_study_instance_uid DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExplicitPatient>(&query)
            .bind(study_id)
            .bind(&input.study_instance_uid)
            .bind(&input.patient_name)
            .bind(&input.dicom_study_id)
            .fetch_optional(pool)
            .await
    }

    /// Drop explicit patients whose UID is not in the kept list for their
    /// kind. Returns the number of rows removed.
    pub async fn retain(
        pool: &PgPool,
        study_id: DbId,
        kept_included: &[String],
        kept_excluded: &[String],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM explicit_patients
             WHERE study_id = $1
               AND ((included AND NOT (study_instance_uid = ANY($2)))
                 OR (NOT included AND NOT (study_instance_uid = ANY($3))))",
        )
        .bind(study_id)
        .bind(kept_included)
        .bind(kept_excluded)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
