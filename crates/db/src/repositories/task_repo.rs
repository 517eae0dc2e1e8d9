//! Repository for the `tasks` table.
//!
//! Uses `TaskStatus` from `models::status` for every status transition.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::status::TaskStatus;
use crate::models::task::{truncate_error, SubmitTask, Task};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, task_type, description, user_id, study_id, status_id, parameters, \
    progress_percent, error_message, log, submitted_at, started_at, completed_at, updated_at";

/// Provides queue operations for background tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Enqueue a pending task.
    pub async fn submit(pool: &PgPool, input: &SubmitTask) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (task_type, description, user_id, study_id, status_id, parameters) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(&input.task_type)
            .bind(&input.description)
            .bind(input.user_id)
            .bind(input.study_id)
            .bind(TaskStatus::Pending.id())
            .bind(&input.parameters)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a study's tasks, newest first.
    pub async fn list_for_study(pool: &PgPool, study_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks WHERE study_id = $1 ORDER BY submitted_at DESC, id DESC"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(study_id)
            .fetch_all(pool)
            .await
    }

    /// Pending or running task of one of `task_types` for a study, if any.
    pub async fn find_in_progress(
        pool: &PgPool,
        study_id: DbId,
        task_types: &[&str],
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE study_id = $1 AND task_type = ANY($2) AND status_id IN ($3, $4) \
             ORDER BY submitted_at ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(study_id)
            .bind(task_types)
            .bind(TaskStatus::Pending.id())
            .bind(TaskStatus::Running.id())
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest pending task.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET status_id = $1, started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM tasks \
                 WHERE status_id = $2 \
                 ORDER BY submitted_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(TaskStatus::Running.id())
            .bind(TaskStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Update the progress percentage.
    pub async fn update_progress(pool: &PgPool, id: DbId, percent: i16) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET progress_percent = $2 WHERE id = $1")
            .bind(id)
            .bind(percent.clamp(0, 100))
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Append text to the task log.
    pub async fn append_log(pool: &PgPool, id: DbId, text: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET log = log || $2 WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark a task as successfully completed, with progress at 100.
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks \
             SET status_id = $2, progress_percent = 100, error_message = NULL, \
                 completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a task as failed. The message is truncated to the stored maximum.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(TaskStatus::Failed.id())
        .bind(truncate_error(error))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Fail a task only if it has not already reached a terminal status.
    ///
    /// Returns `true` if the task was still incomplete.
    pub async fn fail_if_incomplete(
        pool: &PgPool,
        id: DbId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($4, $2)",
        )
        .bind(id)
        .bind(TaskStatus::Failed.id())
        .bind(truncate_error(error))
        .bind(TaskStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
