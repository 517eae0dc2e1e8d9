use autobids_core::types::DbId;
use autobids_db::models::notification::TASK_PROGRESS;
use autobids_db::models::task::Task;
use autobids_db::repositories::{NotificationRepo, TaskRepo};
use sqlx::PgPool;

/// Progress, log and status updates for the task being executed.
pub struct TaskContext<'a> {
    pool: &'a PgPool,
    pub task_id: DbId,
    pub user_id: Option<DbId>,
}

impl<'a> TaskContext<'a> {
    pub fn new(pool: &'a PgPool, task: &Task) -> Self {
        Self {
            pool,
            task_id: task.id,
            user_id: task.user_id,
        }
    }

    /// Record progress and notify the submitting user. 100 completes the
    /// task successfully.
    pub async fn set_progress(&self, percent: i16) -> Result<(), sqlx::Error> {
        TaskRepo::update_progress(self.pool, self.task_id, percent).await?;
        if let Some(user_id) = self.user_id {
            NotificationRepo::upsert(
                self.pool,
                user_id,
                TASK_PROGRESS,
                &serde_json::json!({ "task_id": self.task_id, "progress": percent }),
            )
            .await?;
        }
        if percent >= 100 {
            TaskRepo::complete(self.pool, self.task_id).await?;
        }
        Ok(())
    }

    /// Mark the task failed.
    pub async fn set_error(&self, message: &str) -> Result<(), sqlx::Error> {
        tracing::warn!(task_id = self.task_id, error = message, "Task marked failed");
        TaskRepo::fail(self.pool, self.task_id, message).await
    }

    pub async fn append_log(&self, text: &str) -> Result<(), sqlx::Error> {
        TaskRepo::append_log(self.pool, self.task_id, text).await
    }
}
