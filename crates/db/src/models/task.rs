//! Background task model and DTOs.

use autobids_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{StatusId, TaskStatus};

/// Maximum stored length of a task error message, in characters.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 128;

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub task_type: String,
    pub description: Option<String>,
    pub user_id: Option<DbId>,
    pub study_id: Option<DbId>,
    pub status_id: StatusId,
    pub parameters: serde_json::Value,
    pub progress_percent: i16,
    pub error_message: Option<String>,
    pub log: String,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Task {
    pub fn status(&self) -> Option<TaskStatus> {
        TaskStatus::from_id(self.status_id)
    }

    /// Finished, successfully or not.
    pub fn complete(&self) -> bool {
        self.status().is_some_and(TaskStatus::is_terminal)
    }

    pub fn success(&self) -> bool {
        self.status() == Some(TaskStatus::Completed)
    }
}

/// Task view returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: DbId,
    pub task_type: String,
    pub description: Option<String>,
    pub study_id: Option<DbId>,
    pub status: &'static str,
    pub complete: bool,
    pub success: bool,
    pub progress_percent: i16,
    pub error_message: Option<String>,
    pub log: String,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            status: task.status().map_or("unknown", TaskStatus::name),
            complete: task.complete(),
            success: task.success(),
            id: task.id,
            task_type: task.task_type,
            description: task.description,
            study_id: task.study_id,
            progress_percent: task.progress_percent,
            error_message: task.error_message,
            log: task.log,
            submitted_at: task.submitted_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// DTO for enqueueing a task.
#[derive(Debug, Clone)]
pub struct SubmitTask {
    pub task_type: String,
    pub description: Option<String>,
    pub user_id: Option<DbId>,
    pub study_id: Option<DbId>,
    pub parameters: serde_json::Value,
}

/// Truncate an error message to the stored maximum on a char boundary.
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
