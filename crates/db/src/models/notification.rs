//! Per-user notification model.

use autobids_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Notification name used for task progress updates.
pub const TASK_PROGRESS: &str = "task_progress";

/// A row from the `notifications` table. At most one row exists per
/// `(user_id, name)`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}
