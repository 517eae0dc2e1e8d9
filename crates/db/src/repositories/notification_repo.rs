//! Repository for the `notifications` table.

use autobids_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::Notification;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, user_id, name, payload, created_at";

/// Provides per-user notification storage.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Add a notification, replacing any earlier one with the same name for
    /// the user.
    pub async fn upsert(
        pool: &PgPool,
        user_id: DbId,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (user_id, name, payload)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_notifications_user_name DO UPDATE SET
                payload = EXCLUDED.payload,
                created_at = NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(name)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// List a user's notifications, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
