use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::database::models::{CreateNotificationInput, Notification};
use crate::error::AppError;

/// Side-effect sink for user-facing notifications. The core only creates
/// rows and deletes them by correlation key; it never reads them back.
#[derive(Clone)]
pub struct NotificationRelay {
    pool: SqlitePool,
}

impl NotificationRelay {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a notification inside the caller's transaction so it is
    /// created atomically with the event it announces.
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        input: &CreateNotificationInput,
    ) -> Result<Notification, AppError> {
        let data = match &input.data {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| {
                AppError::Validation(format!("notification payload is not serializable: {}", e))
            })?),
            None => None,
        };
        let now = Utc::now();

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO
                notifications (
                    id,
                    user_id,
                    notification_type,
                    title,
                    message,
                    token,
                    team_id,
                    data,
                    is_read,
                    created_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            RETURNING
                id,
                user_id,
                notification_type,
                title,
                message,
                token,
                team_id,
                data,
                is_read,
                created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.user_id)
        .bind(&input.notification_type)
        .bind(&input.title)
        .bind(&input.message)
        .bind(&input.token)
        .bind(input.team_id)
        .bind(data)
        .bind(now)
        .fetch_one(&mut **tx)
        .await?;

        Ok(notification)
    }

    /// Best-effort cleanup by correlation key; returns the number of rows
    /// removed. Callers swallow and log failures.
    pub async fn delete_by_correlation(
        &self,
        user_id: Uuid,
        notification_type: &str,
        token: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE
                user_id = ?
                AND notification_type = ?
                AND token = ?
            "#,
        )
        .bind(user_id)
        .bind(notification_type)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
