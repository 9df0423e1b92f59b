use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag for invitation notifications.
pub const TEAM_INVITE: &str = "TEAM_INVITE";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    /// Correlation key: the invitation token this notification refers to.
    pub token: Option<String>,
    pub team_id: Option<Uuid>,
    /// Extra JSON for the frontend, serialized as text.
    pub data: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>, // TIMESTAMPTZ
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationInput {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub token: Option<String>,
    pub team_id: Option<Uuid>,
    pub data: Option<serde_json::Value>,
}
