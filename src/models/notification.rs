use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationType {
    Follow,
    Like,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: EntityId,
    pub from_id: EntityId,
    pub to_id: EntityId,
    pub kind: NotificationType,
    pub read: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewNotification {
    pub from: EntityId,
    pub to: EntityId,
    pub kind: NotificationType,
}

/// Originator identity shown next to a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    pub profile_img: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub from: NotificationSender,
    pub to: EntityId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
