use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{millis_to_datetime, EntityId};
use crate::models::PublicUser;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRecord {
    pub id: EntityId,
    pub user_id: EntityId,
    pub content: Option<String>,
    pub img: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRecord {
    pub id: EntityId,
    pub post_id: EntityId,
    pub user_id: EntityId,
    pub text: String,
    pub created_at: i64,
}

/// Which slice of posts a feed query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    /// Posts by users the given user follows
    FollowedBy(EntityId),
    /// Posts the given user liked
    LikedBy(EntityId),
    Author(EntityId),
}

/// Comment as returned by the comment endpoint, author left unresolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub user: EntityId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            user: record.user_id,
            text: record.text,
            created_at: millis_to_datetime(record.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub user: PublicUser,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Post with author, likes and comment authors resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub user: PublicUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    pub likes: Vec<EntityId>,
    pub comments: Vec<CommentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub img: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub text: String,
}
