use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{millis_to_datetime, EntityId};

/// Row of the `users` table. Carries the password hash and therefore never
/// leaves the service layer; responses use [`PublicUser`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: EntityId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub bio: String,
    pub link: String,
    pub profile_img: String,
    pub cover_img: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Social-graph edges hanging off a user, in edge creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEdges {
    pub followers: Vec<EntityId>,
    pub following: Vec<EntityId>,
    pub liked_posts: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub bio: String,
    pub link: String,
    pub profile_img: String,
    pub cover_img: String,
    pub followers: Vec<EntityId>,
    pub following: Vec<EntityId>,
    pub liked_posts: Vec<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicUser {
    pub fn from_record(record: UserRecord, edges: UserEdges) -> Self {
        Self {
            id: record.id,
            username: record.username,
            full_name: record.full_name,
            email: record.email,
            bio: record.bio,
            link: record.link,
            profile_img: record.profile_img,
            cover_img: record.cover_img,
            followers: edges.followers,
            following: edges.following,
            liked_posts: edges.liked_posts,
            created_at: millis_to_datetime(record.created_at),
            updated_at: millis_to_datetime(record.updated_at),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Every field is optional; empty strings leave the stored value unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_img: Option<String>,
    pub cover_img: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_user_has_no_password_field() {
        let record = UserRecord {
            id: EntityId(1),
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice".into(),
            password_hash: "$argon2id$v=19$...".into(),
            bio: String::new(),
            link: String::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_value(PublicUser::from_record(record, UserEdges::default())).unwrap();

        assert_eq!(json["_id"], "1");
        assert_eq!(json["fullName"], "Alice");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
