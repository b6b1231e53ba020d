// Database - SQLite storage for users, posts, comments, notifications and social edges
// Edges live in one associations table; each edge is written together with its inverse

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Transaction};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::core::{current_time_millis, AssociationType, EdgeToggle, EntityId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::id_generator::IdGenerator;
use crate::models::{
    CommentRecord, NewNotification, NewUser, NotificationRecord, PostFilter, PostRecord, PublicUser,
    UserEdges, UserRecord,
};

const SCHEMA: [&str; 11] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        bio TEXT NOT NULL DEFAULT '',
        link TEXT NOT NULL DEFAULT '',
        profile_img TEXT NOT NULL DEFAULT '',
        cover_img TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        content TEXT,
        img TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY,
        post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id),
        text TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS associations (
        id1 INTEGER NOT NULL,
        atype TEXT NOT NULL,
        id2 INTEGER NOT NULL,
        time_created INTEGER NOT NULL,
        PRIMARY KEY (id1, atype, id2)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY,
        from_id INTEGER NOT NULL REFERENCES users(id),
        to_id INTEGER NOT NULL REFERENCES users(id),
        kind TEXT NOT NULL CHECK (kind IN ('follow', 'like')),
        read BOOLEAN NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at, id)",
    "CREATE INDEX IF NOT EXISTS idx_assoc_id1_atype ON associations(id1, atype, time_created)",
    "CREATE INDEX IF NOT EXISTS idx_assoc_id2_atype ON associations(id2, atype)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_to ON notifications(to_id, created_at DESC)",
];

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, bio, link, profile_img, cover_img, created_at, updated_at";
const POST_COLUMNS: &str = "id, user_id, content, img, created_at, updated_at";

pub struct Database {
    pool: SqlitePool,
    ids: IdGenerator,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        if config.node_id >= 1024 {
            return Err(AppError::ConfigurationError(format!(
                "NODE_ID must be below 1024, got {}",
                config.node_id
            )));
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL {}: {}", config.url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        if let Some(parent) = database_file(&config.url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::ConfigurationError(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", config.url, e)))?;

        let db = Self {
            pool,
            ids: IdGenerator::new(config.node_id),
        };
        db.initialize().await?;
        info!("Database ready at {}", config.url);
        Ok(db)
    }

    /// Single-connection in-memory store; the connection is never recycled
    /// because closing it would drop the data.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Invalid in-memory URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e)))?;

        let db = Self {
            pool,
            ids: IdGenerator::new(0),
        };
        db.initialize().await?;
        Ok(db)
    }

    pub async fn initialize(&self) -> AppResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to apply schema: {}", e)))?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ---- users ----

    pub async fn insert_user(&self, user: NewUser) -> AppResult<UserRecord> {
        let now = current_time_millis();
        let record = UserRecord {
            id: self.ids.next_id(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            bio: String::new(),
            link: String::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, full_name, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.full_name)
        .bind(&record.password_hash)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(record)
    }

    pub async fn update_user(&self, user: &UserRecord) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET username = ?, email = ?, full_name = ?, password_hash = ?, bio = ?, link = ?, profile_img = ?, cover_img = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.link)
        .bind(&user.profile_img)
        .bind(&user.cover_img)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn find_user_by_id(&self, id: EntityId) -> AppResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_users_by_ids(&self, ids: &[EntityId]) -> AppResult<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users WHERE id IN (", USER_COLUMNS));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");

        let users = qb.build_query_as::<UserRecord>().fetch_all(&self.pool).await?;
        Ok(users)
    }

    /// Uniform random sample drawn by the store, excluding one user.
    pub async fn sample_users_excluding(&self, excluded: EntityId, size: u32) -> AppResult<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id != ? ORDER BY RANDOM() LIMIT ?",
            USER_COLUMNS
        ))
        .bind(excluded)
        .bind(i64::from(size))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Follower, following and liked-post edges for a batch of users.
    pub async fn user_edges(&self, ids: &[EntityId]) -> AppResult<HashMap<EntityId, UserEdges>> {
        let mut edges: HashMap<EntityId, UserEdges> = HashMap::new();
        if ids.is_empty() {
            return Ok(edges);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id1, atype, id2 FROM associations WHERE atype IN (");
        let mut separated = qb.separated(", ");
        for atype in [
            AssociationType::Followers,
            AssociationType::Following,
            AssociationType::LikedPosts,
        ] {
            separated.push_bind(atype.as_str());
        }
        qb.push(") AND id1 IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(") ORDER BY time_created, id2");

        let rows = qb
            .build_query_as::<(EntityId, String, EntityId)>()
            .fetch_all(&self.pool)
            .await?;

        for (id1, atype, id2) in rows {
            let entry = edges.entry(id1).or_default();
            match AssociationType::parse(&atype) {
                Some(AssociationType::Followers) => entry.followers.push(id2),
                Some(AssociationType::Following) => entry.following.push(id2),
                Some(AssociationType::LikedPosts) => entry.liked_posts.push(id2),
                _ => {}
            }
        }
        Ok(edges)
    }

    pub async fn public_user(&self, id: EntityId) -> AppResult<Option<PublicUser>> {
        let mut users = self.public_users(&[id]).await?;
        Ok(users.remove(&id))
    }

    pub async fn public_users(&self, ids: &[EntityId]) -> AppResult<HashMap<EntityId, PublicUser>> {
        let records = self.find_users_by_ids(ids).await?;
        let mut edges = self.user_edges(ids).await?;

        Ok(records
            .into_iter()
            .map(|record| {
                let user_edges = edges.remove(&record.id).unwrap_or_default();
                (record.id, PublicUser::from_record(record, user_edges))
            })
            .collect())
    }

    // ---- edges ----

    /// Targets of `(id1, atype, *)` in edge creation order.
    pub async fn association_targets(&self, id1: EntityId, atype: AssociationType) -> AppResult<Vec<EntityId>> {
        let targets = sqlx::query_scalar::<_, EntityId>(
            "SELECT id2 FROM associations WHERE id1 = ? AND atype = ? ORDER BY time_created, id2",
        )
        .bind(id1)
        .bind(atype.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(targets)
    }

    /// Flip the edge `(id1, atype, id2)` and its inverse in one transaction.
    ///
    /// The decision is taken by the conditional delete itself, which holds the
    /// write lock until commit, so two concurrent toggles of the same pair
    /// serialize instead of both observing the same state. An edge is only
    /// created while its target still exists, checked inside the same
    /// transaction. `on_add` is recorded when the edge is created.
    pub async fn toggle_association(
        &self,
        id1: EntityId,
        atype: AssociationType,
        id2: EntityId,
        on_add: Option<NewNotification>,
    ) -> AppResult<EdgeToggle> {
        let inverse = atype.inverse();
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM associations WHERE id1 = ? AND atype = ? AND id2 = ?")
            .bind(id1)
            .bind(atype.as_str())
            .bind(id2)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            let inverse_removed = sqlx::query("DELETE FROM associations WHERE id1 = ? AND atype = ? AND id2 = ?")
                .bind(id2)
                .bind(inverse.as_str())
                .bind(id1)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if inverse_removed == 0 {
                warn!("Edge {} -{}-> {} had no inverse", id1, atype.as_str(), id2);
            }

            tx.commit().await?;
            return Ok(EdgeToggle::Removed);
        }

        let now = current_time_millis();
        let inserted = sqlx::query(&format!(
            "INSERT INTO associations (id1, atype, id2, time_created) SELECT ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM {} WHERE id = ?)",
            atype.target_table()
        ))
        .bind(id1)
        .bind(atype.as_str())
        .bind(id2)
        .bind(now)
        .bind(id2)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            tx.rollback().await?;
            let missing = match atype.target_table() {
                "posts" => "Post not found",
                _ => "User not found",
            };
            return Err(AppError::NotFound(missing.to_string()));
        }
        // OR IGNORE repairs a dangling inverse left behind by older data
        sqlx::query("INSERT OR IGNORE INTO associations (id1, atype, id2, time_created) VALUES (?, ?, ?, ?)")
            .bind(id2)
            .bind(inverse.as_str())
            .bind(id1)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        if let Some(notification) = on_add {
            self.insert_notification_tx(&mut tx, notification).await?;
        }

        tx.commit().await?;
        Ok(EdgeToggle::Added)
    }

    // ---- posts ----

    pub async fn insert_post(&self, user_id: EntityId, content: Option<String>, img: Option<String>) -> AppResult<PostRecord> {
        let now = current_time_millis();
        let record = PostRecord {
            id: self.ids.next_id(),
            user_id,
            content,
            img,
            created_at: now,
            updated_at: now,
        };

        sqlx::query("INSERT INTO posts (id, user_id, content, img, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(record.id)
            .bind(record.user_id)
            .bind(&record.content)
            .bind(&record.img)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn find_post(&self, id: EntityId) -> AppResult<Option<PostRecord>> {
        let post = sqlx::query_as::<_, PostRecord>(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// Newest first; ties broken by id.
    pub async fn list_posts(&self, filter: PostFilter) -> AppResult<Vec<PostRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM posts", POST_COLUMNS));

        match filter {
            PostFilter::All => {}
            PostFilter::FollowedBy(user_id) => {
                qb.push(" WHERE user_id IN (SELECT id2 FROM associations WHERE id1 = ");
                qb.push_bind(user_id);
                qb.push(" AND atype = ");
                qb.push_bind(AssociationType::Following.as_str());
                qb.push(")");
            }
            PostFilter::LikedBy(user_id) => {
                qb.push(" WHERE id IN (SELECT id2 FROM associations WHERE id1 = ");
                qb.push_bind(user_id);
                qb.push(" AND atype = ");
                qb.push_bind(AssociationType::LikedPosts.as_str());
                qb.push(")");
            }
            PostFilter::Author(user_id) => {
                qb.push(" WHERE user_id = ");
                qb.push_bind(user_id);
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let posts = qb.build_query_as::<PostRecord>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    /// Removes the post with its comments and both sides of its like edges.
    pub async fn delete_post(&self, id: EntityId) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM associations WHERE atype = ? AND id2 = ?")
            .bind(AssociationType::LikedPosts.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM associations WHERE id1 = ? AND atype = ?")
            .bind(id)
            .bind(AssociationType::LikedBy.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// `(post, liker)` pairs for a batch of posts, in like order.
    pub async fn likers_for_posts(&self, post_ids: &[EntityId]) -> AppResult<Vec<(EntityId, EntityId)>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id1, id2 FROM associations WHERE atype = ");
        qb.push_bind(AssociationType::LikedBy.as_str());
        qb.push(" AND id1 IN (");
        let mut separated = qb.separated(", ");
        for id in post_ids {
            separated.push_bind(*id);
        }
        qb.push(") ORDER BY time_created, id2");

        let rows = qb
            .build_query_as::<(EntityId, EntityId)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ---- comments ----

    pub async fn insert_comment(&self, post_id: EntityId, user_id: EntityId, text: String) -> AppResult<CommentRecord> {
        let record = CommentRecord {
            id: self.ids.next_id(),
            post_id,
            user_id,
            text,
            created_at: current_time_millis(),
        };

        sqlx::query("INSERT INTO comments (id, post_id, user_id, text, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(record.id)
            .bind(record.post_id)
            .bind(record.user_id)
            .bind(&record.text)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    /// Comments in append order.
    pub async fn comments_for_posts(&self, post_ids: &[EntityId]) -> AppResult<Vec<CommentRecord>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, post_id, user_id, text, created_at FROM comments WHERE post_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in post_ids {
            separated.push_bind(*id);
        }
        qb.push(") ORDER BY created_at, id");

        let comments = qb.build_query_as::<CommentRecord>().fetch_all(&self.pool).await?;
        Ok(comments)
    }

    // ---- notifications ----

    async fn insert_notification_tx(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        notification: NewNotification,
    ) -> AppResult<EntityId> {
        let id = self.ids.next_id();
        let now = current_time_millis();

        sqlx::query(
            "INSERT INTO notifications (id, from_id, to_id, kind, read, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(id)
        .bind(notification.from)
        .bind(notification.to)
        .bind(notification.kind)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Newest first; ties broken by id.
    pub async fn notifications_for(&self, recipient: EntityId) -> AppResult<Vec<NotificationRecord>> {
        let notifications = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, from_id, to_id, kind, read, created_at, updated_at FROM notifications WHERE to_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(recipient)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    pub async fn mark_notifications_read(&self, recipient: EntityId, ids: &[EntityId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE notifications SET read = 1, updated_at = ");
        qb.push_bind(current_time_millis());
        qb.push(" WHERE to_id = ");
        qb.push_bind(recipient);
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        qb.push(")");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_notifications_for(&self, recipient: EntityId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE to_id = ?")
            .bind(recipient)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// On-disk path named by a `sqlite:` URL; `None` for in-memory databases.
fn database_file(url: &str) -> Option<PathBuf> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Unique-index violations on `users` become caller-facing conflicts.
fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("users.username") {
                return AppError::Conflict("Username is already taken".to_string());
            }
            if message.contains("users.email") {
                return AppError::Conflict("Email is already taken".to_string());
            }
            return AppError::Conflict("Record already exists".to_string());
        }
    }
    AppError::from(err)
}

#[cfg(test)]
impl Database {
    pub(crate) async fn insert_notification(&self, notification: NewNotification) -> AppResult<EntityId> {
        let mut tx = self.pool.begin().await?;
        let id = self.insert_notification_tx(&mut tx, notification).await?;
        tx.commit().await?;
        Ok(id)
    }
}
