// PostService - feeds, post lifecycle, likes and comments

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::validation::non_empty;
use crate::core::{millis_to_datetime, AssociationType, EntityId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::media::release_image;
use crate::infrastructure::{Database, ImageHost};
use crate::models::{
    Comment, CommentView, NewNotification, NotificationType, PostFilter, PostRecord, PostView,
};

#[derive(Clone)]
pub struct PostService {
    db: Arc<Database>,
    images: Arc<dyn ImageHost>,
    notify_self_likes: bool,
}

impl PostService {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageHost>, notify_self_likes: bool) -> Self {
        Self {
            db,
            images,
            notify_self_likes,
        }
    }

    pub async fn all(&self) -> AppResult<Vec<PostView>> {
        let posts = self.db.list_posts(PostFilter::All).await?;
        self.hydrate(posts).await
    }

    pub async fn following(&self, actor: EntityId) -> AppResult<Vec<PostView>> {
        self.require_user(actor).await?;
        let posts = self.db.list_posts(PostFilter::FollowedBy(actor)).await?;
        self.hydrate(posts).await
    }

    pub async fn liked_by(&self, user_id: EntityId) -> AppResult<Vec<PostView>> {
        self.require_user(user_id).await?;
        let posts = self.db.list_posts(PostFilter::LikedBy(user_id)).await?;
        self.hydrate(posts).await
    }

    pub async fn by_username(&self, username: &str) -> AppResult<Vec<PostView>> {
        let user = self
            .db
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let posts = self.db.list_posts(PostFilter::Author(user.id)).await?;
        self.hydrate(posts).await
    }

    #[instrument(skip(self, content, img))]
    pub async fn create(&self, actor: EntityId, content: Option<String>, img: Option<String>) -> AppResult<PostView> {
        let content = non_empty(content);
        let img = non_empty(img);
        if content.is_none() && img.is_none() {
            return Err(AppError::BadRequest("Content or image is required".to_string()));
        }
        self.require_user(actor).await?;

        let img = match img {
            Some(payload) => Some(self.images.upload(&payload).await?),
            None => None,
        };
        let post = match self.db.insert_post(actor, content, img.clone()).await {
            Ok(post) => post,
            Err(e) => {
                if let Some(url) = &img {
                    release_image(self.images.as_ref(), url).await;
                }
                return Err(e);
            }
        };

        info!("User {} created post {}", actor, post.id);
        self.hydrate_one(post).await
    }

    /// Owner-only. The hosted image is released after the post is gone and
    /// a failure to release it is only logged.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor: EntityId, post_id: EntityId) -> AppResult<()> {
        let post = self.require_post(post_id).await?;
        if post.user_id != actor {
            return Err(AppError::Forbidden(
                "You are not authorized to delete this post".to_string(),
            ));
        }

        self.db.delete_post(post.id).await?;
        if let Some(url) = &post.img {
            release_image(self.images.as_ref(), url).await;
        }

        info!("User {} deleted post {}", actor, post_id);
        Ok(())
    }

    /// Toggles the actor's like and returns the resulting likers, in like order.
    #[instrument(skip(self))]
    pub async fn like_unlike(&self, actor: EntityId, post_id: EntityId) -> AppResult<Vec<EntityId>> {
        let post = self.require_post(post_id).await?;

        let notification = (actor != post.user_id || self.notify_self_likes).then_some(NewNotification {
            from: actor,
            to: post.user_id,
            kind: NotificationType::Like,
        });
        let outcome = self
            .db
            .toggle_association(actor, AssociationType::LikedPosts, post.id, notification)
            .await?;
        info!("User {} {:?} like on post {}", actor, outcome, post_id);

        self.db.association_targets(post.id, AssociationType::LikedBy).await
    }

    /// Appends a comment and returns the post's full comment sequence.
    #[instrument(skip(self, text))]
    pub async fn comment(&self, actor: EntityId, post_id: EntityId, text: String) -> AppResult<Vec<Comment>> {
        if text.trim().is_empty() {
            return Err(AppError::BadRequest("Text field is required".to_string()));
        }
        let post = self.require_post(post_id).await?;

        self.db.insert_comment(post.id, actor, text).await?;
        let comments = self.db.comments_for_posts(&[post.id]).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn require_user(&self, id: EntityId) -> AppResult<()> {
        match self.db.find_user_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("User not found".to_string())),
        }
    }

    async fn require_post(&self, id: EntityId) -> AppResult<PostRecord> {
        self.db
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }

    async fn hydrate_one(&self, post: PostRecord) -> AppResult<PostView> {
        self.hydrate(vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Post vanished while loading".to_string()))
    }

    /// Resolves authors, likers and comment authors for a page of posts,
    /// preserving the input order.
    async fn hydrate(&self, posts: Vec<PostRecord>) -> AppResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<EntityId> = posts.iter().map(|p| p.id).collect();
        let (comments, likers) = futures::try_join!(
            self.db.comments_for_posts(&post_ids),
            self.db.likers_for_posts(&post_ids)
        )?;

        let mut user_ids: HashSet<EntityId> = posts.iter().map(|p| p.user_id).collect();
        user_ids.extend(comments.iter().map(|c| c.user_id));
        let user_ids: Vec<EntityId> = user_ids.into_iter().collect();
        let users = self.db.public_users(&user_ids).await?;

        let mut likes_by_post: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for (post_id, liker) in likers {
            likes_by_post.entry(post_id).or_default().push(liker);
        }

        let mut comments_by_post: HashMap<EntityId, Vec<CommentView>> = HashMap::new();
        for comment in comments {
            // comments by users that no longer resolve are dropped from views
            if let Some(user) = users.get(&comment.user_id) {
                comments_by_post.entry(comment.post_id).or_default().push(CommentView {
                    id: comment.id,
                    user: user.clone(),
                    text: comment.text,
                    created_at: millis_to_datetime(comment.created_at),
                });
            }
        }

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            let user = users
                .get(&post.user_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(format!("Author {} of post {} is missing", post.user_id, post.id)))?;

            views.push(PostView {
                id: post.id,
                user,
                content: post.content,
                img: post.img,
                likes: likes_by_post.remove(&post.id).unwrap_or_default(),
                comments: comments_by_post.remove(&post.id).unwrap_or_default(),
                created_at: millis_to_datetime(post.created_at),
                updated_at: millis_to_datetime(post.updated_at),
            });
        }
        Ok(views)
    }
}
