use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::app_state::AppState;
use crate::core::EntityId;
use crate::error::AppResult;
use crate::infrastructure::Vc;
use crate::models::{Comment, CommentRequest, CreatePostRequest, MessageResponse, PostView};

use super::parse_path_id;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/post/all", get(all_posts))
        .route("/post/following", get(following_posts))
        .route("/post/likes/{id}", get(liked_posts))
        .route("/post/user/{username}", get(user_posts))
        .route("/post/create", post(create_post))
        .route("/post/like/{id}", post(like_unlike))
        .route("/post/comment/{id}", post(comment))
        .route("/post/{id}", delete(delete_post))
}

async fn all_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.all().await?))
}

async fn following_posts(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.following(vc.user_id()).await?))
}

async fn liked_posts(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Vec<PostView>>> {
    let user_id = parse_path_id(&id, "User not found")?;
    Ok(Json(state.posts.liked_by(user_id).await?))
}

async fn user_posts(State(state): State<AppState>, Path(username): Path<String>) -> AppResult<Json<Vec<PostView>>> {
    Ok(Json(state.posts.by_username(&username).await?))
}

async fn create_post(
    State(state): State<AppState>,
    vc: Vc,
    Json(request): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let post = state.posts.create(vc.user_id(), request.content, request.img).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn like_unlike(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<EntityId>>> {
    let post_id = parse_path_id(&id, "Post not found")?;
    Ok(Json(state.posts.like_unlike(vc.user_id(), post_id).await?))
}

async fn comment(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<Vec<Comment>>)> {
    let post_id = parse_path_id(&id, "Post not found")?;
    let comments = state.posts.comment(vc.user_id(), post_id, request.text).await?;
    Ok((StatusCode::CREATED, Json(comments)))
}

async fn delete_post(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let post_id = parse_path_id(&id, "Post not found")?;
    state.posts.delete(vc.user_id(), post_id).await?;
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}
