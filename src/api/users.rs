use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::app_state::AppState;
use crate::core::EdgeToggle;
use crate::error::AppResult;
use crate::infrastructure::Vc;
use crate::models::{MessageResponse, PublicUser, UpdateProfileRequest};

use super::parse_path_id;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile/{username}", get(profile))
        .route("/users/suggested", get(suggested))
        .route("/users/follow/{id}", post(follow_unfollow))
        .route("/users/update", post(update_profile))
}

async fn profile(State(state): State<AppState>, Path(username): Path<String>) -> AppResult<Json<PublicUser>> {
    Ok(Json(state.users.profile(&username).await?))
}

async fn suggested(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Vec<PublicUser>>> {
    Ok(Json(state.users.suggested(vc.user_id()).await?))
}

async fn follow_unfollow(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let target = parse_path_id(&id, "User not found")?;
    let message = match state.users.follow_unfollow(vc.user_id(), target).await? {
        EdgeToggle::Added => "Followed",
        EdgeToggle::Removed => "Unfollowed",
    };
    Ok(Json(MessageResponse::new(message)))
}

async fn update_profile(
    State(state): State<AppState>,
    vc: Vc,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(state.users.update_profile(vc.user_id(), request).await?))
}
