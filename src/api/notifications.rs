use axum::{extract::State, routing::get, Json, Router};

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::Vc;
use crate::models::{MessageResponse, NotificationView};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notification", get(list_notifications).delete(clear_notifications))
        .route("/notification/", get(list_notifications).delete(clear_notifications))
}

/// Fetching the feed marks it read.
async fn list_notifications(State(state): State<AppState>, vc: Vc) -> AppResult<Json<Vec<NotificationView>>> {
    Ok(Json(state.notifications.list_and_mark_read(vc.user_id()).await?))
}

async fn clear_notifications(State(state): State<AppState>, vc: Vc) -> AppResult<Json<MessageResponse>> {
    state.notifications.clear_all(vc.user_id()).await?;
    Ok(Json(MessageResponse::new("Notifications deleted successfully")))
}
