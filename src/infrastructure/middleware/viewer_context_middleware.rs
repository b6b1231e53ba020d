// ViewerContext middleware - the auth gate in front of every session route
// Reads the `jwt` cookie, verifies it and injects the resolved viewer into request extensions

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::security::SESSION_COOKIE;
use crate::infrastructure::viewer::ViewerContext;

pub async fn viewer_context_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());

    let viewer_context = create_viewer_context(&state, token.as_deref()).await?;
    request.extensions_mut().insert(viewer_context);

    Ok(next.run(request).await)
}

/// Token to viewer. Store failures propagate as internal errors rather than
/// being reported as an unauthenticated caller.
async fn create_viewer_context(state: &AppState, token: Option<&str>) -> AppResult<Arc<ViewerContext>> {
    let token = token.ok_or_else(|| AppError::Unauthorized("Unauthorized: No token provided".to_string()))?;
    let user_id = state.sessions.verify(token)?;

    let user = state.db.public_user(user_id).await?.ok_or_else(|| {
        warn!("Session for unknown user {}", user_id);
        AppError::Unauthorized("Unauthorized: User not found".to_string())
    })?;

    Ok(Arc::new(ViewerContext::authenticated(user)))
}
