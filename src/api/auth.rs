use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::Vc;
use crate::models::{LoginRequest, MessageResponse, PublicUser, SignupRequest};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/check", get(check))
}

async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state.auth.signup(request).await?;
    let token = state.sessions.issue(user.id)?;
    Ok((StatusCode::CREATED, jar.add(state.sessions.session_cookie(token)), Json(user)))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state.auth.login(request).await?;
    let token = state.sessions.issue(user.id)?;
    Ok((StatusCode::CREATED, jar.add(state.sessions.session_cookie(token)), Json(user)))
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    info!("Session ended");
    (
        jar.add(state.sessions.expired_cookie()),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

async fn check(vc: Vc) -> Json<PublicUser> {
    Json(vc.user.clone())
}
