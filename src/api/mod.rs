// HTTP API - JSON endpoints under /api plus static serving of hosted media

pub mod auth;
pub mod notifications;
pub mod posts;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::app_state::AppState;
use crate::core::{current_time_millis, EntityId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::viewer_context_middleware;

pub fn create_router(state: AppState) -> AppResult<Router> {
    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(users::routes())
        .merge(posts::routes())
        .merge(notifications::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), viewer_context_middleware));

    let api = Router::new()
        .route("/health", get(health_check))
        .merge(auth::public_routes())
        .merge(protected);

    let config = state.config.clone();
    let mut app = Router::new()
        .nest("/api", api)
        .nest_service(&config.media.route, ServeDir::new(&config.media.dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.server.max_body_bytes)),
        );

    if let Some(origin) = &config.server.cors_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .map_err(|e| AppError::ConfigurationError(format!("Invalid CORS_ORIGIN {}: {}", origin, e)))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    Ok(app.with_state(state))
}

async fn health_check(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    state.db.health_check().await?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": current_time_millis()
    })))
}

/// Path ids that do not parse cannot name an existing entity.
fn parse_path_id(raw: &str, not_found: &str) -> AppResult<EntityId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}
