// Social API server

use tokio::net::TcpListener;
use tracing::info;

use social_api::{
    api::create_router,
    app_state::AppState,
    config::Config,
    infrastructure::{initialize_monitoring, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    initialize_monitoring();

    // Load configuration
    let config = Config::from_env()?;
    let address = config.server_address();

    // Initialize application state
    let app_state = AppState::new(config).await?;
    let db = app_state.db.clone();

    let app = create_router(app_state)?;

    let listener = TcpListener::bind(&address).await?;
    info!("Social API listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}
