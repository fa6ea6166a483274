mod handlers;
mod state;

pub use state::AppState;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn build_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.public_dir);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/nearby", get(handlers::nearby))
        .route("/api/brands", get(handlers::brands))
        .route("/api/rebuild_stores", get(handlers::rebuild))
        .route("/api/config", get(handlers::client_config))
        .route("/api/geocode", get(handlers::geocode))
        .route("/api/heatmap", get(handlers::heatmap))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Guardian Light listening on http://{}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal, stopping");
}
