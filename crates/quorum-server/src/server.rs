//! Router assembly and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes::{api, chat, upload, voice};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/v1/chat", post(chat::chat))
        .route("/v1/search", get(api::search))
        .route("/v1/sessions", get(api::sessions))
        .route("/v1/events", get(api::events))
        .route("/v1/realtime/session", post(api::realtime_session))
        .route("/v1/feedback", post(api::feedback))
        .route("/v1/voice/trace/start", post(voice::start))
        .route("/v1/voice/trace/event", post(voice::event))
        .route("/v1/voice/trace/end", post(voice::end))
        .route("/api/upload/youtube", post(upload::youtube))
        .route("/api/upload/pdf", post(upload::pdf))
        .route("/api/upload/status/{job_id}", get(upload::status))
        .route("/api/upload/sources", get(upload::sources))
        .route("/api/upload/sources/{source_id}", delete(upload::delete_source))
        .route("/api/upload/verify-key", post(upload::verify_key))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the configured address and serve until shutdown.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.bind, state.config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    serve_with_listener(listener, state).await
}

/// Serve on an already-bound listener (tests bind port 0).
pub async fn serve_with_listener(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(%e, "Failed to install CTRL+C handler");
        return;
    }
    info!("Shutdown signal received");
}
