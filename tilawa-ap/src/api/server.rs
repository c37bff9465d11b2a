//! HTTP server setup and routing
//!
//! Sets up the Axum router for the control endpoints and the SSE stream.

use crate::error::{Error, Result};
use crate::playback::VersePlaybackEngine;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: VersePlaybackEngine,
    pub db_pool: Pool<Sqlite>,
    /// Server port, reported by `/health`
    pub port: u16,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(super::handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                // Playback control
                .route("/playback/play", post(super::handlers::play))
                .route("/playback/pause", post(super::handlers::pause))
                .route("/playback/resume", post(super::handlers::resume))
                .route("/playback/stop", post(super::handlers::stop))
                .route("/playback/seek", post(super::handlers::seek))
                .route("/playback/state", get(super::handlers::get_state))
                .route("/playback/surah", post(super::handlers::change_surah))
                // Settings
                .route(
                    "/settings/autoplay",
                    get(super::handlers::get_autoplay).post(super::handlers::set_autoplay),
                )
                // Verse text
                .route("/surahs/:surah/verses", get(super::handlers::list_verses))
                .route("/surahs/:surah/verses/:verse", put(super::handlers::put_verse))
                // SSE event stream
                .route("/events", get(super::sse::event_stream)),
        )
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
