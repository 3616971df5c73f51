//! HTTP surface (axum)

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::application::CacheGateway;
use crate::domain::{Clock, LiveMatchStore};
use crate::infrastructure::broadcast::EventBroadcaster;
use crate::utils::ShutdownManager;
use axum::{Router, routing::get};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// State shared across handlers
pub struct AppState {
    pub gateway: Arc<CacheGateway>,
    pub live_store: Arc<dyn LiveMatchStore>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        gateway: Arc<CacheGateway>,
        live_store: Arc<dyn LiveMatchStore>,
        broadcaster: Arc<EventBroadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        AppState {
            gateway,
            live_store,
            broadcaster,
            clock,
            started_at,
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Cached upstream endpoints
        .route(
            "/fixtures",
            get(handlers::fixtures).post(handlers::fixtures_post),
        )
        .route("/standings", get(handlers::standings))
        .route("/teams", get(handlers::teams))
        .route("/players", get(handlers::players))
        // Live data
        .route("/live", get(handlers::live))
        .route("/fixtures/{id}/events", get(handlers::fixture_events))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve `router` on `bind` until `shutdown` is cancelled
pub async fn serve(bind: &str, router: Router, shutdown: ShutdownManager) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
