//! Courier server
//!
//! Two listeners share one [`AppState`]:
//! - the WebSocket listener feeds client frames into the [`Relay`] and pushes
//!   the resulting deliveries to per-connection outboxes;
//! - the HTTP listener serves health, media upload and media download.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod outbox;
pub mod storage;
#[cfg(test)]
mod test_helpers;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use courier_relay::Relay;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

use crate::config::{CourierConfig, RelayConfig};
use crate::metrics::RelayMetrics;
use crate::outbox::Outboxes;
use crate::storage::MediaStore;

/// Room left in the request body limit for multipart framing around the file.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub outboxes: Arc<Outboxes>,
    pub media: Arc<MediaStore>,
    pub metrics: Arc<RelayMetrics>,
    pub relay_config: Arc<RelayConfig>,
    /// Cancelled on server shutdown; open WebSocket sessions end when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &CourierConfig) -> Result<Self> {
        Ok(Self {
            relay: Arc::new(Relay::new()),
            outboxes: Arc::new(Outboxes::new()),
            media: Arc::new(MediaStore::new(&config.storage)?),
            metrics: Arc::new(RelayMetrics::new()),
            relay_config: Arc::new(config.relay.clone()),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Adds a unique request ID to each incoming request's span
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// Health, upload and download routes.
pub fn http_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.media.max_file_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(UPLOAD_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route(
            "/upload",
            post(handlers::upload_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/download/{filename}", get(handlers::download_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

/// WebSocket upgrade on any path, matching clients that dial the bare port.
pub fn ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::websocket_handler))
        .fallback(handlers::websocket_handler)
        .with_state(state)
}
