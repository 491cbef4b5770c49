//! HTTP server initialization and routing

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::{routing::get, Router, ServiceExt};
use log::{error, info, warn};
use std::sync::Arc;
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::tickets::configure_tickets_routes;

use super::{health_check, shutdown_signal};

/// Permissive when no origins are configured; unparsable origins are skipped.
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        info!("Creating CORS layer with development defaults (no origins configured)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    info!("Creating CORS layer with {} configured origins", origins.len());
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// The full application. Trailing slashes are trimmed before routing so
/// `/api/tickets/` and `/api/tickets` reach the same handler.
pub fn build_app(app_state: Arc<AppState>) -> NormalizePath<Router> {
    let cors = create_cors_layer(&app_state.config.cors_allowed_origins);

    let router = Router::new()
        .route("/health", get(health_check))
        .merge(configure_tickets_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    NormalizePathLayer::trim_trailing_slash().layer(router)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let host = app_state.config.server.host.clone();
    let port = app_state.config.server.port;

    let app = build_app(Arc::clone(&app_state));

    let listener = match tokio::net::TcpListener::bind((host.as_str(), port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}:{}: {} - is another instance running?",
                host, port, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
}
