//! Health check handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store_ok = state.store.is_healthy().await;
    let backend = state.store.backend();

    let status = if store_ok { "healthy" } else { "degraded" };
    let code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let mut body = serde_json::json!({
        "status": status,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "store": backend
    });
    if backend == "postgres" {
        body["database"] = serde_json::Value::Bool(store_ok);
    }

    (code, Json(body))
}
