//! Health check handler

use axum::{Json, response::IntoResponse};
use serde_json::json;

/// Liveness probe; does not touch the provider or the cache
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}
