//! Service status endpoints

use axum::Json;
use serde_json::{json, Value};

/// Root endpoint
pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "services": ["ocr_api"],
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
