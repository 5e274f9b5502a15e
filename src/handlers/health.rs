// src/handlers/health.rs

use axum::Json;
use serde_json::{json, Value};

// GET /api/health (pública)
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
