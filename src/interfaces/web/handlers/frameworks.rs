use axum::Json;
use serde_json::json;

use crate::core::pipeline::CATALOG;
use crate::core::pipeline::framework::DEFAULT_FRAMEWORK;

pub async fn list_frameworks_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "default": DEFAULT_FRAMEWORK,
        "frameworks": &CATALOG,
    }))
}
