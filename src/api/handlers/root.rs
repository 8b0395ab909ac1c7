use axum::response::Json;
use serde_json::{json, Value};

// service banner
pub async fn root() -> Json<Value> {
    Json(json!({ "service": "API interface is normal" }))
}
