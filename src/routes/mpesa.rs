use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(mpesa_health))
        .route("/stk", post(mpesa_handlers::initiate_stk_push))
        // Daraja POSTs the asynchronous result here.
        .route("/stk/callback", post(mpesa_handlers::mpesa_stk_callback))
}

async fn mpesa_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mpesa",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["stk-push", "stk-callback"],
    }))
}
