use axum::{routing::post, Router};

use crate::handlers::submissions;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/submit", post(submissions::submit))
}
