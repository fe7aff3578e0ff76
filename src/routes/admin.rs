use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::admin;
use crate::middleware::auth::require_admin;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/submissions", get(admin::list_submissions))
        .route(
            "/submissions/:id",
            put(admin::update_submission).delete(admin::delete_submission),
        )
        .layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/login", post(admin::login))
        .merge(protected)
}
