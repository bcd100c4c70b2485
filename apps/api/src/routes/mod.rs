pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::curriculum::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/templates/:template_type",
            get(handlers::handle_get_template),
        )
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_close_session),
        )
        .route("/api/v1/sessions/:id/edits", post(handlers::handle_apply_edit))
        .route(
            "/api/v1/sessions/:id/measurements",
            post(handlers::handle_measurements),
        )
        .route("/api/v1/sessions/:id/pages", get(handlers::handle_get_pages))
        .route("/api/v1/sessions/:id/draft", post(handlers::handle_save_draft))
        .route("/api/v1/sessions/:id/publish", post(handlers::handle_publish))
        .with_state(state)
}
