pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Selection
        .route(
            "/api/v1/files",
            get(handlers::handle_list_files).post(handlers::handle_upload_files),
        )
        .route("/api/v1/files/:file_name", delete(handlers::handle_remove_file))
        // Processing
        .route("/api/v1/batches", post(handlers::handle_start_batch))
        .route("/api/v1/results", get(handlers::handle_get_results))
        .route(
            "/api/v1/results/sort/:key",
            post(handlers::handle_request_sort),
        )
        .route("/api/v1/notifications", get(handlers::handle_notifications))
        .with_state(state)
}
