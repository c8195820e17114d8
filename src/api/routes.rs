//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Build the v1 API router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/submissions", post(handlers::submit))
        .route("/stats", get(handlers::stats))
        .route("/export.csv", get(handlers::export_csv))
        .route("/queue/drain", post(handlers::drain_queue))
        .route(
            "/connectivity",
            get(handlers::get_connectivity).put(handlers::set_connectivity),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}
