pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::import::handlers as import_handlers;
use crate::state::AppState;
use crate::store::handlers as store_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Standalone explorer surface: ?action=scrape | ?action=search&query=
        .route("/", get(import_handlers::handle_action))
        // Workflow API
        .route(
            "/api/v1/workflows",
            get(store_handlers::handle_list_workflows)
                .delete(store_handlers::handle_clear_workflows),
        )
        .route(
            "/api/v1/workflows/lookup",
            get(store_handlers::handle_lookup_workflow),
        )
        .route("/api/v1/import", post(import_handlers::handle_import))
        .route(
            "/api/v1/import/file",
            post(import_handlers::handle_import_file),
        )
        .route(
            "/api/v1/github/search",
            get(import_handlers::handle_search_github),
        )
        .with_state(state)
}
