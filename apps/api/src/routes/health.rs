use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and import settings.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowscout",
        "auto_import": state.config.auto_import,
        "llm_enrichment": state.config.llm_api_key().is_some(),
        "github_token": state.config.github_token().is_some(),
    }))
}
