use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::workflow::Workflow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub url: String,
}

#[derive(Serialize)]
pub struct WorkflowListResponse {
    pub total: usize,
    pub workflows: Vec<Workflow>,
}

/// GET /api/v1/workflows
pub async fn handle_list_workflows(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<WorkflowListResponse>, AppError> {
    let workflows = state.store.search(&params.query).await?;
    Ok(Json(WorkflowListResponse {
        total: workflows.len(),
        workflows,
    }))
}

/// GET /api/v1/workflows/lookup
pub async fn handle_lookup_workflow(
    State(state): State<AppState>,
    Query(params): Query<LookupQuery>,
) -> Result<Json<Workflow>, AppError> {
    let workflow = state
        .store
        .get(&params.url)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No workflow stored for {}", params.url)))?;
    Ok(Json(workflow))
}

/// DELETE /api/v1/workflows
///
/// Explicit cleanup: empties the cache. Imports never delete records.
pub async fn handle_clear_workflows(
    State(state): State<AppState>,
) -> Result<Json<WorkflowListResponse>, AppError> {
    let removed = state.store.clear().await?;
    tracing::info!(removed = removed.len(), "Workflow cache cleared");
    Ok(Json(WorkflowListResponse {
        total: removed.len(),
        workflows: removed,
    }))
}
