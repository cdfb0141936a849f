use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::import::{CandidatePage, FileImport, Refresh, RunReport, Trigger};

/// Set on a scrape response when the import stopped early but still stored
/// new records.
pub const IMPORT_WARNING_HEADER: &str = "x-import-warning";
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct CandidateSearchQuery {
    #[serde(default)]
    pub term: String,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn first_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct ImportFileRequest {
    pub url: String,
}

/// GET /?action=scrape | /?action=search&query=<q>
///
/// Errors are reported as a flat `{"error": "..."}` object.
pub async fn handle_action(
    State(state): State<AppState>,
    Query(params): Query<ActionQuery>,
) -> Response {
    match params.action.as_deref() {
        Some("scrape") => match state.importer.refresh_if_stale(params.force).await {
            Ok(refresh) => scrape_response(refresh),
            Err(e) => flat_error(&e, "Failed to scrape workflows"),
        },
        Some("search") => match state.store.search(&params.query).await {
            Ok(workflows) => Json(workflows).into_response(),
            Err(e) => flat_error(&AppError::from(e), "Failed to search workflows"),
        },
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid action" })),
        )
            .into_response(),
    }
}

/// An aborted import that created nothing is reported as an error; one that
/// still stored records returns them with the abort message in a header.
fn scrape_response(refresh: Refresh) -> Response {
    let Refresh { workflows, report } = refresh;
    let Some((aborted, created)) = report.and_then(|r| r.aborted.map(|a| (a, r.created))) else {
        return Json(workflows).into_response();
    };

    if created == 0 {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": format!("Failed to scrape workflows: {aborted}") })),
        )
            .into_response();
    }

    let mut response = Json(workflows).into_response();
    if let Ok(value) = HeaderValue::from_str(&aborted) {
        response.headers_mut().insert(IMPORT_WARNING_HEADER, value);
    }
    response
}

fn flat_error(error: &AppError, context: &str) -> Response {
    let (status, _, message) = error.parts();
    (status, Json(json!({ "error": format!("{context}: {message}") }))).into_response()
}

/// GET /api/v1/github/search?term=&page=&per_page=
///
/// Preview of candidate files for a later `POST /api/v1/import/file`.
pub async fn handle_search_github(
    State(state): State<AppState>,
    Query(params): Query<CandidateSearchQuery>,
) -> Result<Json<CandidatePage>, AppError> {
    let page = state
        .importer
        .search_candidates(params.term.trim(), params.page, params.per_page)
        .await?;
    Ok(Json(page))
}

/// POST /api/v1/import
pub async fn handle_import(State(state): State<AppState>) -> Result<Json<RunReport>, AppError> {
    let report = state.importer.run(Trigger::Manual).await?;
    Ok(Json(report))
}

/// POST /api/v1/import/file
pub async fn handle_import_file(
    State(state): State<AppState>,
    Json(req): Json<ImportFileRequest>,
) -> Result<(StatusCode, Json<FileImport>), AppError> {
    let imported = state.importer.import_file(req.url.trim()).await?;
    let status = if imported.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(imported)))
}
