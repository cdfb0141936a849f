use std::sync::Arc;

use crate::config::Config;
use crate::import::Importer;
use crate::store::WorkflowStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Read side for handlers; the importer holds the same store for writes.
    pub store: Arc<dyn WorkflowStore>,
    pub importer: Arc<Importer>,
}
