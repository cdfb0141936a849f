//! Workflow store — owns every persisted `Workflow`.
//!
//! `JsonFileStore` keeps the whole collection as one pretty-printed JSON
//! array. Each save replaces the file atomically (temp file in the same
//! directory, then rename). Records are keyed by `github_url`; a record that
//! is already stored is never updated by a later import.

use std::cmp::Ordering;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::workflow::Workflow;

pub mod handlers;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not a valid workflow list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background write failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of merging an import run into the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub created: usize,
    pub skipped_existing: usize,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Every stored record, sorted for display.
    async fn load(&self) -> Result<Vec<Workflow>, StoreError>;

    /// Replaces the whole collection.
    async fn save(&self, workflows: &[Workflow]) -> Result<(), StoreError>;

    /// Case-insensitive substring match over title, description and author.
    /// A blank query returns everything.
    async fn search(&self, query: &str) -> Result<Vec<Workflow>, StoreError>;

    async fn get(&self, github_url: &str) -> Result<Option<Workflow>, StoreError>;

    async fn contains(&self, github_url: &str) -> Result<bool, StoreError> {
        Ok(self.get(github_url).await?.is_some())
    }

    /// Empties the collection and returns what it held, in one step.
    async fn clear(&self) -> Result<Vec<Workflow>, StoreError>;

    /// Appends records whose `github_url` is not stored yet; others are skipped.
    async fn insert_new(&self, workflows: Vec<Workflow>) -> Result<InsertOutcome, StoreError>;

    /// Time since the collection was last written, `None` if never written.
    async fn age(&self) -> Result<Option<Duration>, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering and search
// ────────────────────────────────────────────────────────────────────────────

/// Stars descending, then most recently updated first. Records without an
/// update time sort after those with one.
pub fn compare_workflows(a: &Workflow, b: &Workflow) -> Ordering {
    b.stars
        .cmp(&a.stars)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

pub fn sort_workflows(workflows: &mut [Workflow]) {
    workflows.sort_by(compare_workflows);
}

pub fn matches_query(workflow: &Workflow, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [&workflow.title, &workflow.description, &workflow.author]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

// ────────────────────────────────────────────────────────────────────────────
// JsonFileStore
// ────────────────────────────────────────────────────────────────────────────

pub struct JsonFileStore {
    path: PathBuf,
    records: RwLock<Vec<Workflow>>,
}

impl JsonFileStore {
    /// Opens the cache file; a missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<Workflow>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        sort_workflows(&mut records);
        info!(path = %path.display(), records = records.len(), "Workflow cache opened");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_file(&self, records: &[Workflow]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes)).await??;
        debug!(path = %self.path.display(), records = records.len(), "Workflow cache written");
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl WorkflowStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Workflow>, StoreError> {
        Ok(self.records.read().await.clone())
    }

    async fn save(&self, workflows: &[Workflow]) -> Result<(), StoreError> {
        let mut sorted = workflows.to_vec();
        sort_workflows(&mut sorted);

        let mut records = self.records.write().await;
        self.write_file(&sorted).await?;
        *records = sorted;
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Workflow>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|w| matches_query(w, query))
            .cloned()
            .collect())
    }

    async fn get(&self, github_url: &str) -> Result<Option<Workflow>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|w| w.github_url == github_url).cloned())
    }

    async fn clear(&self) -> Result<Vec<Workflow>, StoreError> {
        let mut records = self.records.write().await;
        self.write_file(&[]).await?;
        Ok(std::mem::take(&mut *records))
    }

    async fn insert_new(&self, workflows: Vec<Workflow>) -> Result<InsertOutcome, StoreError> {
        let mut records = self.records.write().await;
        let mut merged = records.clone();
        let mut outcome = InsertOutcome::default();

        for workflow in workflows {
            if merged.iter().any(|w| w.github_url == workflow.github_url) {
                outcome.skipped_existing += 1;
                continue;
            }
            merged.push(workflow);
            outcome.created += 1;
        }

        sort_workflows(&mut merged);
        // Rewrite even when nothing was created so the cache age reflects the run.
        self.write_file(&merged).await?;
        *records = merged;
        Ok(outcome)
    }

    async fn age(&self) -> Result<Option<Duration>, StoreError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => {
                let modified = meta.modified()?;
                Ok(Some(
                    SystemTime::now()
                        .duration_since(modified)
                        .unwrap_or_default(),
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
