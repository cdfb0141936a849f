//! Workflow classifier — decides whether a code search hit is a real n8n workflow.
//!
//! Per candidate: Discovered → (filename heuristic) → Rejected | Pending
//!                Pending → (content fetch + shape check) → Rejected | Verified
//!
//! Rejections are silent apart from a debug line; nothing is retried.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::github::{CodeItem, GithubClient};

/// Substrings that mark a filename, path or repository as n8n-related.
pub const WORKFLOW_KEYWORDS: &[&str] = &["n8n", "workflow", "automation", "nodemation"];

/// A GitHub search hit under consideration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowCandidate {
    pub repository_full_name: String,
    pub file_path: String,
    pub file_name: String,
    /// Contents API URL used to fetch the file.
    pub raw_api_url: String,
    /// Canonical dedup key and display link.
    pub html_url: String,
}

impl WorkflowCandidate {
    pub fn from_code_item(item: &CodeItem) -> Self {
        Self {
            repository_full_name: item.repository.full_name.clone(),
            file_path: item.path.clone(),
            file_name: item.name.clone(),
            raw_api_url: item.url.clone(),
            html_url: item.html_url.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("content is not valid JSON")]
    InvalidJson,

    #[error("top-level value is not an object")]
    NotAnObject,

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("no node carries both 'type' and 'position'")]
    NoValidNode,
}

/// Facts extracted from a workflow document that passed the shape check.
#[derive(Debug, Clone)]
pub struct WorkflowShape {
    pub node_count: usize,
    pub connection_count: usize,
    /// Unique node types in first-seen order.
    pub node_types: Vec<String>,
    pub name: Option<String>,
    pub active: bool,
}

/// A candidate whose content has been fetched and verified.
#[derive(Debug, Clone)]
pub struct VerifiedCandidate {
    pub candidate: WorkflowCandidate,
    pub json_content: String,
    pub download_url: Option<String>,
    pub shape: WorkflowShape,
}

/// Cheap local check: `.json` extension plus a keyword in the filename,
/// the path or the repository name. Case-insensitive; first match wins.
pub fn is_likely_workflow(candidate: &WorkflowCandidate) -> bool {
    let file_name = candidate.file_name.to_lowercase();
    if !file_name.ends_with(".json") {
        return false;
    }

    let path = candidate.file_path.to_lowercase();
    let repo = candidate.repository_full_name.to_lowercase();
    [file_name, path, repo]
        .iter()
        .any(|haystack| WORKFLOW_KEYWORDS.iter().any(|kw| haystack.contains(kw)))
}

/// Verifies the n8n workflow shape: an object with `nodes` and `connections`,
/// and at least one node carrying both `type` and `position`.
/// Nodes beyond the first valid one are not inspected.
pub fn verify_workflow_json(content: &str) -> Result<WorkflowShape, ValidationError> {
    let doc: Value = serde_json::from_str(content).map_err(|_| ValidationError::InvalidJson)?;
    let obj = doc.as_object().ok_or(ValidationError::NotAnObject)?;

    let nodes = present(obj.get("nodes")).ok_or(ValidationError::MissingKey("nodes"))?;
    let connections =
        present(obj.get("connections")).ok_or(ValidationError::MissingKey("connections"))?;

    let nodes = nodes.as_array().ok_or(ValidationError::NoValidNode)?;
    let has_valid_node = nodes.iter().any(|node| {
        present(node.get("type")).is_some() && present(node.get("position")).is_some()
    });
    if !has_valid_node {
        return Err(ValidationError::NoValidNode);
    }

    let connection_count = match connections {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    };

    let mut node_types: Vec<String> = Vec::new();
    for node_type in nodes
        .iter()
        .filter_map(|n| n.get("type").and_then(Value::as_str))
    {
        if !node_types.iter().any(|t| t == node_type) {
            node_types.push(node_type.to_string());
        }
    }

    Ok(WorkflowShape {
        node_count: nodes.len(),
        connection_count,
        node_types,
        name: obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
        active: obj.get("active").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Human-readable title: the workflow's own `name`, otherwise the file stem
/// with separators turned into spaces and each word capitalised.
pub fn derive_title(file_path: &str, shape: &WorkflowShape) -> String {
    if let Some(name) = &shape.name {
        return name.clone();
    }

    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    stem.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Runs one candidate through the classifier.
pub async fn classify(
    github: &GithubClient,
    candidate: WorkflowCandidate,
) -> Option<VerifiedCandidate> {
    if !is_likely_workflow(&candidate) {
        debug!(url = %candidate.html_url, "rejected by filename heuristic");
        return None;
    }

    let file = match github.get_file(&candidate.raw_api_url).await {
        Ok(file) => file,
        Err(e) => {
            debug!(url = %candidate.html_url, error = %e, "rejected: content fetch failed");
            return None;
        }
    };

    match verify_workflow_json(&file.content) {
        Ok(shape) => Some(VerifiedCandidate {
            candidate,
            json_content: file.content,
            download_url: file.download_url,
            shape,
        }),
        Err(e) => {
            debug!(url = %candidate.html_url, reason = %e, "rejected: not an n8n workflow");
            None
        }
    }
}
