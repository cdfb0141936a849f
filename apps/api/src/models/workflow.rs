use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verified, importable n8n workflow as persisted in the cache file.
///
/// `github_url` is the dedup key: no two stored records share it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub title: String,
    pub description: String,
    /// Repository owner login, matched by search alongside title and description.
    #[serde(default)]
    pub author: String,
    /// Verbatim file contents as fetched from GitHub.
    pub json_content: String,
    pub node_count: usize,
    pub connection_count: usize,
    #[serde(default)]
    pub node_types: Vec<String>,
    /// The `name` field of the workflow JSON, if it had one.
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub repository: String,
    pub file_path: String,
    #[serde(alias = "url")]
    pub github_url: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub imported_at: DateTime<Utc>,
}

/// Title/description pair produced by an enricher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub title: String,
    pub description: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn workflow(github_url: &str, stars: u64, updated_at: Option<DateTime<Utc>>) -> Workflow {
        Workflow {
            title: format!("Workflow {github_url}"),
            description: "test workflow".to_string(),
            author: "tester".to_string(),
            json_content: r#"{"nodes":[{"type":"n8n-nodes-base.start","position":[0,0]}],"connections":{}}"#
                .to_string(),
            node_count: 1,
            connection_count: 0,
            node_types: vec!["n8n-nodes-base.start".to_string()],
            workflow_name: None,
            active: false,
            repository: "tester/flows".to_string(),
            file_path: "flows/test.json".to_string(),
            github_url: github_url.to_string(),
            download_url: None,
            stars,
            updated_at,
            imported_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    pub fn at(day: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
    }
}
