use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository summary embedded in every code search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub full_name: String,
}

/// One hit from `GET /search/code`.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeItem {
    pub name: String,
    pub path: String,
    /// Contents API URL for the file.
    pub url: String,
    pub html_url: String,
    pub repository: RepositoryRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeSearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<CodeItem>,
}

/// Response of `GET /repos/{owner}/{repo}`, also the item type of repository search.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl RepositoryInfo {
    /// Minimal record used when the repository endpoint cannot be reached.
    pub fn bare(full_name: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            description: None,
            stargazers_count: 0,
            updated_at: None,
            owner: None,
            topics: Vec::new(),
        }
    }

    /// Owner login, falling back to the part of `full_name` before the slash.
    pub fn owner_login(&self) -> &str {
        match &self.owner {
            Some(owner) => &owner.login,
            None => self.full_name.split('/').next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoSearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<RepositoryInfo>,
}

/// Raw body of `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentsResponse {
    pub name: Option<String>,
    pub path: Option<String>,
    pub content: Option<String>,
    pub download_url: Option<String>,
}

/// A fetched file with its content already base64-decoded.
#[derive(Debug, Clone)]
pub struct FileContents {
    pub name: Option<String>,
    pub path: Option<String>,
    pub content: String,
    pub download_url: Option<String>,
}
