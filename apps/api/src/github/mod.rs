//! GitHub REST client — the only module that talks to api.github.com.
//!
//! Requests are issued one at a time with a fixed timeout and no retry.
//! Callers decide whether a failure skips a step or aborts the run.

use std::time::Duration;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub mod models;

pub use models::{CodeItem, CodeSearchResponse, FileContents, RepoSearchResponse, RepositoryInfo};
use models::ContentsResponse;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &Config) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("flowscout/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));

        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .default_headers(headers)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: config.github_api_url.clone(),
            token: config.github_token.clone(),
        }
    }

    /// `GET /search/code`, newest-indexed first. `page` starts at 1.
    pub async fn search_code(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<CodeSearchResponse, GithubError> {
        let url = format!("{}/search/code", self.base_url);
        self.get_json(
            &url,
            &[
                ("q", query.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("sort", "indexed".to_string()),
                ("order", "desc".to_string()),
            ],
        )
        .await
    }

    /// `GET /search/repositories`, most recently updated first.
    pub async fn search_repositories(
        &self,
        query: &str,
        per_page: u32,
    ) -> Result<RepoSearchResponse, GithubError> {
        let url = format!("{}/search/repositories", self.base_url);
        self.get_json(
            &url,
            &[
                ("q", query.to_string()),
                ("per_page", per_page.to_string()),
                ("sort", "updated".to_string()),
                ("order", "desc".to_string()),
            ],
        )
        .await
    }

    /// `GET /repos/{owner}/{repo}`
    pub async fn get_repository(&self, full_name: &str) -> Result<RepositoryInfo, GithubError> {
        let url = format!("{}/repos/{}", self.base_url, full_name);
        self.get_json(&url, &[]).await
    }

    /// Fetches a file through its contents API URL and decodes the base64 payload.
    pub async fn get_file(&self, contents_url: &str) -> Result<FileContents, GithubError> {
        let raw: ContentsResponse = self.get_json(contents_url, &[]).await?;
        let encoded = raw
            .content
            .ok_or_else(|| GithubError::Protocol("no content found in response".to_string()))?;

        Ok(FileContents {
            name: raw.name,
            path: raw.path,
            content: decode_content(&encoded)?,
            download_url: raw.download_url,
        })
    }

    /// `GET /repos/{owner}/{repo}/contents/{path}`
    pub async fn get_contents_by_path(
        &self,
        full_name: &str,
        path: &str,
    ) -> Result<FileContents, GithubError> {
        self.get_file(&self.contents_url(full_name, path)).await
    }

    pub fn contents_url(&self, full_name: &str, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.base_url, full_name, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(url, status, bytes = body.len(), "GitHub response");

        decode_body(status, &body)
    }
}

/// Turns a GitHub response body into `T`.
/// GitHub signals quota and validation failures with a top-level `message`.
fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GithubError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GithubError::Protocol(format!("invalid JSON response: {e}")))?;

    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return Err(GithubError::Api {
            status,
            message: message.to_string(),
        });
    }
    if !(200..300).contains(&status) {
        return Err(GithubError::Api {
            status,
            message: format!("unexpected HTTP status {status}"),
        });
    }

    serde_json::from_value(value)
        .map_err(|e| GithubError::Protocol(format!("unexpected response shape: {e}")))
}

/// The contents API wraps base64 at 60 columns.
fn decode_content(encoded: &str) -> Result<String, GithubError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| GithubError::Protocol(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| GithubError::Protocol(format!("file is not valid UTF-8: {e}")))
}

/// A blob URL without its `?query` or `#fragment`.
pub fn strip_blob_suffix(html_url: &str) -> &str {
    html_url.split(['?', '#']).next().unwrap_or(html_url)
}

/// Splits `https://github.com/<owner>/<repo>/blob/<ref>/<path>` into
/// (`owner/repo`, `path`). Any `?query` or `#fragment` is dropped.
pub fn parse_blob_url(html_url: &str) -> Option<(String, String)> {
    let rest = strip_blob_suffix(html_url).split_once("github.com/")?.1;
    let mut parts = rest.splitn(5, '/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if parts.next()? != "blob" {
        return None;
    }
    let _git_ref = parts.next().filter(|s| !s.is_empty())?;
    let path = parts.next().filter(|s| !s.is_empty())?;
    Some((format!("{owner}/{repo}"), path.to_string()))
}

#[cfg(test)]
pub(crate) mod mock;
