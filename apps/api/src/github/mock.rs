//! In-process stand-in for the GitHub REST API and the chat-completion
//! endpoint, served by axum on an ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde_json::{json, Value};

use crate::config::Config;

#[derive(Default)]
struct Inner {
    base_url: String,
    repositories: HashMap<String, Value>,
    files: HashMap<(String, String), String>,
    // query fragment -> (repo, path) hits
    code_hits: Vec<(String, String, String)>,
    // query fragment -> (status, message)
    code_failures: Vec<(String, u16, String)>,
    garbled_queries: Vec<String>,
    repo_search: HashMap<String, Vec<String>>,
    llm_reply: Option<String>,
    code_queries: Vec<String>,
    code_pages: Vec<u32>,
    contents_requests: usize,
    llm_prompts: Vec<Value>,
    last_authorization: Option<String>,
    last_llm_authorization: Option<String>,
}

#[derive(Clone, Default)]
struct MockState(Arc<Mutex<Inner>>);

impl MockState {
    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.0.lock().unwrap();
        f(&mut inner)
    }
}

pub struct MockServer {
    addr: SocketAddr,
    state: MockState,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/search/code", get(search_code))
            .route("/search/repositories", get(search_repositories))
            .route("/repos/:owner/:repo", get(repository))
            .route("/repos/:owner/:repo/contents/*path", get(contents))
            .route("/v1/chat/completions", post(chat_completion))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        state.with(|inner| inner.base_url = format!("http://{addr}"));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Config pointed at this server, with no seed repositories, no
    /// discovery and no request delay.
    pub fn config(&self) -> Config {
        let base = format!("http://{}", self.addr);
        let mut config = Self::offline_config();
        config.github_api_url = base.clone();
        config.llm_api_url = format!("{base}/v1/chat/completions");
        config
    }

    pub fn offline_config() -> Config {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SEARCH_REPOSITORIES", ""),
            ("DISCOVER_REPOSITORIES", "0"),
            ("REQUEST_DELAY_MS", "0"),
        ]);
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    pub fn add_repository(&self, full_name: &str, stars: u64, updated_at: &str) {
        let owner = full_name.split('/').next().unwrap_or_default();
        let repo = json!({
            "full_name": full_name,
            "description": format!("Automations collected in {full_name}"),
            "stargazers_count": stars,
            "updated_at": updated_at,
            "owner": { "login": owner },
            "topics": ["n8n"],
        });
        self.state
            .with(|inner| inner.repositories.insert(full_name.to_string(), repo));
    }

    pub fn add_file(&self, repo: &str, path: &str, content: &str) {
        self.state.with(|inner| {
            inner
                .files
                .insert((repo.to_string(), path.to_string()), content.to_string())
        });
    }

    /// Code searches whose `q` contains `fragment` return this file.
    pub fn add_code_hit(&self, fragment: &str, repo: &str, path: &str) {
        self.state.with(|inner| {
            inner
                .code_hits
                .push((fragment.to_string(), repo.to_string(), path.to_string()))
        });
    }

    pub fn fail_code_search(&self, fragment: &str, status: u16, message: &str) {
        self.state.with(|inner| {
            inner
                .code_failures
                .push((fragment.to_string(), status, message.to_string()))
        });
    }

    pub fn garble_code_search(&self, fragment: &str) {
        self.state
            .with(|inner| inner.garbled_queries.push(fragment.to_string()));
    }

    pub fn add_repo_search(&self, term: &str, repos: &[&str]) {
        self.state.with(|inner| {
            inner.repo_search.insert(
                term.to_string(),
                repos.iter().map(|r| r.to_string()).collect(),
            )
        });
    }

    pub fn set_llm_reply(&self, reply: &str) {
        self.state
            .with(|inner| inner.llm_reply = Some(reply.to_string()));
    }

    pub fn code_queries(&self) -> Vec<String> {
        self.state.with(|inner| inner.code_queries.clone())
    }

    pub fn code_pages(&self) -> Vec<u32> {
        self.state.with(|inner| inner.code_pages.clone())
    }

    /// Number of contents API calls received so far.
    pub fn contents_requests(&self) -> usize {
        self.state.with(|inner| inner.contents_requests)
    }

    pub fn llm_requests(&self) -> Vec<Value> {
        self.state.with(|inner| inner.llm_prompts.clone())
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.with(|inner| inner.last_authorization.clone())
    }

    pub fn last_llm_authorization(&self) -> Option<String> {
        self.state.with(|inner| inner.last_llm_authorization.clone())
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Not Found" })),
    )
        .into_response()
}

fn code_item(base_url: &str, repo: &str, path: &str) -> Value {
    let owner = repo.split('/').next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or(path);
    json!({
        "name": name,
        "path": path,
        "url": format!("{base_url}/repos/{repo}/contents/{path}?ref=abc123"),
        "html_url": format!("https://github.com/{repo}/blob/main/{path}"),
        "repository": { "full_name": repo, "owner": { "login": owner } },
    })
}

async fn search_code(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = params
        .get("per_page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(30);
    state.with(|inner| {
        inner.last_authorization = authorization(&headers);
        inner.code_queries.push(q.clone());
        inner.code_pages.push(page as u32);

        if inner.garbled_queries.iter().any(|f| q.contains(f.as_str())) {
            return (StatusCode::OK, "<html>unicorn</html>").into_response();
        }
        if let Some((_, status, message)) = inner
            .code_failures
            .iter()
            .find(|(fragment, _, _)| q.contains(fragment.as_str()))
        {
            let status = StatusCode::from_u16(*status).unwrap();
            return (status, Json(json!({ "message": message }))).into_response();
        }

        let matching: Vec<Value> = inner
            .code_hits
            .iter()
            .filter(|(fragment, _, _)| q.contains(fragment.as_str()))
            .map(|(_, repo, path)| code_item(&inner.base_url, repo, path))
            .collect();
        let total = matching.len();
        let items: Vec<Value> = matching
            .into_iter()
            .skip(page.saturating_sub(1) * per_page)
            .take(per_page)
            .collect();
        Json(json!({
            "total_count": total,
            "incomplete_results": false,
            "items": items,
        }))
        .into_response()
    })
}

async fn search_repositories(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    state.with(|inner| {
        let items: Vec<Value> = inner
            .repo_search
            .get(&q)
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        inner
                            .repositories
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| json!({ "full_name": name }))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Json(json!({ "total_count": items.len(), "items": items })).into_response()
    })
}

async fn repository(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    let full_name = format!("{owner}/{repo}");
    state.with(|inner| {
        inner.last_authorization = authorization(&headers);
        match inner.repositories.get(&full_name) {
            Some(repo) => Json(repo.clone()).into_response(),
            None => not_found(),
        }
    })
}

async fn contents(
    State(state): State<MockState>,
    Path((owner, repo, path)): Path<(String, String, String)>,
) -> Response {
    let full_name = format!("{owner}/{repo}");
    let path = path.trim_start_matches('/').to_string();
    state.with(|inner| {
        inner.contents_requests += 1;
        let Some(content) = inner.files.get(&(full_name.clone(), path.clone())) else {
            return not_found();
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let wrapped = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Json(json!({
            "name": name,
            "path": path,
            "encoding": "base64",
            "content": wrapped,
            "download_url": format!("https://raw.githubusercontent.com/{full_name}/main/{path}"),
            "html_url": format!("https://github.com/{full_name}/blob/main/{path}"),
        }))
        .into_response()
    })
}

async fn chat_completion(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.with(|inner| {
        inner.last_llm_authorization = authorization(&headers);
        inner.llm_prompts.push(body);
        match &inner.llm_reply {
            Some(reply) => Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            }))
            .into_response(),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": { "message": "no reply configured" } })),
            )
                .into_response(),
        }
    })
}
