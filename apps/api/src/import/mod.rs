//! Import pipeline — one run discovers, verifies, enriches and stores workflows.
//!
//! Flow: plan queries → code search (one query at a time, paced) →
//!       classify each hit → repository metadata → enrich → sort/truncate →
//!       merge into the store.
//!
//! Everything is awaited strictly in sequence. A network or protocol failure
//! on a search skips that query; a GitHub API error (rate limit, auth) stops
//! the remaining queries but whatever was already accepted is still stored.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::classifier::{
    classify, is_likely_workflow, verify_workflow_json, VerifiedCandidate, WorkflowCandidate,
};
use crate::config::Config;
use crate::enrichment::{Enricher, WorkflowSeed};
use crate::errors::AppError;
use crate::github::{
    parse_blob_url, strip_blob_suffix, CodeItem, GithubClient, GithubError, RepositoryInfo,
};
use crate::models::workflow::{Workflow, WorkflowMetadata};
use crate::store::{sort_workflows, WorkflowStore};

pub mod handlers;
pub mod scheduler;

/// Clause appended to keyword searches so results lean towards n8n files.
const KEYWORD_CLAUSE: &str = "(n8n OR workflow OR automation)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Every JSON file in one repository.
    Repository(String),
    /// Free-text code search across GitHub.
    Keyword(String),
}

impl SearchQuery {
    pub fn to_github_query(&self) -> String {
        match self {
            SearchQuery::Repository(repo) => format!("filename:.json repo:{repo}"),
            SearchQuery::Keyword(term) if term.trim().is_empty() => {
                format!("filename:.json {KEYWORD_CLAUSE}")
            }
            SearchQuery::Keyword(term) => {
                format!("filename:.json {} {KEYWORD_CLAUSE}", term.trim())
            }
        }
    }
}

/// Summary of one import run, returned to manual callers and logged for
/// scheduled ones.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub trigger: Trigger,
    pub enricher: &'static str,
    pub queries_run: usize,
    pub candidates_seen: usize,
    pub accepted: usize,
    pub created: usize,
    pub skipped_existing: usize,
    /// Set when a GitHub API error cut the run short.
    pub aborted: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Import settings taken from `Config` at startup.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub repositories: Vec<String>,
    pub terms: Vec<String>,
    pub discover_repositories: u32,
    pub results_per_query: u32,
    pub request_delay: Duration,
    pub max_workflows: usize,
    pub cache_ttl: Duration,
}

impl From<&Config> for ImportSettings {
    fn from(config: &Config) -> Self {
        Self {
            repositories: config.search_repositories.clone(),
            terms: config.search_terms.clone(),
            discover_repositories: config.discover_repositories,
            results_per_query: config.results_per_query,
            request_delay: config.request_delay,
            max_workflows: config.max_workflows,
            cache_ttl: config.cache_ttl,
        }
    }
}

/// Spaces out GitHub searches: every call after the first waits `delay`.
#[derive(Debug, Default)]
struct Pacer {
    delay: Duration,
    issued: usize,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, issued: 0 }
    }

    async fn wait(&mut self) {
        if self.issued > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.issued += 1;
    }
}

/// Mutable state of a single run. Never shared across runs.
#[derive(Default)]
struct ImportRun {
    pacer: Pacer,
    queries_run: usize,
    candidates_seen: usize,
    skipped_existing: usize,
    seen_urls: HashSet<String>,
    repositories: HashMap<String, RepositoryInfo>,
    accepted: Vec<Workflow>,
}

/// Result of `Importer::refresh_if_stale`.
#[derive(Debug, Clone)]
pub struct Refresh {
    pub workflows: Vec<Workflow>,
    /// Present when an import actually ran.
    pub report: Option<RunReport>,
}

/// A code search hit that passed the filename heuristic, not yet fetched.
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePreview {
    pub repository: String,
    pub file_path: String,
    pub file_name: String,
    pub html_url: String,
    /// Already in the store under this URL.
    pub imported: bool,
}

/// One page of `Importer::search_candidates`.
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePage {
    pub query: String,
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub incomplete_results: bool,
    pub candidates: Vec<CandidatePreview>,
}

/// Outcome of importing a single file by URL.
#[derive(Debug, Clone, Serialize)]
pub struct FileImport {
    pub created: bool,
    pub workflow: Workflow,
}

pub struct Importer {
    github: GithubClient,
    enricher: Arc<dyn Enricher>,
    store: Arc<dyn WorkflowStore>,
    settings: ImportSettings,
    // Held for the whole run so manual and scheduled imports never interleave.
    run_lock: Mutex<()>,
}

impl Importer {
    pub fn new(
        github: GithubClient,
        enricher: Arc<dyn Enricher>,
        store: Arc<dyn WorkflowStore>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            github,
            enricher,
            store,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    /// Executes one full import run and merges the results into the store.
    pub async fn run(&self, trigger: Trigger) -> Result<RunReport, AppError> {
        let _guard = self.run_lock.lock().await;
        let started_at = Utc::now();
        info!(?trigger, enricher = self.enricher.backend(), "Import run started");

        let mut run = ImportRun {
            pacer: Pacer::new(self.settings.request_delay),
            ..ImportRun::default()
        };
        let aborted = match self.collect(&mut run).await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, accepted = run.accepted.len(), "Import run aborted");
                Some(abort_message(&e))
            }
        };

        let mut workflows = std::mem::take(&mut run.accepted);
        let accepted = workflows.len();
        sort_workflows(&mut workflows);
        workflows.truncate(self.settings.max_workflows);

        let outcome = self.store.insert_new(workflows).await?;

        let report = RunReport {
            trigger,
            enricher: self.enricher.backend(),
            queries_run: run.queries_run,
            candidates_seen: run.candidates_seen,
            accepted,
            created: outcome.created,
            skipped_existing: run.skipped_existing + outcome.skipped_existing,
            aborted,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            created = report.created,
            accepted = report.accepted,
            candidates = report.candidates_seen,
            queries = report.queries_run,
            "Import run finished"
        );
        Ok(report)
    }

    /// Returns the stored workflows, running an import first when the cache
    /// is empty, older than the TTL, or `force` is set.
    pub async fn refresh_if_stale(&self, force: bool) -> Result<Refresh, AppError> {
        let age = self.store.age().await?;
        let fresh = matches!(age, Some(age) if age < self.settings.cache_ttl);
        let empty = self.store.load().await?.is_empty();

        let report = if force || !fresh || empty {
            Some(self.run(Trigger::Manual).await?)
        } else {
            debug!(?age, "Workflow cache is fresh, skipping import");
            None
        };
        Ok(Refresh {
            workflows: self.store.load().await?,
            report,
        })
    }

    /// Previews one page of keyword code search results that pass the
    /// filename heuristic. Nothing is fetched or stored.
    pub async fn search_candidates(
        &self,
        term: &str,
        page: u32,
        per_page: u32,
    ) -> Result<CandidatePage, AppError> {
        if page == 0 {
            return Err(AppError::Validation("page starts at 1".to_string()));
        }
        let per_page = per_page.clamp(1, 100);
        let query = SearchQuery::Keyword(term.to_string()).to_github_query();
        let response = self.github.search_code(&query, page, per_page).await?;

        let mut candidates = Vec::new();
        for item in &response.items {
            let candidate = WorkflowCandidate::from_code_item(item);
            if !is_likely_workflow(&candidate) {
                continue;
            }
            candidates.push(CandidatePreview {
                imported: self.store.contains(&candidate.html_url).await?,
                repository: candidate.repository_full_name,
                file_path: candidate.file_path,
                file_name: candidate.file_name,
                html_url: candidate.html_url,
            });
        }
        info!(
            query = %query,
            page,
            hits = response.items.len(),
            candidates = candidates.len(),
            "Candidate search completed"
        );

        Ok(CandidatePage {
            query,
            page,
            per_page,
            total_count: response.total_count,
            incomplete_results: response.incomplete_results,
            candidates,
        })
    }

    /// Imports one workflow file given its `github.com/.../blob/...` URL.
    /// A file that is already stored is returned unchanged.
    pub async fn import_file(&self, html_url: &str) -> Result<FileImport, AppError> {
        let _guard = self.run_lock.lock().await;
        let html_url = strip_blob_suffix(html_url);

        let (repo, path) = parse_blob_url(html_url)
            .ok_or_else(|| AppError::Validation("Invalid GitHub URL format".to_string()))?;

        if let Some(existing) = self.store.get(html_url).await? {
            return Ok(FileImport {
                created: false,
                workflow: existing,
            });
        }

        let file = self.github.get_contents_by_path(&repo, &path).await?;
        let shape = verify_workflow_json(&file.content)
            .map_err(|e| AppError::UnprocessableEntity(format!("Not an n8n workflow: {e}")))?;

        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        let verified = VerifiedCandidate {
            candidate: WorkflowCandidate {
                repository_full_name: repo.clone(),
                file_path: file.path.unwrap_or_else(|| path.clone()),
                file_name: file.name.unwrap_or(file_name),
                raw_api_url: self.github.contents_url(&repo, &path),
                html_url: html_url.to_string(),
            },
            json_content: file.content,
            download_url: file.download_url,
            shape,
        };

        let repository = self.fetch_repository(&repo).await;
        let seed = WorkflowSeed {
            verified,
            repository,
        };
        let metadata = self.enricher.enrich(&seed).await;
        let workflow = build_workflow(seed, metadata);

        let outcome = self.store.insert_new(vec![workflow.clone()]).await?;
        info!(url = html_url, "Workflow imported by URL");
        Ok(FileImport {
            created: outcome.created == 1,
            workflow,
        })
    }

    /// Runs every planned query. Only GitHub API errors come back as `Err`.
    async fn collect(&self, run: &mut ImportRun) -> Result<(), GithubError> {
        let queries = self.plan_queries(run).await?;

        for query in &queries {
            let q = query.to_github_query();
            run.pacer.wait().await;
            run.queries_run += 1;

            let response = match self
                .github
                .search_code(&q, 1, self.settings.results_per_query)
                .await
            {
                Ok(response) => response,
                Err(e @ GithubError::Api { .. }) => return Err(e),
                Err(e) => {
                    warn!(query = %q, error = %e, "Search query skipped");
                    continue;
                }
            };
            info!(
                query = %q,
                hits = response.items.len(),
                total = response.total_count,
                incomplete = response.incomplete_results,
                "Search query completed"
            );

            for item in &response.items {
                self.process_item(run, item).await;
            }
        }
        Ok(())
    }

    /// Configured repositories, then repositories discovered per term, then
    /// one keyword query per term.
    async fn plan_queries(&self, run: &mut ImportRun) -> Result<Vec<SearchQuery>, GithubError> {
        let mut repositories: Vec<String> = self.settings.repositories.clone();

        if self.settings.discover_repositories > 0 {
            for term in &self.settings.terms {
                run.pacer.wait().await;
                match self
                    .github
                    .search_repositories(term, self.settings.discover_repositories)
                    .await
                {
                    Ok(found) => {
                        debug!(term = %term, total = found.total_count, "Repository discovery completed");
                        for repo in found.items {
                            if !repositories
                                .iter()
                                .any(|r| r.eq_ignore_ascii_case(&repo.full_name))
                            {
                                repositories.push(repo.full_name.clone());
                            }
                            run.repositories.insert(repo.full_name.clone(), repo);
                        }
                    }
                    Err(e @ GithubError::Api { .. }) => return Err(e),
                    Err(e) => warn!(term = %term, error = %e, "Repository discovery skipped"),
                }
            }
        }

        let mut queries: Vec<SearchQuery> = repositories
            .into_iter()
            .map(SearchQuery::Repository)
            .collect();
        queries.extend(self.settings.terms.iter().cloned().map(SearchQuery::Keyword));
        Ok(queries)
    }

    async fn process_item(&self, run: &mut ImportRun, item: &CodeItem) {
        let candidate = WorkflowCandidate::from_code_item(item);
        run.candidates_seen += 1;

        if !run.seen_urls.insert(candidate.html_url.clone()) {
            return;
        }
        match self.store.contains(&candidate.html_url).await {
            Ok(true) => {
                run.skipped_existing += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Store lookup failed, treating candidate as new"),
        }

        let Some(verified) = classify(&self.github, candidate).await else {
            return;
        };

        let full_name = verified.candidate.repository_full_name.clone();
        let repository = match run.repositories.get(&full_name) {
            Some(info) => info.clone(),
            None => {
                let info = self.fetch_repository(&full_name).await;
                run.repositories.insert(full_name, info.clone());
                info
            }
        };

        let seed = WorkflowSeed {
            verified,
            repository,
        };
        let metadata = self.enricher.enrich(&seed).await;
        run.accepted.push(build_workflow(seed, metadata));
    }

    /// Repository metadata, or a bare record if GitHub cannot provide it.
    async fn fetch_repository(&self, full_name: &str) -> RepositoryInfo {
        match self.github.get_repository(full_name).await {
            Ok(info) => info,
            Err(e) => {
                warn!(repository = full_name, error = %e, "Repository lookup failed");
                RepositoryInfo::bare(full_name)
            }
        }
    }
}

/// Client-facing text for an aborted run.
fn abort_message(error: &GithubError) -> String {
    match error {
        GithubError::Api { message, .. } => format!("GitHub API Error: {message}"),
        other => other.to_string(),
    }
}

fn build_workflow(seed: WorkflowSeed, metadata: WorkflowMetadata) -> Workflow {
    let WorkflowSeed {
        verified,
        repository,
    } = seed;
    let author = repository.owner_login().to_string();

    Workflow {
        title: metadata.title,
        description: metadata.description,
        author,
        json_content: verified.json_content,
        node_count: verified.shape.node_count,
        connection_count: verified.shape.connection_count,
        node_types: verified.shape.node_types,
        workflow_name: verified.shape.name,
        active: verified.shape.active,
        repository: repository.full_name,
        file_path: verified.candidate.file_path,
        github_url: verified.candidate.html_url,
        download_url: verified.download_url,
        stars: repository.stargazers_count,
        updated_at: repository.updated_at,
        imported_at: Utc::now(),
    }
}
