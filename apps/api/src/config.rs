use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";

/// Repositories searched on every import when `SEARCH_REPOSITORIES` is unset.
pub const DEFAULT_SEARCH_REPOSITORIES: &[&str] = &[
    "Zie619/n8n-workflows",
    "anushgr/n8n-workflows",
    "n8n-io/n8n",
    "n8n-community/n8n-workflows",
];

// Values shipped in the example config that must not be sent upstream.
const PLACEHOLDER_LLM_KEY: &str = "sk-your-openai-api-key-here";
const PLACEHOLDER_GITHUB_TOKEN: &str = "ghp_your-github-token-here";

/// How often the scheduled import fires when auto-import is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFrequency {
    Hourly,
    TwiceDaily,
    Daily,
    Weekly,
}

impl ImportFrequency {
    pub fn period(self) -> Duration {
        const HOUR: u64 = 3600;
        match self {
            ImportFrequency::Hourly => Duration::from_secs(HOUR),
            ImportFrequency::TwiceDaily => Duration::from_secs(12 * HOUR),
            ImportFrequency::Daily => Duration::from_secs(24 * HOUR),
            ImportFrequency::Weekly => Duration::from_secs(7 * 24 * HOUR),
        }
    }
}

impl std::str::FromStr for ImportFrequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(ImportFrequency::Hourly),
            "twicedaily" | "twice_daily" => Ok(ImportFrequency::TwiceDaily),
            "daily" => Ok(ImportFrequency::Daily),
            "weekly" => Ok(ImportFrequency::Weekly),
            other => bail!("unknown import frequency '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Every setting has a default; credentials are optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub max_workflows: usize,
    pub cache_path: String,
    pub cache_ttl: Duration,
    pub auto_import: bool,
    pub import_frequency: ImportFrequency,
    pub search_repositories: Vec<String>,
    pub search_terms: Vec<String>,
    pub discover_repositories: u32,
    pub results_per_query: u32,
    pub request_delay: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let search_repositories = match lookup("SEARCH_REPOSITORIES") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_SEARCH_REPOSITORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let search_terms = match lookup("SEARCH_TERMS") {
            Some(raw) => split_lines(&raw),
            None => vec!["n8n workflow".to_string()],
        };

        Ok(Config {
            github_token: get("GITHUB_TOKEN").filter(|t| t != PLACEHOLDER_GITHUB_TOKEN),
            github_api_url: get("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            llm_api_key: get("LLM_API_KEY").filter(|k| k != PLACEHOLDER_LLM_KEY),
            llm_api_url: get("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            max_workflows: parse_or(&get, "MAX_WORKFLOWS", 20)?,
            cache_path: get("CACHE_PATH").unwrap_or_else(|| "workflows_cache.json".to_string()),
            cache_ttl: Duration::from_secs(parse_or(&get, "CACHE_TTL_SECS", 3600)?),
            auto_import: parse_bool(get("AUTO_IMPORT").as_deref())
                .context("AUTO_IMPORT must be a boolean")?,
            import_frequency: get("IMPORT_FREQUENCY")
                .map(|v| v.parse())
                .transpose()
                .context("IMPORT_FREQUENCY must be hourly, twicedaily, daily or weekly")?
                .unwrap_or(ImportFrequency::Daily),
            search_repositories,
            search_terms,
            discover_repositories: parse_or(&get, "DISCOVER_REPOSITORIES", 3)?,
            results_per_query: parse_or::<u32, _>(&get, "RESULTS_PER_QUERY", 30)?.clamp(1, 100),
            request_delay: Duration::from_millis(parse_or(&get, "REQUEST_DELAY_MS", 500)?),
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }

    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm_api_key.as_deref()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<&str>) -> Result<bool> {
    match raw.map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("'{other}' is not a boolean"),
        },
    }
}

/// One entry per line; commas are accepted as separators too.
/// Duplicates keep their first position.
fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(['\n', ',']).map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            out.push(item.to_string());
        }
    }
    out
}

fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
